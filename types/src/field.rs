//! Semantic field types declared on entities.

/// The semantic type of a declared entity field.
///
/// Storage engines are free to represent values differently (SQLite stores
/// booleans as integers and timestamps as text); [`crate::Value::coerce`]
/// maps them back onto the declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldType {
    #[cfg_attr(feature = "serde", serde(alias = "text"))]
    String,
    #[cfg_attr(feature = "serde", serde(alias = "integer"))]
    Int,
    #[cfg_attr(feature = "serde", serde(alias = "float"))]
    Real,
    #[cfg_attr(feature = "serde", serde(alias = "boolean"))]
    Bool,
    #[cfg_attr(feature = "serde", serde(alias = "datetime"))]
    Timestamp,
}

impl FieldType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Real => "real",
            FieldType::Bool => "bool",
            FieldType::Timestamp => "timestamp",
        }
    }

    /// Whether values of this type can be summed or averaged.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Real)
    }
}

impl core::fmt::Display for FieldType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
