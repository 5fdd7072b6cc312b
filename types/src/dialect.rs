//! SQL dialect selection for rendering.

use core::fmt;
use core::str::FromStr;

/// Target database of a rendered statement.
///
/// The dialect decides placeholder syntax, identifier quoting, how an
/// offset without a limit is spelled and whether row locks exist.
///
/// ```
/// use hydrate_types::Dialect;
///
/// assert!(Dialect::PostgreSQL.uses_numbered_placeholders());
/// assert_eq!(Dialect::MySQL.quote_char(), '`');
/// assert_eq!("pg".parse::<Dialect>(), Ok(Dialect::PostgreSQL));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// `?` placeholders, double-quoted identifiers, no row locks.
    #[default]
    SQLite,
    /// `$n` placeholders, double-quoted identifiers.
    PostgreSQL,
    /// `?` placeholders, backtick-quoted identifiers.
    MySQL,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::SQLite, Dialect::PostgreSQL, Dialect::MySQL];

    #[inline]
    #[must_use]
    pub const fn uses_numbered_placeholders(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    #[inline]
    #[must_use]
    pub const fn quote_char(&self) -> char {
        match self {
            Dialect::MySQL => '`',
            Dialect::SQLite | Dialect::PostgreSQL => '"',
        }
    }

    /// SQLite locks the whole database file, so it has no `FOR UPDATE`.
    #[inline]
    #[must_use]
    pub const fn supports_row_locks(&self) -> bool {
        !matches!(self, Dialect::SQLite)
    }

    /// `LIMIT` needed in front of a bare `OFFSET`, if the grammar requires one.
    #[must_use]
    pub const fn unbounded_limit(&self) -> Option<&'static str> {
        match self {
            Dialect::SQLite => Some("-1"),
            Dialect::MySQL => Some("18446744073709551615"),
            Dialect::PostgreSQL => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dialect::SQLite => "sqlite",
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the lowercase name in any case, plus `postgres` and `pg`.
impl FromStr for Dialect {
    type Err = DialectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Dialect::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .or_else(|| {
                ["postgres", "pg"]
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(s))
                    .then_some(Dialect::PostgreSQL)
            })
            .ok_or_else(|| DialectParseError(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectParseError(pub String);

impl fmt::Display for DialectParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown dialect '{}'", self.0)
    }
}

impl std::error::Error for DialectParseError {}
