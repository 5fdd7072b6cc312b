use thiserror::Error;

#[derive(Debug, Error)]
pub enum HydrateError {
    /// An entity with this name is already registered
    #[error("Entity '{entity}' is already registered")]
    DuplicateEntity { entity: String },

    /// No entity with this name is registered
    #[error("Entity '{entity}' is not registered")]
    UnknownEntity { entity: String },

    /// Entity definition is structurally invalid
    #[error("Invalid entity '{entity}': {reason}")]
    InvalidEntity { entity: String, reason: String },

    /// Relation references an unknown entity or a missing key
    #[error("Invalid relation '{relation}' on '{entity}': {reason}")]
    InvalidRelation {
        entity: String,
        relation: String,
        reason: String,
    },

    /// Field not declared on the entity
    #[error("Field '{field}' is not declared on '{entity}'")]
    UnknownField { entity: String, field: String },

    /// A relation path segment does not resolve
    #[error("Relation path '{path}' does not resolve from '{entity}'")]
    UnknownRelation { entity: String, path: String },

    /// Aggregate function outside count/sum/avg/min/max
    #[error("Unsupported aggregate function '{0}'")]
    UnsupportedAggregate(String),

    /// Directive cannot be applied in this position
    #[error("Invalid directive for '{path}': {reason}")]
    InvalidDirective { path: String, reason: String },

    /// Error reported by the executor adapter
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl HydrateError {
    pub(crate) fn unknown_field(entity: &str, field: &str) -> Self {
        HydrateError::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid_directive(path: &str, reason: impl Into<String>) -> Self {
        HydrateError::InvalidDirective {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by an [`Executor`](crate::executor::Executor).
///
/// Carries adapter-specific detail and, when available, the driver error
/// that caused it.
#[derive(Debug)]
pub struct ExecutionError {
    detail: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ExecutionError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            source: None,
        }
    }

    pub fn with_source<E>(detail: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            detail: detail.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl core::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.detail, source),
            None => f.write_str(&self.detail),
        }
    }
}

impl std::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, HydrateError>;
