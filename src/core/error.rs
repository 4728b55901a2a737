use thiserror::Error;

/// Configuration errors detected while describing a model type.
///
/// These are cached alongside the type metadata, so every caller that
/// describes a broken type observes the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate attribute '{name}' in model {model}")]
    DuplicateAttribute { model: String, name: String },

    #[error("duplicate event '{name}' in model {model}")]
    DuplicateEvent { model: String, name: String },

    #[error("invalid declaration in model {model}: {reason}")]
    InvalidDeclaration { model: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Model '{0}' is not registered")]
    ModelNotRegistered(String),

    #[error("Model '{0}' is not storable")]
    NotStorable(String),

    #[error("No document store configured for model '{0}'")]
    StoreUnavailable(String),

    #[error("Required parameter '{0}' is missing or null")]
    MissingParameter(String),

    #[error("Parameter '{name}' conversion failed: {reason}")]
    ParameterConversion { name: String, reason: String },

    #[error("Event '{event}' failed: {source}")]
    Dispatch {
        event: String,
        #[source]
        source: Box<ModelError>,
    },

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl ModelError {
    /// Builds a handler failure from any displayable message.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    pub(crate) fn dispatch(event: &str, source: ModelError) -> Self {
        Self::Dispatch {
            event: event.to_string(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost error of a dispatch failure.
    pub fn root_cause(&self) -> &ModelError {
        match self {
            Self::Dispatch { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl<T> From<std::sync::PoisonError<T>> for ModelError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<tokio::sync::TryLockError> for ModelError {
    fn from(err: tokio::sync::TryLockError) -> Self {
        Self::LockError(err.to_string())
    }
}
