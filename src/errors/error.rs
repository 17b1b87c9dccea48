use serde::Serialize;
use thiserror::Error;

/// Store-level errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Batch of {requested} operations exceeds the store limit of {limit}")]
    BatchLimitExceeded { limit: usize, requested: usize },

    #[error("Document payload error: {0}")]
    Payload(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Record not found: {0} with ID {1}")]
    NotFound(String, String),

    #[error("Database error: {0}")]
    Other(String),
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("DbError", 2)?;
        let (kind, message) = match self {
            DbError::Sqlx(err) => ("Sqlx", err.to_string()),
            DbError::BatchLimitExceeded { .. } => ("BatchLimitExceeded", self.to_string()),
            DbError::Payload(s) => ("Payload", s.clone()),
            DbError::Transaction(s) => ("Transaction", s.clone()),
            DbError::NotFound(_, _) => ("NotFound", self.to_string()),
            DbError::Other(s) => ("Other", s.clone()),
        };
        state.serialize_field("type", kind)?;
        state.serialize_field("message", &message)?;
        state.end()
    }
}

/// Manual Clone implementation for DbError; sqlx errors degrade to their message.
impl Clone for DbError {
    fn clone(&self) -> Self {
        match self {
            DbError::Sqlx(err) => DbError::Other(format!("SQLx error: {}", err)),
            DbError::BatchLimitExceeded { limit, requested } => DbError::BatchLimitExceeded {
                limit: *limit,
                requested: *requested,
            },
            DbError::Payload(s) => DbError::Payload(s.clone()),
            DbError::Transaction(s) => DbError::Transaction(s.clone()),
            DbError::NotFound(s1, s2) => DbError::NotFound(s1.clone(), s2.clone()),
            DbError::Other(s) => DbError::Other(s.clone()),
        }
    }
}

/// Domain-level errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum DomainError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Entity not found: {0} with ID {1}")]
    EntityNotFound(String, String),

    #[error("Invalid document in {collection} with ID {id}: {reason}")]
    InvalidDocument {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("Scan of {collection} failed: {message}")]
    Scan { collection: String, message: String },

    #[error("Batch commit failed after {committed} of {total} operations: {message}")]
    PartialBatch {
        committed: usize,
        total: usize,
        message: String,
    },

    #[error("External service error: {0}")]
    External(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Service-level errors (caller facing)
#[derive(Debug, Error, Clone, Serialize)]
pub enum ServiceError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Account deletion failed during {stage}: {message}")]
    AccountDeletion { stage: String, message: String },

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Validation errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' contains an invalid value: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unknown_operation(op: &str) -> Self {
        Self::UnknownOperation(op.to_string())
    }
}
