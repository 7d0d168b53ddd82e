use service_core::error::AppError;
use thiserror::Error;

/// Error kinds raised by providers and services.
///
/// Domain services propagate these unchanged after aborting their
/// transaction; the HTTP layer maps them through `From<CrudError> for AppError`.
#[derive(Error, Debug)]
pub enum CrudError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to start transaction: {0}")]
    TransactionStart(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CrudError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        CrudError::NotFound(format!("{} '{}' was not found", kind, id))
    }

    pub fn conflict(kind: &str, id: &str) -> Self {
        CrudError::Conflict(format!("{} '{}' already exists", kind, id))
    }

    pub fn invalid_credentials() -> Self {
        CrudError::Unauthorized("Invalid credentials".to_string())
    }
}

impl From<CrudError> for AppError {
    fn from(err: CrudError) -> Self {
        match err {
            CrudError::BadRequest(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            CrudError::Unauthorized(msg) => AppError::Unauthorized(anyhow::anyhow!(msg)),
            CrudError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            CrudError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            CrudError::TransactionStart(msg) => {
                AppError::DatabaseError(anyhow::anyhow!("Failed to start transaction: {}", msg))
            }
            CrudError::Cancelled => AppError::InternalError(anyhow::anyhow!("Operation cancelled")),
            CrudError::Internal(e) => AppError::InternalError(e),
        }
    }
}

impl From<serde_json::Error> for CrudError {
    fn from(err: serde_json::Error) -> Self {
        CrudError::Internal(anyhow::Error::new(err))
    }
}
