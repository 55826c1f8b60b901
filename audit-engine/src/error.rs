use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Unknown audit severity: {0}")]
    InvalidSeverity(String),

    #[error("Unknown audit category: {0}")]
    InvalidCategory(String),

    #[error("Audit storage error: {0}")]
    StorageError(String),

    #[error("Stored audit record is malformed: {0}")]
    InvalidRow(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
