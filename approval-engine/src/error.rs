use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApprovalError {
    #[error("Unknown approval status: {0}")]
    InvalidStatus(String),

    #[error("Unknown role: {0}")]
    InvalidRole(String),

    #[error("Unknown action: {0}")]
    InvalidAction(String),

    #[error("Approval storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ApprovalError>;
