use thiserror::Error;

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("invalid message id: {0}")]
    InvalidMessageId(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type InboxResult<T> = Result<T, InboxError>;
