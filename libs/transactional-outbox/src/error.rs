use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no routing key for event type {0}")]
    Unroutable(String),
}

pub type OutboxResult<T> = Result<T, OutboxError>;
