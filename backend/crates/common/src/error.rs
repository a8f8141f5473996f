use thiserror::Error;

/// Errors raised by the store and configuration layers.
#[derive(Debug, Error)]
pub enum JobfeedError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl JobfeedError {
    /// Store failures are worth retrying on the next run; the rest need an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

pub type JobfeedResult<T> = Result<T, JobfeedError>;
