// ABOUTME: Error types for the staging store
// ABOUTME: A store miss is not an error; only backend failures surface here

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagingError {
    /// Backend could not be reached or the connection dropped
    #[error("Staging store connection error: {0}")]
    Connection(String),

    /// Backend rejected or failed a command
    #[error("Staging store command failed: {0}")]
    Command(String),

    #[error("Invalid script id: {0}")]
    InvalidId(String),
}

impl From<redis::RedisError> for StagingError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            StagingError::Connection(err.to_string())
        } else {
            StagingError::Command(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, StagingError>;
