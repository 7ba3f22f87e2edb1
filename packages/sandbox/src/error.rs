// ABOUTME: Error types for sandbox execution
// ABOUTME: Every sandbox-side failure is normalized into one of these before reaching the API

use serde_json::Value;
use thiserror::Error;

/// Main error type for sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Worker process could not be started
    #[error("Sandbox worker failed to start: {0}")]
    LaunchFailed(String),

    /// No message arrived within the configured bound
    #[error("Execution timed out after {millis} ms")]
    Timeout { millis: u64 },

    /// Worker ended without posting its result
    #[error("Sandbox worker exited without a result")]
    WorkerExited,

    /// Message did not have the `{type: "response", data}` shape
    #[error("Unexpected message from sandbox worker: {0}")]
    UnexpectedMessage(Value),

    /// Result frame was not valid JSON
    #[error("Malformed message from sandbox worker: {0}")]
    MalformedMessage(String),

    /// Result frame exceeded the configured size
    #[error("Sandbox worker message exceeded {limit} bytes")]
    MessageTooLarge { limit: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    /// Whether the worker broke the one-message protocol, as opposed to the
    /// service failing to run it.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            SandboxError::UnexpectedMessage(_)
                | SandboxError::MalformedMessage(_)
                | SandboxError::MessageTooLarge { .. }
        )
    }
}

/// Type alias for Results that return SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;
