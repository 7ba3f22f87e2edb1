// ABOUTME: API error type and its HTTP mapping
// ABOUTME: Sanitises staging and sandbox failures into stable caller-facing messages

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use evald_sandbox::SandboxError;
use evald_staging::StagingError;

/// Error type returned by every handler
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing code")]
    MissingCode,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// The untrusted code ran, but the wrapper reported a failure
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error body, `{error: <message>}`
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingCode | AppError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AppError::ExecutionFailed(_)
            | AppError::Staging(_)
            | AppError::Sandbox(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller. Payloads, ids and io details stay in the logs.
    pub fn to_user_message(&self) -> String {
        match self {
            AppError::MissingCode => "Missing code".to_string(),
            AppError::InvalidBody(_) => "Invalid request body".to_string(),
            AppError::ExecutionFailed(message) => format!("Execution failed: {}", message),
            AppError::Staging(_) => "Failed to stage script".to_string(),
            AppError::Sandbox(sandbox_error) => match sandbox_error {
                SandboxError::LaunchFailed(_) => "Failed to start sandbox worker".to_string(),
                SandboxError::Timeout { millis } => {
                    format!("Execution timed out after {} ms", millis)
                }
                SandboxError::WorkerExited => {
                    "Sandbox worker exited without a result".to_string()
                }
                SandboxError::UnexpectedMessage(_)
                | SandboxError::MalformedMessage(_)
                | SandboxError::MessageTooLarge { .. } => {
                    "Sandbox worker sent an unexpected message".to_string()
                }
                SandboxError::Io(_) => "Sandbox execution failed".to_string(),
            },
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        match &self {
            AppError::Sandbox(sandbox_error) if sandbox_error.is_protocol_violation() => {
                error!(
                    request_id = %request_id,
                    error = ?sandbox_error,
                    "Sandbox protocol violation"
                );
            }
            AppError::Sandbox(SandboxError::Timeout { millis }) => {
                warn!(request_id = %request_id, timeout_ms = millis, "Execution timed out");
            }
            AppError::Sandbox(sandbox_error) => {
                error!(request_id = %request_id, error = %sandbox_error, "Sandbox error");
            }
            AppError::Staging(staging_error) => {
                error!(request_id = %request_id, error = %staging_error, "Staging store error");
            }
            AppError::Internal(message) => {
                error!(request_id = %request_id, error = %message, "Internal server error occurred");
            }
            _ => {
                info!(
                    request_id = %request_id,
                    status = %status_code,
                    error = %self,
                    "API error response"
                );
            }
        }

        let body = ErrorResponse {
            error: self.to_user_message(),
        };
        (status_code, Json(body)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Internal(format!("Invalid script URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(AppError::MissingCode, StatusCode::BAD_REQUEST, "Missing code")]
    #[case(
        AppError::InvalidBody("expected value at line 1".to_string()),
        StatusCode::BAD_REQUEST,
        "Invalid request body"
    )]
    #[case(
        AppError::ExecutionFailed("boom".to_string()),
        StatusCode::INTERNAL_SERVER_ERROR,
        "Execution failed: boom"
    )]
    #[case(
        AppError::Staging(StagingError::Connection("refused".to_string())),
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to stage script"
    )]
    #[case(
        AppError::Sandbox(SandboxError::LaunchFailed("deno: not found".to_string())),
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to start sandbox worker"
    )]
    #[case(
        AppError::Sandbox(SandboxError::Timeout { millis: 10_000 }),
        StatusCode::INTERNAL_SERVER_ERROR,
        "Execution timed out after 10000 ms"
    )]
    #[case(
        AppError::Sandbox(SandboxError::WorkerExited),
        StatusCode::INTERNAL_SERVER_ERROR,
        "Sandbox worker exited without a result"
    )]
    #[case(
        AppError::Sandbox(SandboxError::UnexpectedMessage(json!({"secret": "payload"}))),
        StatusCode::INTERNAL_SERVER_ERROR,
        "Sandbox worker sent an unexpected message"
    )]
    #[case(
        AppError::Sandbox(SandboxError::MessageTooLarge { limit: 8 }),
        StatusCode::INTERNAL_SERVER_ERROR,
        "Sandbox worker sent an unexpected message"
    )]
    fn test_status_and_message(
        #[case] error: AppError,
        #[case] status: StatusCode,
        #[case] message: &str,
    ) {
        assert_eq!(error.status_code(), status);
        assert_eq!(error.to_user_message(), message);
    }
}
