// ABOUTME: Turns an orchestrator result into the HTTP response
// ABOUTME: Success becomes 200 with logs and duration, everything else goes through AppError

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use evald_sandbox::{ExecutionOutcome, SandboxError};

use crate::error::AppError;

pub fn relay(result: Result<ExecutionOutcome, SandboxError>) -> Response {
    match result {
        Ok(ExecutionOutcome::Success(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(ExecutionOutcome::Failure(failure)) => {
            AppError::ExecutionFailed(failure.error).into_response()
        }
        Err(e) => AppError::Sandbox(e).into_response(),
    }
}
