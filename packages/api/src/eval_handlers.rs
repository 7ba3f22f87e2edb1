// ABOUTME: Code evaluation endpoint
// ABOUTME: Wraps the submitted code, stages it and runs it in a fresh sandbox worker

use axum::{body::Bytes, extract::State, response::Response};
use serde::Deserialize;
use tracing::{debug, info};

use evald_sandbox::{generate_wrapper, FrameToken};

use crate::error::{ApiResult, AppError};
use crate::relay::relay;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EvalRequest {
    #[serde(default)]
    pub code: Option<String>,
}

/// POST /eval
///
/// The body is parsed as JSON whatever its declared content type.
pub async fn eval(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request: EvalRequest =
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidBody(e.to_string()))?;

    let code = request
        .code
        .filter(|code| !code.is_empty())
        .ok_or(AppError::MissingCode)?;

    let frame_token = FrameToken::generate();
    let script_id = state
        .store
        .put(generate_wrapper(&code, &frame_token))
        .await?;
    let script_url = state.script_url(&script_id)?;
    debug!(
        %script_id,
        code_bytes = code.len(),
        ttl_secs = state.store.ttl().as_secs(),
        "Staged script"
    );

    info!(
        %script_id,
        runtime = state.orchestrator.runtime_name(),
        timeout_ms = state.orchestrator.timeout().as_millis() as u64,
        "Evaluating submission"
    );
    Ok(relay(state.orchestrator.execute(script_url, frame_token).await))
}
