// ABOUTME: Serves staged wrapper scripts to sandbox workers
// ABOUTME: Unknown, malformed and expired ids are all plain 404s

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use evald_sandbox::WRAPPER_CONTENT_TYPE;
use evald_staging::ScriptId;

use crate::state::AppState;

/// GET /scripts/{id}
pub async fn get_script(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match id.parse::<ScriptId>() {
        Ok(id) => id,
        Err(_) => {
            debug!(script_id = %id, "Rejected malformed script id");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    match state.store.get(&id).await {
        Ok(Some(content)) => (
            [
                (header::CONTENT_TYPE, WRAPPER_CONTENT_TYPE),
                (header::CACHE_CONTROL, "no-store"),
            ],
            content,
        )
            .into_response(),
        Ok(None) => {
            debug!(script_id = %id, "Staged script not found");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            error!(script_id = %id, error = %e, "Failed to read staged script");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
