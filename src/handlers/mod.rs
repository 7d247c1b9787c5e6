mod events;

pub use events::handle_events;

use crate::engine::EngineError;
use crate::models::StickyConfig;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

fn default_delay() -> u64 {
    20
}

/// Body for creating or replacing a channel's sticky configuration. The
/// control panel in front of this API performs the master/editor checks.
#[derive(Debug, Deserialize)]
pub struct SetStickyRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub extra_info: Option<String>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default = "default_delay")]
    pub repost_delay_secs: u64,
    pub channel_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetDelayRequest {
    pub seconds: u64,
}

/// PUT /api/sticky/{channel_id}
pub async fn put_sticky(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    Json(request): Json<SetStickyRequest>,
) -> Response {
    let config = StickyConfig {
        title: request.title,
        body: request.body,
        extra_info: request.extra_info,
        footer: request.footer,
        repost_delay_secs: request.repost_delay_secs,
        channel_name: request.channel_name,
    };

    match state.engine.set_sticky(&channel_id, config).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/sticky/{channel_id}
pub async fn delete_sticky(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Response {
    match state.engine.remove_sticky(&channel_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /api/sticky/{channel_id}/delay
pub async fn put_delay(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    Json(request): Json<SetDelayRequest>,
) -> Response {
    match state.engine.update_delay(&channel_id, request.seconds).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/sticky
pub async fn list_stickies(State(state): State<Arc<AppState>>) -> Response {
    Json(state.engine.list().await).into_response()
}

fn error_response(e: EngineError) -> Response {
    let status = match &e {
        EngineError::Config(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Store(_) => {
            tracing::error!("store failure in config api: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}
