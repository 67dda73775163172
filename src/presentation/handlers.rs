// HTTP request handlers
use crate::application::control_panel::{ControlPanel, PanelError};
use crate::application::panel_view::PanelView;
use crate::domain::telemetry::SaveSummary;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct VolumeRequest {
    pub volume: i32,
}

#[derive(Deserialize)]
pub struct VolumeInputRequest {
    pub value: String,
}

#[derive(Serialize)]
pub struct SaveResponse {
    pub summary: Option<SaveSummary>,
    pub message: Option<String>,
    pub panel: PanelView,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Open (or re-read) the control panel of a speaker
pub async fn get_panel(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match open_panel(&state, &id).await {
        Ok(panel) => Json(panel.snapshot().await).into_response(),
        Err(response) => response,
    }
}

/// Tear down a panel and stop its polling
pub async fn close_panel(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.registry.close(&id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => panel_error_response(&state, &id, e),
    }
}

pub async fn toggle(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let panel = match open_panel(&state, &id).await {
        Ok(panel) => panel,
        Err(response) => return response,
    };
    log_outcome(&panel, "toggle", panel.toggle_status().await);
    Json(panel.snapshot().await).into_response()
}

pub async fn set_volume(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<VolumeRequest>,
) -> Response {
    let panel = match open_panel(&state, &id).await {
        Ok(panel) => panel,
        Err(response) => return response,
    };
    log_outcome(&panel, "set volume", panel.set_volume(request.volume).await);
    Json(panel.snapshot().await).into_response()
}

pub async fn volume_input(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<VolumeInputRequest>,
) -> Response {
    let panel = match open_panel(&state, &id).await {
        Ok(panel) => panel,
        Err(response) => return response,
    };
    log_outcome(&panel, "volume input", panel.on_volume_input(&request.value).await);
    Json(panel.snapshot().await).into_response()
}

pub async fn increase_volume(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let panel = match open_panel(&state, &id).await {
        Ok(panel) => panel,
        Err(response) => return response,
    };
    log_outcome(&panel, "increase volume", panel.increase_volume().await);
    Json(panel.snapshot().await).into_response()
}

pub async fn decrease_volume(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let panel = match open_panel(&state, &id).await {
        Ok(panel) => panel,
        Err(response) => return response,
    };
    log_outcome(&panel, "decrease volume", panel.decrease_volume().await);
    Json(panel.snapshot().await).into_response()
}

pub async fn volume_preset(
    Path((id, value)): Path<(String, i32)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let panel = match open_panel(&state, &id).await {
        Ok(panel) => panel,
        Err(response) => return response,
    };
    log_outcome(&panel, "volume preset", panel.set_volume_preset(value).await);
    Json(panel.snapshot().await).into_response()
}

/// End the session, reporting the recorded figures when it worked
pub async fn save(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let panel = match open_panel(&state, &id).await {
        Ok(panel) => panel,
        Err(response) => return response,
    };
    let summary = match panel.save_session().await {
        Ok(summary) => Some(summary),
        Err(e) => {
            log_outcome::<()>(&panel, "save", Err(e));
            None
        }
    };
    Json(SaveResponse {
        message: summary.as_ref().map(|s| format!("Session saved: {}", s)),
        summary,
        panel: panel.snapshot().await,
    })
    .into_response()
}

pub async fn reset(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let panel = match open_panel(&state, &id).await {
        Ok(panel) => panel,
        Err(response) => return response,
    };
    panel.reset().await;
    Json(panel.snapshot().await).into_response()
}

async fn open_panel(state: &AppState, id: &str) -> Result<ControlPanel, Response> {
    state
        .registry
        .open(id)
        .await
        .map_err(|e| panel_error_response(state, id, e))
}

fn panel_error_response(state: &AppState, id: &str, error: PanelError) -> Response {
    match error {
        PanelError::InvalidSpeakerId(_) => {
            tracing::warn!("refusing panel for speaker id {:?}", id);
            let view = PanelView::invalid(id, state.registry.settings());
            (StatusCode::BAD_REQUEST, Json(view)).into_response()
        }
        other => {
            tracing::error!("panel {} failed: {}", id, other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
        }
    }
}

// Command failures are already reflected in the panel view.
fn log_outcome<T>(panel: &ControlPanel, command: &str, outcome: Result<T, PanelError>) {
    if let Err(e) = outcome {
        tracing::info!(speaker_id = panel.speaker_id(), "{} not applied: {}", command, e);
    }
}
