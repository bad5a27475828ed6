// HTTP request handlers
use crate::application::access_service::{AccessError, AccessOutcome};
use crate::application::dashboard_registry::{LiveDashboard, RegistryError};
use crate::application::dashboard_service::DashboardView;
use crate::infrastructure::http_response::{sse_response, svg_response};
use crate::presentation::app_state::AppState;
use crate::rendering::mesh_scene::Frame;
use crate::rendering::mesh_svg::MeshSvg;
use crate::rendering::mesh_viewer::{CameraCommand, ViewerError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeRequest {
    pub phone_number: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    pub phone_number: String,
    pub code: String,
}

pub enum HandlerError {
    Registry(RegistryError),
    NotFound,
    Access(AccessError),
    Viewer(ViewerError),
}

impl From<RegistryError> for HandlerError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<ViewerError> for HandlerError {
    fn from(e: ViewerError) -> Self {
        Self::Viewer(e)
    }
}

impl From<AccessError> for HandlerError {
    fn from(e: AccessError) -> Self {
        Self::Access(e)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Registry(e @ RegistryError::InvalidClientId(_)) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Registry(e @ RegistryError::Full(_)) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::Viewer(e) => {
                let status = match e {
                    ViewerError::Locked => StatusCode::CONFLICT,
                    ViewerError::InvalidScale(_) => StatusCode::BAD_REQUEST,
                    ViewerError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, e.to_string())
            }
            Self::Access(e) => {
                let status = match e {
                    AccessError::InvalidPhone | AccessError::EmptyCode => StatusCode::BAD_REQUEST,
                    AccessError::Rejected(_) => StatusCode::UNAUTHORIZED,
                    AccessError::Unavailable(_) => {
                        tracing::error!("Access gateway failed: {:#}", e);
                        StatusCode::BAD_GATEWAY
                    }
                };
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

fn dashboard(state: &AppState, client_id: &str) -> Result<Arc<LiveDashboard>, HandlerError> {
    Ok(state.registry.get_or_start(client_id)?)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current page view for a client, starting its pollers on first request
pub async fn get_dashboard(
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardView>, HandlerError> {
    let live = dashboard(&state, &client_id)?;
    Ok(Json(state.dashboard_service.view(&live.snapshot())))
}

pub async fn get_chart(
    Path((client_id, chart_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, HandlerError> {
    if !state.dashboard_service.has_chart(&chart_id) {
        return Err(HandlerError::NotFound);
    }
    let live = dashboard(&state, &client_id)?;
    let svg = state
        .dashboard_service
        .render_chart(&chart_id, &live.snapshot())
        .ok_or(HandlerError::NotFound)?;
    Ok(svg_response(svg).into_response())
}

/// Latest frame from the client's render loop
pub async fn get_mesh(
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, HandlerError> {
    let live = dashboard(&state, &client_id)?;
    let svg = match live.latest_frame() {
        Some(frame) => MeshSvg::render(&frame),
        None => {
            let (width, height) = state.registry.viewer_options().viewport;
            MeshSvg::render(&Frame {
                width,
                height,
                placeholder: Some("loading".to_string()),
                ..Default::default()
            })
        }
    };
    Ok(svg_response(svg).into_response())
}

pub async fn post_camera(
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(command): Json<CameraCommand>,
) -> Result<StatusCode, HandlerError> {
    let live = dashboard(&state, &client_id)?;
    live.camera(command)?;
    Ok(StatusCode::ACCEPTED)
}

/// One `snapshot` event per change of the client's dashboard
pub async fn dashboard_events(
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, HandlerError> {
    let live = dashboard(&state, &client_id)?;
    let service = state.dashboard_service.clone();
    // an open stream keeps the dashboard from going idle
    let watched = Arc::downgrade(&live);
    Ok(sse_response(live.subscribe(), "snapshot", move |snapshot| {
        if let Some(live) = watched.upgrade() {
            live.touch();
        }
        service.view(snapshot)
    })
    .into_response())
}

pub async fn send_code(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendCodeRequest>,
) -> Result<Json<AccessOutcome>, HandlerError> {
    Ok(Json(state.access_service.send_code(&request.phone_number).await?))
}

pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<Json<AccessOutcome>, HandlerError> {
    Ok(Json(
        state
            .access_service
            .verify_code(&request.phone_number, &request.code)
            .await?,
    ))
}
