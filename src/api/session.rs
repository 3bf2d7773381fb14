//! Session and wallet endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::api::AppState;
use crate::swap::FlowView;
use crate::types::{ApiError, ApiResult};

/// A session id with the full render state of its flow
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub view: FlowView,
}

impl SessionResponse {
    pub fn new(session_id: String, view: FlowView) -> Self {
        Self { session_id, view }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub session_id: String,
}

/// POST /api/session - Start a new swap flow
pub async fn create_session(State(state): State<AppState>) -> ApiResult<Json<SessionResponse>> {
    let session_id = state.session_manager.create_session().await;
    let flow = state.flow(&session_id).await?;
    Ok(Json(SessionResponse::new(session_id, flow.view())))
}

/// GET /api/session/:id - Current flow state
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    Ok(Json(SessionResponse::new(id, flow.view())))
}

/// DELETE /api/session/:id - Drop the flow
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    if !state.session_manager.remove_session(&id).await {
        return Err(ApiError::NotFound(format!("Session not found: {}", id)));
    }
    tracing::info!("Removed swap session {}", id);
    Ok(Json(DeleteResponse {
        success: true,
        session_id: id,
    }))
}

/// POST /api/session/:id/reset - Back to the initial session
pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    flow.reset().await;
    Ok(Json(SessionResponse::new(id, flow.view())))
}

/// DELETE /api/session/:id/last-tx - Dismiss the last receipt
pub async fn clear_last_tx(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    flow.clear_last_tx();
    Ok(Json(SessionResponse::new(id, flow.view())))
}

/// POST /api/session/:id/wallet/connect
///
/// Connection failures are reported in `wallet.error`, not as an HTTP error.
pub async fn connect_wallet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    let wallet = flow.connect_wallet().await;
    tracing::info!("Session {} wallet {:?}", id, wallet.status);
    Ok(Json(SessionResponse::new(id, flow.view())))
}

/// POST /api/session/:id/wallet/disconnect
pub async fn disconnect_wallet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    flow.disconnect_wallet().await;
    Ok(Json(SessionResponse::new(id, flow.view())))
}

/// POST /api/session/:id/wallet/refresh - Re-read account, chain and balance
pub async fn refresh_wallet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    flow.refresh_wallet().await;
    Ok(Json(SessionResponse::new(id, flow.view())))
}
