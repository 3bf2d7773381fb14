//! API endpoints for the swap engine

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

mod session;
mod swap;
mod tokens;

use crate::swap::{SessionManager, SwapFlow};
use crate::types::{ApiError, ApiResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
}

impl AppState {
    pub fn new(session_manager: Arc<SessionManager>) -> Self {
        Self { session_manager }
    }

    async fn flow(&self, id: &str) -> ApiResult<Arc<SwapFlow>> {
        self.session_manager
            .get_session(id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", id)))
    }
}

/// Create the API router with all endpoints
pub fn router(session_manager: Arc<SessionManager>) -> Router {
    let app_state = AppState::new(session_manager);

    Router::new()
        // Catalog
        .route("/tokens", get(tokens::list_tokens))
        // Session management
        .route("/session", post(session::create_session))
        .route(
            "/session/:id",
            get(session::get_session).delete(session::delete_session),
        )
        .route("/session/:id/reset", post(session::reset_session))
        .route("/session/:id/last-tx", delete(session::clear_last_tx))
        // Wallet
        .route("/session/:id/wallet/connect", post(session::connect_wallet))
        .route("/session/:id/wallet/disconnect", post(session::disconnect_wallet))
        .route("/session/:id/wallet/refresh", post(session::refresh_wallet))
        // Flow intents
        .route("/session/:id/step", post(swap::change_step))
        .route("/session/:id/pair", post(swap::set_pair))
        .route("/session/:id/amount", post(swap::set_amount))
        .route("/session/:id/privacy", post(swap::set_privacy))
        .route("/session/:id/quote/refresh", post(swap::refresh_quote))
        .route("/session/:id/allowance/refresh", post(swap::refresh_allowance))
        .route("/session/:id/approve", post(swap::approve))
        .route("/session/:id/swap", post(swap::execute_swap))
        .with_state(app_state)
}
