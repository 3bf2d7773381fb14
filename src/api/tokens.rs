//! Token catalog endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::swap::Token;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    /// Symbol substring; empty or missing lists everything
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub tokens: Vec<Token>,
    pub count: usize,
}

/// GET /api/tokens?q=
pub async fn list_tokens(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Json<TokensResponse> {
    let tokens = state.session_manager.catalog().search(&query.q);
    Json(TokensResponse {
        count: tokens.len(),
        tokens,
    })
}
