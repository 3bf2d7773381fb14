//! Flow intent endpoints
//!
//! Each handler forwards one user intent to the session's `SwapFlow` and
//! answers with the resulting view. Engine refusals come back as 422.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::session::SessionResponse;
use crate::api::AppState;
use crate::swap::quote::QuoteOutcome;
use crate::swap::session::TransactionReceipt;
use crate::swap::FlowState;
use crate::types::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepRequest {
    Next,
    Back,
    Select { target: FlowState },
    NewSwap,
}

/// Either one side of the pair or a flip
#[derive(Debug, Deserialize)]
pub struct PairRequest {
    pub token_in: Option<String>,
    pub token_out: Option<String>,
    #[serde(default)]
    pub flip: bool,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Option<String>,
    /// Use the whole input-token balance
    #[serde(default)]
    pub max: bool,
}

#[derive(Debug, Deserialize)]
pub struct PrivacyRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    /// applied, cleared or superseded
    pub outcome: &'static str,
    #[serde(flatten)]
    pub session: SessionResponse,
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub hash: String,
    #[serde(flatten)]
    pub session: SessionResponse,
}

#[derive(Debug, Serialize)]
pub struct SwapResponse {
    pub receipt: TransactionReceipt,
    #[serde(flatten)]
    pub session: SessionResponse,
}

/// POST /api/session/:id/step - next | back | select | new_swap
pub async fn change_step(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StepRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    let step = match req {
        StepRequest::Next => flow.next_step().await?,
        StepRequest::Back => flow.back_step()?,
        StepRequest::Select { target } => flow.select_step(target).await?,
        StepRequest::NewSwap => flow.start_new_swap().await?,
    };
    tracing::debug!("Session {} now at {}", id, step);
    Ok(Json(SessionResponse::new(id, flow.view())))
}

/// POST /api/session/:id/pair
pub async fn set_pair(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PairRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    match req {
        PairRequest { flip: true, .. } => flow.flip_pair().await?,
        PairRequest {
            token_in: Some(token),
            token_out: None,
            ..
        } => flow.select_token_in(&token).await?,
        PairRequest {
            token_in: None,
            token_out: Some(token),
            ..
        } => flow.select_token_out(&token).await?,
        _ => {
            return Err(ApiError::BadRequest(
                "expected exactly one of token_in, token_out or flip".into(),
            ))
        }
    };
    Ok(Json(SessionResponse::new(id, flow.view())))
}

/// POST /api/session/:id/amount
pub async fn set_amount(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    match (req.max, req.amount) {
        (true, _) => {
            flow.use_max_amount().await?;
        }
        (false, Some(amount)) => flow.set_amount(&amount).await,
        (false, None) => return Err(ApiError::BadRequest("amount or max is required".into())),
    }
    Ok(Json(SessionResponse::new(id, flow.view())))
}

/// POST /api/session/:id/privacy
pub async fn set_privacy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PrivacyRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    flow.set_privacy(req.enabled);
    Ok(Json(SessionResponse::new(id, flow.view())))
}

/// POST /api/session/:id/quote/refresh
pub async fn refresh_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<QuoteResponse>> {
    let flow = state.flow(&id).await?;
    let outcome = match flow.refresh_quote().await {
        QuoteOutcome::Applied(_) => "applied",
        QuoteOutcome::Cleared => "cleared",
        QuoteOutcome::Superseded => "superseded",
        QuoteOutcome::Failed(e) => return Err(e.into()),
    };
    Ok(Json(QuoteResponse {
        outcome,
        session: SessionResponse::new(id, flow.view()),
    }))
}

/// POST /api/session/:id/allowance/refresh
pub async fn refresh_allowance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let flow = state.flow(&id).await?;
    flow.refresh_allowance().await;
    Ok(Json(SessionResponse::new(id, flow.view())))
}

/// POST /api/session/:id/approve - Approve exactly the input amount
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApproveResponse>> {
    let flow = state.flow(&id).await?;
    let hash = flow.approve().await?;
    Ok(Json(ApproveResponse {
        hash,
        session: SessionResponse::new(id, flow.view()),
    }))
}

/// POST /api/session/:id/swap - Submit the reviewed swap and wait for it
pub async fn execute_swap(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SwapResponse>> {
    let flow = state.flow(&id).await?;
    let receipt = flow.swap().await?;
    Ok(Json(SwapResponse {
        receipt,
        session: SessionResponse::new(id, flow.view()),
    }))
}
