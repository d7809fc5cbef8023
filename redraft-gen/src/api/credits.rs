//! Credit balance and fetch credential endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::CreditTransaction;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SetCredentialRequest {
    pub credential: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub amount: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub owner: String,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub owner: String,
    pub balance: i64,
    pub transactions: Vec<CreditTransaction>,
}

/// PUT /credentials/:owner
///
/// Stores the credential used for content-detail fetches. Required before a
/// task can be started.
pub async fn set_credential(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(request): Json<SetCredentialRequest>,
) -> ApiResult<StatusCode> {
    if request.credential.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "credential cannot be empty or whitespace-only".to_string(),
        ));
    }

    crate::db::credentials::set_credential(&state.db, &owner, request.credential.trim()).await?;
    info!(owner = %owner, "Fetch credential stored");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /credits/:owner
pub async fn get_credits(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> ApiResult<Json<CreditsResponse>> {
    let balance = state.ledger.balance(&owner).await?;
    let transactions = state.ledger.transactions(&owner).await?;

    Ok(Json(CreditsResponse {
        owner,
        balance,
        transactions,
    }))
}

/// POST /credits/:owner/grant
pub async fn grant_credits(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(request): Json<GrantRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let reason = request
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "administrative grant".to_string());

    let balance = state.ledger.grant(&owner, request.amount, &reason).await?;
    Ok(Json(BalanceResponse { owner, balance }))
}

/// Build credit and credential routes
pub fn credit_routes() -> Router<AppState> {
    Router::new()
        .route("/credentials/:owner", put(set_credential))
        .route("/credits/:owner", get(get_credits))
        .route("/credits/:owner/grant", post(grant_credits))
}
