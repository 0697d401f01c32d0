//! Quota usage endpoints.

use axum::{Router, extract::State, routing::{get, post}};
use blobhub_common::AppResult;
use blobhub_core::{Reconciliation, Usage};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// The caller's usage against the caps.
async fn show(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Usage>> {
    let usage = state.quota_ledger.usage(&caller.uid).await?;
    Ok(ApiResponse::ok(usage))
}

/// Recompute the caller's total from their blobs.
async fn reconcile(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Reconciliation>> {
    let result = state.quota_ledger.reconcile(&caller.uid).await?;
    Ok(ApiResponse::ok(result))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/usage", get(show))
        .route("/usage/reconcile", post(reconcile))
}
