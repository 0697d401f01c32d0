//! Archive endpoints.

use axum::{Router, extract::State, routing::post};
use blobhub_common::AppResult;
use blobhub_core::SweepReport;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Archive the caller's blobs left unread past the retention window.
async fn sweep(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<SweepReport>> {
    let report = state.archive_service.sweep_user(&caller.uid).await?;
    Ok(ApiResponse::ok(report))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/archive/sweep", post(sweep))
}
