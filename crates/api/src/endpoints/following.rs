//! Following endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use blobhub_common::AppResult;
use blobhub_db::entities::FollowEdge;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ListQuery;
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Follow toggle request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}

/// Follow toggle response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub following: bool,
}

/// Follow or unfollow a user.
async fn toggle(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<FollowRequest>,
) -> AppResult<ApiResponse<FollowResponse>> {
    req.validate()?;
    let following = state
        .following_service
        .toggle_follow(&caller, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(FollowResponse { following }))
}

/// Whether the caller follows a user.
async fn status(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<FollowResponse>> {
    let following = state
        .following_service
        .is_following(&caller.uid, &user_id)
        .await?;
    Ok(ApiResponse::ok(FollowResponse { following }))
}

/// A user's followers.
async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<FollowEdge>>> {
    let edges = state
        .following_service
        .followers(&user_id, query.limit())
        .await?;
    Ok(ApiResponse::ok(edges))
}

/// Users a user follows.
async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<FollowEdge>>> {
    let edges = state
        .following_service
        .following(&user_id, query.limit())
        .await?;
    Ok(ApiResponse::ok(edges))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/following/toggle", post(toggle))
        .route("/following/{id}", get(status))
        .route("/users/{id}/followers", get(followers))
        .route("/users/{id}/following", get(following))
}
