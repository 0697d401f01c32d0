//! Profile endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use blobhub_common::AppResult;
use blobhub_core::ProfileUpdate;
use blobhub_db::entities::UserProfile;
use serde::Deserialize;
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Profile update request. Omitted fields stay, blank fields are cleared.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(max = 64))]
    pub display_name: Option<String>,
    #[validate(length(max = 1500))]
    pub bio: Option<String>,
    #[validate(length(max = 128))]
    pub location: Option<String>,
    #[validate(length(max = 254))]
    pub public_email: Option<String>,
    #[validate(length(max = 2048))]
    pub avatar_url: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            display_name: req.display_name,
            bio: req.bio,
            location: req.location,
            public_email: req.public_email,
            avatar_url: req.avatar_url,
        }
    }
}

/// A user's public profile.
async fn show(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<UserProfile>> {
    let profile = state.profile_service.get(&user_id).await?;
    Ok(ApiResponse::ok(profile))
}

/// Update the caller's profile.
async fn update(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<ApiResponse<UserProfile>> {
    req.validate()?;
    let profile = state.profile_service.update(&caller, req.into()).await?;
    Ok(ApiResponse::ok(profile))
}

/// Clear the caller's profile.
async fn clear(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserProfile>> {
    let profile = state.profile_service.clear(&caller).await?;
    Ok(ApiResponse::ok(profile))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profiles/{id}", get(show))
        .route("/i/profile", put(update).delete(clear))
}
