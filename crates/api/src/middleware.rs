//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use blobhub_common::{AppError, Limits, config::ArchiveConfig, is_path_safe};
use blobhub_core::{
    ArchiveService, BlobService, Caller, FollowingService, ForkService, LikeService,
    ProfileService, QuotaLedger,
};
use blobhub_db::DocumentStore;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller's display name.
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Application state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub quota_ledger: QuotaLedger,
    pub blob_service: BlobService,
    pub like_service: LikeService,
    pub following_service: FollowingService,
    pub fork_service: ForkService,
    pub archive_service: ArchiveService,
    pub profile_service: ProfileService,
}

impl AppState {
    /// Wire every service to one store.
    #[must_use]
    pub fn new(store: DocumentStore, limits: Limits, archive: &ArchiveConfig) -> Self {
        let quota_ledger = QuotaLedger::new(store.clone(), limits);
        Self {
            blob_service: BlobService::new(store.clone(), quota_ledger.clone()),
            like_service: LikeService::new(store.clone()),
            following_service: FollowingService::new(store.clone()),
            fork_service: ForkService::new(store.clone(), quota_ledger.clone()),
            archive_service: ArchiveService::new(store.clone(), quota_ledger.clone(), archive),
            profile_service: ProfileService::new(store),
            quota_ledger,
        }
    }
}

/// Identity middleware.
///
/// The gateway in front of the API authenticates users and forwards the id.
/// Requests without it run anonymously; a malformed id is rejected.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Response {
    let headers = req.headers();
    let uid = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string);
    let name = headers
        .get(USER_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    if let Some(uid) = uid {
        if !is_path_safe(&uid) {
            return AppError::Validation(format!("invalid {USER_ID_HEADER} header")).into_response();
        }
        req.extensions_mut()
            .insert(Caller::new(uid).with_display_name(name));
    }

    next.run(req).await
}
