//! API endpoints.

mod archive;
mod blobs;
mod following;
mod profiles;
mod usage;

use axum::{Router, middleware::from_fn};
use serde::Deserialize;

use crate::middleware::{AppState, auth_middleware};

/// Page size when a listing does not ask for one.
const DEFAULT_LIMIT: usize = 20;

/// `?limit=` on listing endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

impl ListQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(blobs::router())
        .merge(usage::router())
        .merge(following::router())
        .merge(profiles::router())
        .merge(archive::router())
        .layer(from_fn(auth_middleware))
}
