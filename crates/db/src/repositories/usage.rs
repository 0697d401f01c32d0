//! Usage repository.

use crate::entities::{UserUsage, user_usage};
use crate::store::DocumentStore;
use blobhub_common::AppResult;

/// Reads of per-user usage documents. Writes go through transactions only.
#[derive(Clone, Debug)]
pub struct UsageRepository {
    store: DocumentStore,
}

impl UsageRepository {
    /// Create a new usage repository.
    #[must_use]
    pub const fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// A user's usage document, if one was ever written.
    pub async fn find(&self, user_id: &str) -> AppResult<Option<UserUsage>> {
        self.store.get_as(&user_usage::path(user_id)).await
    }

    /// Bytes currently counted for a user.
    pub async fn total_bytes_used(&self, user_id: &str) -> AppResult<u64> {
        Ok(self
            .find(user_id)
            .await?
            .map_or(0, |usage| usage.total_bytes_used))
    }
}
