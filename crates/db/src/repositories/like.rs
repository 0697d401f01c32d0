//! Like repository.

use crate::entities::{LikeEdge, like};
use crate::store::DocumentStore;
use blobhub_common::AppResult;

/// Reads of like edges.
#[derive(Clone, Debug)]
pub struct LikeRepository {
    store: DocumentStore,
}

impl LikeRepository {
    /// Create a new like repository.
    #[must_use]
    pub const fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Whether `user_id` likes `blob_id`.
    pub async fn exists(&self, blob_id: &str, user_id: &str) -> AppResult<bool> {
        Ok(self.store.get(&like::path(blob_id, user_id)).await?.is_some())
    }

    /// Every like edge of a blob.
    pub async fn find_by_blob(&self, blob_id: &str) -> AppResult<Vec<LikeEdge>> {
        self.store
            .list(&like::collection(blob_id))
            .await?
            .iter()
            .map(|snapshot| snapshot.decode())
            .collect()
    }

    /// Delete every like edge of a blob. Returns how many were removed.
    pub async fn delete_by_blob(&self, blob_id: &str) -> AppResult<usize> {
        let paths: Vec<String> = self
            .store
            .list(&like::collection(blob_id))
            .await?
            .into_iter()
            .map(|snapshot| snapshot.path)
            .collect();
        self.store.delete_all(&paths).await?;
        Ok(paths.len())
    }
}
