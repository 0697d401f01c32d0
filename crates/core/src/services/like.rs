//! Like toggles.

use crate::caller::Caller;
use crate::services::blob::ensure_visible;
use blobhub_common::{AppError, AppResult};
use blobhub_db::{
    DocumentStore,
    entities::{self, BlobRecord, LikeEdge, blob, like},
    repositories::LikeRepository,
};
use serde::Serialize;
use tracing::debug;

/// State after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutcome {
    /// Whether the caller now likes the blob.
    pub liked: bool,
    /// The blob's like counter after the toggle.
    pub likes: u64,
}

/// Like service for business logic.
#[derive(Clone, Debug)]
pub struct LikeService {
    store: DocumentStore,
    like_repo: LikeRepository,
}

impl LikeService {
    /// Create a new like service.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self {
            like_repo: LikeRepository::new(store.clone()),
            store,
        }
    }

    /// Flip the caller's like on a blob.
    ///
    /// The edge and the counter change in one transaction, so concurrent
    /// toggles can never leave `likes` out of step with the edges.
    pub async fn toggle_like(&self, caller: &Caller, blob_id: &str) -> AppResult<LikeOutcome> {
        let outcome = self
            .store
            .run_transaction(|tx| {
                let viewer = caller.clone();
                let blob_id = blob_id.to_string();
                Box::pin(async move {
                    let blob_path = blob::path(&blob_id);
                    let mut record = tx
                        .get_as::<BlobRecord>(&blob_path)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Blob: {blob_id}")))?;
                    ensure_visible(&record, Some(&viewer))?;

                    let edge_path = like::path(&blob_id, &viewer.uid);
                    let liked = if tx.exists(&edge_path).await? {
                        tx.delete(&edge_path);
                        record.likes = record.likes.saturating_sub(1);
                        false
                    } else {
                        tx.set(
                            &edge_path,
                            &LikeEdge {
                                uid: viewer.uid.clone(),
                                ts: entities::now(),
                            },
                        )?;
                        record.likes = record.likes.saturating_add(1);
                        true
                    };
                    tx.set(&blob_path, &record)?;

                    Ok(LikeOutcome {
                        liked,
                        likes: record.likes,
                    })
                })
            })
            .await?;

        debug!(
            blob_id = %blob_id,
            user_id = %caller.uid,
            liked = outcome.liked,
            likes = outcome.likes,
            "Like toggled"
        );
        Ok(outcome)
    }

    /// Whether the caller likes a blob.
    pub async fn has_liked(&self, caller: &Caller, blob_id: &str) -> AppResult<bool> {
        self.like_repo.exists(blob_id, &caller.uid).await
    }
}
