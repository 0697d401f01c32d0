//! Blob repository.

use crate::entities::{BlobRecord, BlobStatus, ChunkDoc, Visibility, blob, chunk};
use crate::store::{Direction, DocumentStore, Query};
use blobhub_common::{AppError, AppResult};

/// Largest number of deletes sent in one write.
const DELETE_BATCH: usize = 400;

/// Non-transactional reads and chunk I/O for blobs.
#[derive(Clone, Debug)]
pub struct BlobRepository {
    store: DocumentStore,
}

impl BlobRepository {
    /// Create a new blob repository.
    #[must_use]
    pub const fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Find a blob by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<BlobRecord>> {
        self.store.get_as(&blob::path(id)).await
    }

    /// Get a blob by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<BlobRecord> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Blob: {id}")))
    }

    /// Store one chunk. Chunks are written blind; retries overwrite.
    pub async fn put_chunk(&self, blob_id: &str, chunk: &ChunkDoc) -> AppResult<()> {
        self.store.set(&chunk::path(blob_id, chunk.index), chunk).await
    }

    /// Every stored chunk of a blob, ascending by index.
    pub async fn list_chunks(&self, blob_id: &str) -> AppResult<Vec<ChunkDoc>> {
        let mut chunks = self
            .store
            .list(&chunk::collection(blob_id))
            .await?
            .iter()
            .map(|snapshot| snapshot.decode::<ChunkDoc>())
            .collect::<AppResult<Vec<_>>>()?;
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }

    /// Number of stored chunks.
    pub async fn count_chunks(&self, blob_id: &str) -> AppResult<u32> {
        let count = self.store.list(&chunk::collection(blob_id)).await?.len();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Delete every chunk of a blob in batches. Returns how many were removed.
    pub async fn delete_chunks(&self, blob_id: &str) -> AppResult<usize> {
        let paths: Vec<String> = self
            .store
            .list(&chunk::collection(blob_id))
            .await?
            .into_iter()
            .map(|snapshot| snapshot.path)
            .collect();

        for batch in paths.chunks(DELETE_BATCH) {
            self.store.delete_all(batch).await?;
        }
        Ok(paths.len())
    }

    /// A user's blobs, newest first.
    pub async fn find_by_owner(&self, owner_id: &str, limit: usize) -> AppResult<Vec<BlobRecord>> {
        let query = Query::collection(blob::COLLECTION)
            .where_eq("ownerId", owner_id)
            .order_by("createdAt", Direction::Descending)
            .limit(limit);
        self.decode_all(&query).await
    }

    /// Every blob a user owns, in any state.
    pub async fn find_all_by_owner(&self, owner_id: &str) -> AppResult<Vec<BlobRecord>> {
        let query = Query::collection(blob::COLLECTION).where_eq("ownerId", owner_id);
        self.decode_all(&query).await
    }

    /// A user's blobs in one state.
    pub async fn find_by_owner_and_status(
        &self,
        owner_id: &str,
        status: BlobStatus,
    ) -> AppResult<Vec<BlobRecord>> {
        let query = Query::collection(blob::COLLECTION)
            .where_eq("ownerId", owner_id)
            .where_eq("status", status_value(status));
        self.decode_all(&query).await
    }

    /// Every blob in one state.
    pub async fn find_by_status(&self, status: BlobStatus) -> AppResult<Vec<BlobRecord>> {
        let query = Query::collection(blob::COLLECTION).where_eq("status", status_value(status));
        self.decode_all(&query).await
    }

    /// Active public blobs ordered by `field`, largest first.
    pub async fn find_public(&self, order_field: &str, limit: usize) -> AppResult<Vec<BlobRecord>> {
        let query = Query::collection(blob::COLLECTION)
            .where_eq("visibility", visibility_value(Visibility::Public))
            .where_eq("status", status_value(BlobStatus::Active))
            .order_by(order_field, Direction::Descending)
            .limit(limit);
        self.decode_all(&query).await
    }

    async fn decode_all(&self, query: &Query) -> AppResult<Vec<BlobRecord>> {
        self.store
            .query(query)
            .await?
            .iter()
            .map(|snapshot| snapshot.decode())
            .collect()
    }
}

fn status_value(status: BlobStatus) -> serde_json::Value {
    serde_json::to_value(status).unwrap_or_default()
}

fn visibility_value(visibility: Visibility) -> serde_json::Value {
    serde_json::to_value(visibility).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::sample_blob;

    #[tokio::test]
    async fn test_chunks_come_back_in_index_order() {
        let store = DocumentStore::in_memory();
        let repo = BlobRepository::new(store);
        for index in [10, 2, 0, 1] {
            repo.put_chunk(
                "b1",
                &ChunkDoc {
                    index,
                    data_base64: format!("c{index}"),
                },
            )
            .await
            .unwrap();
        }

        let indices: Vec<u32> = repo
            .list_chunks("b1")
            .await
            .unwrap()
            .iter()
            .map(|c| c.index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 10]);
        assert_eq!(repo.count_chunks("b1").await.unwrap(), 4);

        assert_eq!(repo.delete_chunks("b1").await.unwrap(), 4);
        assert_eq!(repo.count_chunks("b1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_owner_and_public_listings() {
        let store = DocumentStore::in_memory();
        let repo = BlobRepository::new(store.clone());

        let mut first = sample_blob("b1", "alice", BlobStatus::Active);
        first.visibility = Visibility::Public;
        first.views = 3;
        let mut second = sample_blob("b2", "alice", BlobStatus::Deleted);
        second.created_at += chrono::Duration::seconds(5);
        let mut third = sample_blob("b3", "bob", BlobStatus::Active);
        third.visibility = Visibility::Public;
        third.views = 9;
        for record in [&first, &second, &third] {
            store.set(&blob::path(&record.id), record).await.unwrap();
        }

        let mine: Vec<String> = repo
            .find_by_owner("alice", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(mine, vec!["b2", "b1"]);

        let trending: Vec<String> = repo
            .find_public("views", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(trending, vec!["b3", "b1"]);

        let deleted = repo
            .find_by_owner_and_status("alice", BlobStatus::Deleted)
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(repo.get_by_id("missing").await.is_err());
    }
}
