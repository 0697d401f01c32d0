//! Blob lifecycle: upload, download, recover, soft and hard delete.

use crate::caller::Caller;
use crate::codec::ChunkCodec;
use crate::services::quota::QuotaLedger;
use blobhub_common::{AppError, AppResult, IdGenerator, Limits};
use blobhub_db::{
    DocumentStore,
    entities::{self, BlobEvent, BlobRecord, BlobStatus, Visibility, blob, chunk},
    repositories::{BlobRepository, LikeRepository},
};
use bytes::Bytes;
use tracing::{debug, error, info};

/// Largest page any listing returns.
pub const MAX_LIST_LIMIT: usize = 100;

/// Caller-supplied metadata for a new blob.
#[derive(Debug, Clone, Default)]
pub struct NewBlob {
    /// Display title; blank falls back to the file name.
    pub title: Option<String>,
    /// Original file name.
    pub file_name: String,
    /// MIME type; blank falls back to `application/octet-stream`.
    pub mime_type: Option<String>,
    /// Who may read the blob.
    pub visibility: Visibility,
}

impl NewBlob {
    /// Private blob titled after its file name.
    #[must_use]
    pub fn named(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }
}

/// Bytes handed back by download and recover.
#[derive(Debug, Clone)]
pub struct BlobContent {
    /// Record as of the read.
    pub record: BlobRecord,
    /// Reassembled payload.
    pub bytes: Bytes,
}

/// Blob service for business logic.
#[derive(Clone, Debug)]
pub struct BlobService {
    store: DocumentStore,
    blob_repo: BlobRepository,
    like_repo: LikeRepository,
    ledger: QuotaLedger,
    codec: ChunkCodec,
    id_gen: IdGenerator,
}

impl BlobService {
    /// Create a new blob service.
    #[must_use]
    pub fn new(store: DocumentStore, ledger: QuotaLedger) -> Self {
        let limits: Limits = ledger.limits();
        Self {
            blob_repo: BlobRepository::new(store.clone()),
            like_repo: LikeRepository::new(store.clone()),
            codec: ChunkCodec::new(limits.chunk_size),
            id_gen: IdGenerator::new(),
            store,
            ledger,
        }
    }

    /// The codec uploads are split with.
    #[must_use]
    pub const fn codec(&self) -> ChunkCodec {
        self.codec
    }

    /// Declare a new upload. No quota is reserved until commit.
    pub async fn begin_upload(
        &self,
        caller: &Caller,
        input: NewBlob,
        size_bytes: u64,
    ) -> AppResult<BlobRecord> {
        self.ledger.check_file_size(size_bytes)?;

        let file_name = input.file_name.trim().to_string();
        if file_name.is_empty() {
            return Err(AppError::Validation("file name is required".to_string()));
        }
        let title = non_blank(input.title).unwrap_or_else(|| file_name.clone());
        let mime_type =
            non_blank(input.mime_type).unwrap_or_else(|| blob::DEFAULT_MIME_TYPE.to_string());

        let now = entities::now();
        let record = BlobRecord {
            id: self.id_gen.blob_id(),
            owner_id: caller.uid.clone(),
            owner_name: caller.display_name.clone(),
            title,
            file_name,
            size_bytes,
            mime_type,
            visibility: input.visibility,
            chunk_count: self.codec.chunk_count(size_bytes),
            created_at: now,
            last_accessed_at: now,
            deleted_at: None,
            status: BlobStatus::Uploading,
            likes: 0,
            views: 0,
            forked_from: None,
            quota_reserved: false,
            chunks_purged: false,
        };
        self.store.set(&blob::path(&record.id), &record).await?;

        info!(
            blob_id = %record.id,
            user_id = %caller.uid,
            bytes = size_bytes,
            chunks = record.chunk_count,
            "Upload started"
        );
        Ok(record)
    }

    /// Store chunk `index` of an upload.
    ///
    /// Rewriting an index with identical bytes is a no-op; different bytes
    /// replace the stored chunk. The record is re-read in the same
    /// transaction as the write, so a write racing a commit either lands
    /// before it or fails once the blob is active.
    pub async fn write_chunk(
        &self,
        caller: &Caller,
        blob_id: &str,
        index: u32,
        payload: &[u8],
    ) -> AppResult<()> {
        let codec = self.codec;
        let len = payload.len();
        let doc = codec.encode(index, payload);

        let written = self
            .store
            .run_transaction(|tx| {
                let uid = caller.uid.clone();
                let blob_id = blob_id.to_string();
                let doc = doc.clone();
                Box::pin(async move {
                    let record = tx
                        .get_as::<BlobRecord>(&blob::path(&blob_id))
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Blob: {blob_id}")))?;
                    ensure_owned(&record, &uid)?;
                    open_upload(&record, BlobEvent::WriteChunk)?;
                    check_chunk(codec, &record, index, len)?;

                    let path = chunk::path(&blob_id, index);
                    if tx.get_as::<entities::ChunkDoc>(&path).await?.as_ref() == Some(&doc) {
                        return Ok(false);
                    }
                    tx.set(&path, &doc)?;
                    Ok(true)
                })
            })
            .await?;

        if !written {
            debug!(blob_id = %blob_id, index, "Chunk already stored");
        }
        Ok(())
    }

    /// Seal an upload: verify every chunk is stored, reserve quota, go active.
    ///
    /// On [`AppError::QuotaExceeded`] the blob stays `uploading`; the owner
    /// can abort it with [`Self::hard_delete`].
    pub async fn commit_upload(&self, caller: &Caller, blob_id: &str) -> AppResult<BlobRecord> {
        let record = self.owned(caller, blob_id).await?;
        open_upload(&record, BlobEvent::Commit)?;

        let stored = self.blob_repo.count_chunks(blob_id).await?;
        if stored != record.chunk_count {
            return Err(AppError::IncompleteUpload {
                stored,
                expected: record.chunk_count,
            });
        }

        let ledger = self.ledger.clone();
        let blob_id = blob_id.to_string();
        let committed = self
            .store
            .run_transaction(move |tx| {
                let ledger = ledger.clone();
                let blob_id = blob_id.clone();
                Box::pin(async move {
                    let path = blob::path(&blob_id);
                    let mut record = tx
                        .get_as::<BlobRecord>(&path)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Blob: {blob_id}")))?;
                    record.status = open_upload(&record, BlobEvent::Commit)?;

                    ledger.reserve(tx, &record.owner_id, record.size_bytes).await?;
                    record.quota_reserved = true;
                    tx.set(&path, &record)?;
                    Ok(record)
                })
            })
            .await?;

        info!(
            blob_id = %committed.id,
            user_id = %committed.owner_id,
            bytes = committed.size_bytes,
            "Upload committed"
        );
        Ok(committed)
    }

    /// Begin, write every chunk in order, and commit.
    ///
    /// If any step after begin fails the partial upload is removed before the
    /// error is returned.
    pub async fn upload(&self, caller: &Caller, input: NewBlob, payload: &[u8]) -> AppResult<BlobRecord> {
        let record = self
            .begin_upload(caller, input, payload.len() as u64)
            .await?;

        let result = self.write_and_commit(caller, &record.id, payload).await;
        if result.is_err() {
            if let Err(e) = self.hard_delete(caller, &record.id).await {
                error!(blob_id = %record.id, error = %e, "Failed to clean up aborted upload");
            }
        }
        result
    }

    async fn write_and_commit(
        &self,
        caller: &Caller,
        blob_id: &str,
        payload: &[u8],
    ) -> AppResult<BlobRecord> {
        for (index, part) in self.codec.split(payload).iter().enumerate() {
            self.write_chunk(caller, blob_id, index as u32, part).await?;
        }
        self.commit_upload(caller, blob_id).await
    }

    /// Metadata of a blob visible to `viewer`.
    pub async fn get(&self, viewer: Option<&Caller>, blob_id: &str) -> AppResult<BlobRecord> {
        let record = self.blob_repo.get_by_id(blob_id).await?;
        ensure_visible(&record, viewer)?;
        Ok(record)
    }

    /// Reassemble an active blob and count the view.
    pub async fn download(&self, viewer: Option<&Caller>, blob_id: &str) -> AppResult<BlobContent> {
        let record = self.blob_repo.get_by_id(blob_id).await?;
        ensure_visible(&record, viewer)?;
        record.transition(BlobEvent::Read)?;

        let chunks = self.blob_repo.list_chunks(blob_id).await?;
        let bytes = self
            .codec
            .join(record.chunk_count, record.size_bytes, &chunks)?;

        let blob_id = blob_id.to_string();
        let record = self
            .store
            .run_transaction(move |tx| {
                let blob_id = blob_id.clone();
                Box::pin(async move {
                    let path = blob::path(&blob_id);
                    let mut record = tx
                        .get_as::<BlobRecord>(&path)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Blob: {blob_id}")))?;
                    record.transition(BlobEvent::Read)?;
                    record.views = record.views.saturating_add(1);
                    record.last_accessed_at = entities::now();
                    tx.set(&path, &record)?;
                    Ok(record)
                })
            })
            .await?;

        debug!(blob_id = %record.id, bytes = bytes.len(), views = record.views, "Blob downloaded");
        Ok(BlobContent { record, bytes })
    }

    /// Bytes of a soft-deleted blob from its retained chunks.
    ///
    /// The record stays deleted.
    pub async fn recover(&self, viewer: Option<&Caller>, blob_id: &str) -> AppResult<BlobContent> {
        let record = self.blob_repo.get_by_id(blob_id).await?;
        ensure_visible(&record, viewer)?;
        record.transition(BlobEvent::Recover)?;

        if record.chunks_purged {
            return Err(AppError::NoRecoveryData(blob_id.to_string()));
        }
        let chunks = self.blob_repo.list_chunks(blob_id).await?;
        if chunks.is_empty() && record.chunk_count > 0 {
            return Err(AppError::NoRecoveryData(blob_id.to_string()));
        }
        let bytes = self
            .codec
            .join(record.chunk_count, record.size_bytes, &chunks)?;

        info!(blob_id = %blob_id, bytes = bytes.len(), "Blob recovered");
        Ok(BlobContent { record, bytes })
    }

    /// Mark an active blob deleted, keeping its chunks and its quota.
    pub async fn soft_delete(&self, caller: &Caller, blob_id: &str) -> AppResult<BlobRecord> {
        let uid = caller.uid.clone();
        let blob_id = blob_id.to_string();
        let record = self
            .store
            .run_transaction(move |tx| {
                let uid = uid.clone();
                let blob_id = blob_id.clone();
                Box::pin(async move {
                    let path = blob::path(&blob_id);
                    let mut record = tx
                        .get_as::<BlobRecord>(&path)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Blob: {blob_id}")))?;
                    if !record.is_owned_by(&uid) {
                        return Err(AppError::PermissionDenied(
                            "only the owner can delete a blob".to_string(),
                        ));
                    }
                    record.status = record.transition(BlobEvent::SoftDelete)?;
                    record.deleted_at = Some(entities::now());
                    tx.set(&path, &record)?;
                    Ok(record)
                })
            })
            .await?;

        info!(blob_id = %record.id, user_id = %record.owner_id, "Blob soft-deleted");
        Ok(record)
    }

    /// Remove a blob for good.
    ///
    /// The record is deleted first, in the transaction that releases its
    /// quota, so a like or chunk write racing the delete finds no blob to
    /// attach to. Chunks and like edges are swept afterwards; a failed sweep
    /// is logged and the deletion still stands. Works in any state, so it
    /// also aborts a stalled upload.
    pub async fn hard_delete(&self, caller: &Caller, blob_id: &str) -> AppResult<()> {
        let deleted = self
            .store
            .run_transaction(|tx| {
                let ledger = self.ledger.clone();
                let uid = caller.uid.clone();
                let blob_id = blob_id.to_string();
                Box::pin(async move {
                    let path = blob::path(&blob_id);
                    let record = tx
                        .get_as::<BlobRecord>(&path)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Blob: {blob_id}")))?;
                    ensure_owned(&record, &uid)?;

                    tx.delete(&path);
                    if record.quota_reserved {
                        ledger.release(tx, &record.owner_id, record.size_bytes).await?;
                    }
                    Ok(record)
                })
            })
            .await?;

        let removed_chunks = self.blob_repo.delete_chunks(blob_id).await.unwrap_or_else(|e| {
            error!(blob_id = %blob_id, error = %e, "Failed to delete chunks of removed blob");
            0
        });
        let removed_likes = self.like_repo.delete_by_blob(blob_id).await.unwrap_or_else(|e| {
            error!(blob_id = %blob_id, error = %e, "Failed to delete likes of removed blob");
            0
        });

        info!(
            blob_id = %blob_id,
            user_id = %deleted.owner_id,
            bytes = deleted.size_bytes,
            released = deleted.quota_reserved,
            chunks = removed_chunks,
            likes = removed_likes,
            "Blob hard-deleted"
        );
        Ok(())
    }

    /// The caller's blobs, newest first.
    pub async fn list_mine(&self, caller: &Caller, limit: usize) -> AppResult<Vec<BlobRecord>> {
        self.blob_repo
            .find_by_owner(&caller.uid, clamp_limit(limit))
            .await
    }

    /// Public active blobs by views.
    pub async fn list_trending(&self, limit: usize) -> AppResult<Vec<BlobRecord>> {
        self.blob_repo.find_public("views", clamp_limit(limit)).await
    }

    /// Public active blobs, newest first.
    pub async fn list_feed(&self, limit: usize) -> AppResult<Vec<BlobRecord>> {
        self.blob_repo
            .find_public("createdAt", clamp_limit(limit))
            .await
    }

    async fn owned(&self, caller: &Caller, blob_id: &str) -> AppResult<BlobRecord> {
        let record = self.blob_repo.get_by_id(blob_id).await?;
        ensure_owned(&record, &caller.uid)?;
        Ok(record)
    }
}

fn ensure_owned(record: &BlobRecord, uid: &str) -> AppResult<()> {
    if record.is_owned_by(uid) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "blob {} belongs to another user",
            record.id
        )))
    }
}

/// Next state for a chunk write or commit by the owner.
///
/// A record that already holds its quota is a fork draft; only the fork
/// that created it may fill and activate it.
fn open_upload(record: &BlobRecord, event: BlobEvent) -> AppResult<BlobStatus> {
    let next = record.transition(event)?;
    if record.quota_reserved {
        return Err(AppError::InvalidTransition(format!(
            "blob {} is being filled by a fork",
            record.id
        )));
    }
    Ok(next)
}

fn check_chunk(codec: ChunkCodec, record: &BlobRecord, index: u32, len: usize) -> AppResult<()> {
    if index >= record.chunk_count {
        return Err(AppError::SequenceError {
            index,
            chunk_count: record.chunk_count,
        });
    }
    if len > codec.chunk_size() {
        return Err(AppError::TooLarge(format!(
            "chunk is {len} bytes, the chunk size is {}",
            codec.chunk_size()
        )));
    }
    let expected = codec.expected_len(record.size_bytes, index);
    if len != expected {
        return Err(AppError::Validation(format!(
            "chunk {index} must be {expected} bytes, got {len}"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_visible(record: &BlobRecord, viewer: Option<&Caller>) -> AppResult<()> {
    if record.is_visible_to(viewer.map(|c| c.uid.as_str())) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "blob {} is private",
            record.id
        )))
    }
}

pub(crate) fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIST_LIMIT)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::testing::{TestEnv, payload};
    use blobhub_db::entities::like;

    #[tokio::test]
    async fn test_upload_round_trip() {
        let env = TestEnv::new();
        let alice = Caller::new("alice").with_display_name(Some("Alice".to_string()));
        let data = payload(10);

        let record = env
            .blobs
            .upload(&alice, NewBlob::named("notes.txt"), &data)
            .await
            .unwrap();

        assert_eq!(record.status, BlobStatus::Active);
        assert_eq!(record.chunk_count, 3);
        assert_eq!(record.title, "notes.txt");
        assert_eq!(record.owner_name.as_deref(), Some("Alice"));
        assert_eq!(record.mime_type, blob::DEFAULT_MIME_TYPE);
        assert!(record.quota_reserved);
        assert_eq!(env.used("alice").await, 10);

        let content = env.blobs.download(Some(&alice), &record.id).await.unwrap();
        assert_eq!(content.bytes.as_ref(), data.as_slice());
        assert_eq!(content.record.views, 1);
        assert!(content.record.last_accessed_at >= record.last_accessed_at);
    }

    #[tokio::test]
    async fn test_too_large_rejected_before_any_write() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");

        let err = env
            .blobs
            .upload(&alice, NewBlob::named("big.bin"), &payload(101))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TooLarge(_)));
        assert!(env.store.list("blobs").await.unwrap().is_empty());
        assert_eq!(env.used("alice").await, 0);
    }

    #[tokio::test]
    async fn test_quota_enforced_at_commit_not_at_begin() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");

        // Both declarations fit on their own.
        let first = env
            .blobs
            .begin_upload(&alice, NewBlob::named("a.bin"), 100)
            .await
            .unwrap();
        let second = env
            .blobs
            .begin_upload(&alice, NewBlob::named("b.bin"), 100)
            .await
            .unwrap();
        env.blobs
            .upload(&alice, NewBlob::named("c.bin"), &payload(100))
            .await
            .unwrap();

        for record in [&first, &second] {
            for (i, part) in env.blobs.codec().split(&payload(100)).iter().enumerate() {
                env.blobs
                    .write_chunk(&alice, &record.id, i as u32, part)
                    .await
                    .unwrap();
            }
        }
        env.blobs.commit_upload(&alice, &first.id).await.unwrap();
        let err = env.blobs.commit_upload(&alice, &second.id).await.unwrap_err();

        assert!(matches!(err, AppError::QuotaExceeded { used: 200, .. }));
        let stuck = env.blobs.get(Some(&alice), &second.id).await.unwrap();
        assert_eq!(stuck.status, BlobStatus::Uploading);
        assert_eq!(env.used("alice").await, 200);

        // Aborting the stuck upload does not touch the ledger.
        env.blobs.hard_delete(&alice, &second.id).await.unwrap();
        assert_eq!(env.used("alice").await, 200);
        assert!(env.store.list(&chunk::collection(&second.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_one_shot_upload_cleans_up() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");
        env.blobs
            .upload(&alice, NewBlob::named("a.bin"), &payload(100))
            .await
            .unwrap();
        env.blobs
            .upload(&alice, NewBlob::named("b.bin"), &payload(100))
            .await
            .unwrap();

        let err = env
            .blobs
            .upload(&alice, NewBlob::named("c.bin"), &payload(60))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::QuotaExceeded { .. }));
        assert_eq!(env.blobs.list_mine(&alice, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_chunk_sequence_and_length_rules() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");
        let record = env
            .blobs
            .begin_upload(&alice, NewBlob::named("a.bin"), 10)
            .await
            .unwrap();

        assert!(matches!(
            env.blobs.write_chunk(&alice, &record.id, 3, &[1, 2]).await,
            Err(AppError::SequenceError {
                index: 3,
                chunk_count: 3
            })
        ));
        assert!(matches!(
            env.blobs.write_chunk(&alice, &record.id, 0, &[0; 5]).await,
            Err(AppError::TooLarge(_))
        ));
        assert!(matches!(
            env.blobs.write_chunk(&alice, &record.id, 2, &[0; 4]).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            env.blobs
                .write_chunk(&Caller::new("mallory"), &record.id, 0, &[0; 4])
                .await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            env.blobs.commit_upload(&alice, &record.id).await,
            Err(AppError::IncompleteUpload {
                stored: 0,
                expected: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_chunk_rewrite_is_idempotent_and_overwrites() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");
        let record = env
            .blobs
            .begin_upload(&alice, NewBlob::named("a.bin"), 6)
            .await
            .unwrap();

        env.blobs.write_chunk(&alice, &record.id, 0, b"abcd").await.unwrap();
        env.blobs.write_chunk(&alice, &record.id, 0, b"abcd").await.unwrap();
        env.blobs.write_chunk(&alice, &record.id, 0, b"wxyz").await.unwrap();
        env.blobs.write_chunk(&alice, &record.id, 1, b"ef").await.unwrap();
        env.blobs.commit_upload(&alice, &record.id).await.unwrap();

        let content = env.blobs.download(Some(&alice), &record.id).await.unwrap();
        assert_eq!(content.bytes.as_ref(), b"wxyzef");
        assert!(matches!(
            env.blobs.write_chunk(&alice, &record.id, 0, b"abcd").await,
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_byte_upload() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");
        let record = env
            .blobs
            .upload(&alice, NewBlob::named("empty"), &[])
            .await
            .unwrap();

        assert_eq!(record.chunk_count, 0);
        let content = env.blobs.download(None, &record.id).await;
        assert!(matches!(content, Err(AppError::PermissionDenied(_))));
        let content = env.blobs.download(Some(&alice), &record.id).await.unwrap();
        assert!(content.bytes.is_empty());
    }

    #[tokio::test]
    async fn test_soft_delete_then_recover() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");
        let data = payload(9);
        let record = env
            .blobs
            .upload(&alice, NewBlob::named("a.bin"), &data)
            .await
            .unwrap();

        assert!(matches!(
            env.blobs.recover(Some(&alice), &record.id).await,
            Err(AppError::InvalidTransition(_))
        ));
        assert!(matches!(
            env.blobs.soft_delete(&Caller::new("bob"), &record.id).await,
            Err(AppError::PermissionDenied(_))
        ));

        let deleted = env.blobs.soft_delete(&alice, &record.id).await.unwrap();
        assert_eq!(deleted.status, BlobStatus::Deleted);
        assert!(deleted.deleted_at.is_some());
        // Soft delete keeps the bytes counted.
        assert_eq!(env.used("alice").await, 9);

        assert!(matches!(
            env.blobs.download(Some(&alice), &record.id).await,
            Err(AppError::Deleted(_))
        ));
        let recovered = env.blobs.recover(Some(&alice), &record.id).await.unwrap();
        assert_eq!(recovered.bytes.as_ref(), data.as_slice());
        assert_eq!(recovered.record.status, BlobStatus::Deleted);

        assert!(matches!(
            env.blobs.soft_delete(&alice, &record.id).await,
            Err(AppError::Deleted(_))
        ));
    }

    #[tokio::test]
    async fn test_recover_without_chunks_has_no_data() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");
        let record = env
            .blobs
            .upload(&alice, NewBlob::named("a.bin"), &payload(9))
            .await
            .unwrap();
        env.blobs.soft_delete(&alice, &record.id).await.unwrap();
        env.store
            .delete_all(&[chunk::path(&record.id, 0), chunk::path(&record.id, 1), chunk::path(&record.id, 2)])
            .await
            .unwrap();

        assert!(matches!(
            env.blobs.recover(Some(&alice), &record.id).await,
            Err(AppError::NoRecoveryData(_))
        ));
    }

    #[tokio::test]
    async fn test_download_detects_missing_chunk() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");
        let record = env
            .blobs
            .upload(&alice, NewBlob::named("a.bin"), &payload(9))
            .await
            .unwrap();
        env.store.delete(&chunk::path(&record.id, 1)).await.unwrap();

        assert!(matches!(
            env.blobs.download(Some(&alice), &record.id).await,
            Err(AppError::IncompleteData {
                missing: 1,
                expected: 3
            })
        ));
        assert!(matches!(
            env.blobs.download(Some(&alice), "nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hard_delete_releases_quota_once() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");
        let record = env
            .blobs
            .upload(&alice, NewBlob::named("a.bin"), &payload(40))
            .await
            .unwrap();
        env.blobs.soft_delete(&alice, &record.id).await.unwrap();

        env.blobs.hard_delete(&alice, &record.id).await.unwrap();

        assert_eq!(env.used("alice").await, 0);
        assert!(env.store.list(&chunk::collection(&record.id)).await.unwrap().is_empty());
        assert!(matches!(
            env.blobs.hard_delete(&alice, &record.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listings() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");
        let public = NewBlob {
            visibility: Visibility::Public,
            ..NewBlob::named("pub.bin")
        };
        let shown = env.blobs.upload(&alice, public, &payload(3)).await.unwrap();
        env.blobs
            .upload(&alice, NewBlob::named("priv.bin"), &payload(3))
            .await
            .unwrap();
        env.blobs.download(None, &shown.id).await.unwrap();

        assert_eq!(env.blobs.list_mine(&alice, 0).await.unwrap().len(), 1);
        assert_eq!(env.blobs.list_mine(&alice, 500).await.unwrap().len(), 2);
        let trending = env.blobs.list_trending(10).await.unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].views, 1);
        assert_eq!(env.blobs.list_feed(10).await.unwrap()[0].id, shown.id);
    }

    #[tokio::test]
    async fn test_owner_cannot_commit_or_fill_a_fork_draft() {
        let env = TestEnv::new();
        let bob = Caller::new("bob");
        let source = env
            .blobs
            .upload(&bob, NewBlob::named("a.bin"), &payload(10))
            .await
            .unwrap();

        // A fork draft after its reserving transaction, chunks copied,
        // activation not yet run.
        let draft = BlobRecord {
            id: "draft1".to_string(),
            status: BlobStatus::Uploading,
            forked_from: Some(source.id.clone()),
            ..source.clone()
        };
        let ledger = env.ledger.clone();
        env.store
            .run_transaction(|tx| {
                let ledger = ledger.clone();
                let draft = draft.clone();
                Box::pin(async move {
                    ledger.reserve(tx, &draft.owner_id, draft.size_bytes).await?;
                    tx.set(&blob::path(&draft.id), &draft)?;
                    Ok(())
                })
            })
            .await
            .unwrap();
        for snapshot in env.store.list(&chunk::collection(&source.id)).await.unwrap() {
            let doc: entities::ChunkDoc = snapshot.decode().unwrap();
            env.store
                .set(&chunk::path(&draft.id, doc.index), &doc)
                .await
                .unwrap();
        }
        assert_eq!(env.used("bob").await, 20);

        assert!(matches!(
            env.blobs.commit_upload(&bob, &draft.id).await,
            Err(AppError::InvalidTransition(_))
        ));
        assert!(matches!(
            env.blobs.write_chunk(&bob, &draft.id, 0, b"wxyz").await,
            Err(AppError::InvalidTransition(_))
        ));
        assert_eq!(env.used("bob").await, 20);

        env.blobs.hard_delete(&bob, &draft.id).await.unwrap();
        assert_eq!(env.used("bob").await, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_chunk_write_racing_commit_never_alters_active_blob() {
        let env = TestEnv::with_attempts(50);
        let alice = Caller::new("alice");

        for _ in 0..10 {
            let record = env
                .blobs
                .begin_upload(&alice, NewBlob::named("a.bin"), 8)
                .await
                .unwrap();
            env.blobs.write_chunk(&alice, &record.id, 0, b"abcd").await.unwrap();
            env.blobs.write_chunk(&alice, &record.id, 1, b"efgh").await.unwrap();

            let writer = {
                let blobs = env.blobs.clone();
                let caller = alice.clone();
                let id = record.id.clone();
                tokio::spawn(async move { blobs.write_chunk(&caller, &id, 0, b"wxyz").await })
            };
            let committer = {
                let blobs = env.blobs.clone();
                let caller = alice.clone();
                let id = record.id.clone();
                tokio::spawn(async move { blobs.commit_upload(&caller, &id).await })
            };
            let written = writer.await.unwrap();
            committer.await.unwrap().unwrap();

            let content = env.blobs.download(Some(&alice), &record.id).await.unwrap();
            match written {
                Ok(()) => assert_eq!(content.bytes.as_ref(), b"wxyzefgh"),
                Err(e) => {
                    assert!(matches!(e, AppError::InvalidTransition(_)));
                    assert_eq!(content.bytes.as_ref(), b"abcdefgh");
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hard_delete_racing_likes_leaves_no_edges() {
        let env = TestEnv::with_attempts(50);
        let alice = Caller::new("alice");
        let public = NewBlob {
            visibility: Visibility::Public,
            ..NewBlob::named("pub.bin")
        };
        let record = env.blobs.upload(&alice, public, &payload(8)).await.unwrap();

        let likers: Vec<_> = (0..8)
            .map(|i| {
                let likes = env.likes.clone();
                let id = record.id.clone();
                tokio::spawn(async move { likes.toggle_like(&Caller::new(format!("fan{i}")), &id).await })
            })
            .collect();
        env.blobs.hard_delete(&alice, &record.id).await.unwrap();

        for result in futures::future::join_all(likers).await {
            let result = result.unwrap();
            assert!(result.is_ok() || matches!(result, Err(AppError::NotFound(_))));
        }
        assert!(env.store.list(&like::collection(&record.id)).await.unwrap().is_empty());
        assert!(matches!(
            env.likes.toggle_like(&Caller::new("late"), &record.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            env.blobs.write_chunk(&alice, &record.id, 0, b"abcd").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(env.used("alice").await, 0);
    }
}
