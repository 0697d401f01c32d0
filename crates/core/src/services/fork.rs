//! Fork engine: copy someone's blob into the caller's space.

use crate::caller::Caller;
use crate::codec::ChunkCodec;
use crate::services::blob::ensure_visible;
use crate::services::quota::QuotaLedger;
use blobhub_common::{AppError, AppResult, IdGenerator};
use blobhub_db::{
    DocumentStore,
    entities::{self, BlobEvent, BlobRecord, BlobStatus, Visibility, blob},
    repositories::BlobRepository,
};
use tracing::{error, info};

/// Fork service for business logic.
#[derive(Clone, Debug)]
pub struct ForkService {
    store: DocumentStore,
    blob_repo: BlobRepository,
    ledger: QuotaLedger,
    codec: ChunkCodec,
    id_gen: IdGenerator,
}

impl ForkService {
    /// Create a new fork service.
    #[must_use]
    pub fn new(store: DocumentStore, ledger: QuotaLedger) -> Self {
        Self {
            blob_repo: BlobRepository::new(store.clone()),
            codec: ChunkCodec::new(ledger.limits().chunk_size),
            id_gen: IdGenerator::new(),
            store,
            ledger,
        }
    }

    /// Fork `source_id` for the caller.
    ///
    /// `prefetched` saves a read when the caller already holds the source
    /// record; it is ignored if its id does not match. Quota is checked
    /// optimistically first, then authoritatively in the transaction that
    /// creates the new record. Chunks are copied only after that commits.
    pub async fn fork(
        &self,
        caller: &Caller,
        source_id: &str,
        prefetched: Option<BlobRecord>,
    ) -> AppResult<BlobRecord> {
        let source = match prefetched.filter(|record| record.id == source_id) {
            Some(record) => record,
            None => self.blob_repo.get_by_id(source_id).await?,
        };
        ensure_visible(&source, Some(caller))?;
        source.transition(BlobEvent::Read)?;
        self.ledger.check_file_size(source.size_bytes)?;
        self.ledger.precheck(&caller.uid, source.size_bytes).await?;

        let chunks = self.blob_repo.list_chunks(source_id).await?;
        self.codec
            .join(source.chunk_count, source.size_bytes, &chunks)?;

        let now = entities::now();
        let draft = BlobRecord {
            id: self.id_gen.blob_id(),
            owner_id: caller.uid.clone(),
            owner_name: caller.display_name.clone(),
            title: format!("{} (fork)", fork_base_title(&source)),
            file_name: source.file_name.clone(),
            size_bytes: source.size_bytes,
            mime_type: source.mime_type.clone(),
            visibility: Visibility::Private,
            chunk_count: source.chunk_count,
            created_at: now,
            last_accessed_at: now,
            deleted_at: None,
            status: BlobStatus::Uploading,
            likes: 0,
            views: 0,
            forked_from: Some(source.id.clone()),
            quota_reserved: true,
            chunks_purged: false,
        };

        let ledger = self.ledger.clone();
        self.store
            .run_transaction(|tx| {
                let ledger = ledger.clone();
                let draft = draft.clone();
                Box::pin(async move {
                    let source_id = draft.forked_from.clone().unwrap_or_default();
                    let source = tx
                        .get_as::<BlobRecord>(&blob::path(&source_id))
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Blob: {source_id}")))?;
                    source.transition(BlobEvent::Read)?;

                    ledger.reserve(tx, &draft.owner_id, draft.size_bytes).await?;
                    tx.set(&blob::path(&draft.id), &draft)?;
                    Ok(())
                })
            })
            .await?;

        if let Err(e) = self.copy_and_activate(&draft, &chunks).await {
            error!(blob_id = %draft.id, error = %e, "Fork failed after reservation; rolling back");
            self.discard(&draft).await;
            return Err(e);
        }

        info!(
            blob_id = %draft.id,
            source_id = %source_id,
            user_id = %caller.uid,
            bytes = draft.size_bytes,
            "Blob forked"
        );
        let mut forked = draft;
        forked.status = BlobStatus::Active;
        Ok(forked)
    }

    async fn copy_and_activate(
        &self,
        draft: &BlobRecord,
        chunks: &[entities::ChunkDoc],
    ) -> AppResult<()> {
        for chunk in chunks {
            self.blob_repo.put_chunk(&draft.id, chunk).await?;
        }

        self.store
            .run_transaction(|tx| {
                let id = draft.id.clone();
                Box::pin(async move {
                    let path = blob::path(&id);
                    let mut record = tx
                        .get_as::<BlobRecord>(&path)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Blob: {id}")))?;
                    record.status = record.transition(BlobEvent::Commit)?;
                    tx.set(&path, &record)?;
                    Ok(())
                })
            })
            .await
    }

    /// Best-effort removal of a half-made fork and its reservation.
    async fn discard(&self, draft: &BlobRecord) {
        if let Err(e) = self.blob_repo.delete_chunks(&draft.id).await {
            error!(blob_id = %draft.id, error = %e, "Failed to delete fork chunks");
        }

        let ledger = self.ledger.clone();
        let result = self
            .store
            .run_transaction(|tx| {
                let ledger = ledger.clone();
                let id = draft.id.clone();
                Box::pin(async move {
                    let path = blob::path(&id);
                    if let Some(record) = tx.get_as::<BlobRecord>(&path).await? {
                        tx.delete(&path);
                        if record.quota_reserved {
                            ledger.release(tx, &record.owner_id, record.size_bytes).await?;
                        }
                    }
                    Ok(())
                })
            })
            .await;
        if let Err(e) = result {
            error!(blob_id = %draft.id, error = %e, "Failed to discard fork record");
        }
    }
}

fn fork_base_title(source: &BlobRecord) -> &str {
    if source.title.trim().is_empty() {
        &source.file_name
    } else {
        &source.title
    }
}
