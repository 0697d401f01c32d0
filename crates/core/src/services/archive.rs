//! Archival sweeper, chunk purge and abandoned-upload reaper.

use crate::services::quota::QuotaLedger;
use blobhub_common::{AppError, AppResult, config::ArchiveConfig};
use blobhub_db::{
    DocumentStore,
    entities::{self, BlobRecord, BlobStatus, blob},
    repositories::BlobRepository,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Result of a sweep, purge or reap pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Records past the cutoff when the pass started.
    pub scanned: usize,
    /// Records changed by the pass.
    pub affected: usize,
    /// Records skipped because they changed underneath the pass.
    pub skipped: usize,
    /// Records whose update failed.
    pub failed: usize,
    /// Bytes handed back to the quota ledger.
    pub released_bytes: u64,
}

impl SweepReport {
    fn absorb(&mut self, outcome: AppResult<Option<u64>>, blob_id: &str) {
        match outcome {
            Ok(Some(bytes)) => {
                self.affected += 1;
                self.released_bytes = self.released_bytes.saturating_add(bytes);
            }
            Ok(None) => self.skipped += 1,
            Err(e) => {
                self.failed += 1;
                error!(blob_id = %blob_id, error = %e, "Archive pass failed on blob");
            }
        }
    }
}

/// Archive service for business logic.
#[derive(Clone, Debug)]
pub struct ArchiveService {
    store: DocumentStore,
    blob_repo: BlobRepository,
    ledger: QuotaLedger,
    retention: Duration,
    purge_after: Option<Duration>,
    upload_ttl: Option<Duration>,
}

impl ArchiveService {
    /// Create a new archive service.
    #[must_use]
    pub fn new(store: DocumentStore, ledger: QuotaLedger, config: &ArchiveConfig) -> Self {
        Self {
            blob_repo: BlobRepository::new(store.clone()),
            retention: Duration::days(i64::from(config.retention_days)),
            purge_after: config.purge_after_days.map(|d| Duration::days(i64::from(d))),
            upload_ttl: config
                .abandoned_upload_ttl_hours
                .map(|h| Duration::hours(i64::from(h))),
            store,
            ledger,
        }
    }

    /// Soft-delete the caller's active blobs not read within the retention window.
    pub async fn sweep_user(&self, user_id: &str) -> AppResult<SweepReport> {
        self.sweep_user_at(user_id, entities::now()).await
    }

    /// [`Self::sweep_user`] against a fixed clock.
    pub async fn sweep_user_at(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let candidates = self
            .blob_repo
            .find_by_owner_and_status(user_id, BlobStatus::Active)
            .await?;
        let report = self.archive_stale(candidates, now).await;
        info!(
            user_id = %user_id,
            scanned = report.scanned,
            archived = report.affected,
            "User sweep finished"
        );
        Ok(report)
    }

    /// Soft-delete stale active blobs of every user.
    pub async fn sweep_all(&self) -> AppResult<SweepReport> {
        self.sweep_all_at(entities::now()).await
    }

    /// [`Self::sweep_all`] against a fixed clock.
    pub async fn sweep_all_at(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let candidates = self.blob_repo.find_by_status(BlobStatus::Active).await?;
        let report = self.archive_stale(candidates, now).await;
        info!(
            scanned = report.scanned,
            archived = report.affected,
            failed = report.failed,
            "Archival sweep finished"
        );
        Ok(report)
    }

    async fn archive_stale(&self, candidates: Vec<BlobRecord>, now: DateTime<Utc>) -> SweepReport {
        let cutoff = now - self.retention;
        let mut report = SweepReport::default();

        for record in candidates
            .into_iter()
            .filter(|r| r.last_accessed_at <= cutoff)
        {
            report.scanned += 1;
            let outcome = self.archive_one(&record.id, cutoff, now).await;
            report.absorb(outcome.map(|archived| archived.then_some(0)), &record.id);
        }
        report
    }

    /// Re-checks staleness inside the transaction so a download racing the
    /// sweep keeps the blob alive.
    async fn archive_one(&self, blob_id: &str, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<bool> {
        self.store
            .run_transaction(|tx| {
                let blob_id = blob_id.to_string();
                Box::pin(async move {
                    let path = blob::path(&blob_id);
                    let Some(mut record) = tx.get_as::<BlobRecord>(&path).await? else {
                        return Ok(false);
                    };
                    if record.status != BlobStatus::Active || record.last_accessed_at > cutoff {
                        return Ok(false);
                    }
                    record.status = record.transition(entities::BlobEvent::SoftDelete)?;
                    record.deleted_at = Some(now);
                    tx.set(&path, &record)?;
                    debug!(blob_id = %blob_id, "Blob archived");
                    Ok(true)
                })
            })
            .await
    }

    /// Purge chunks of blobs soft-deleted longer than the purge window.
    ///
    /// Does nothing unless a purge window is configured.
    pub async fn purge_deleted(&self) -> AppResult<SweepReport> {
        self.purge_deleted_at(entities::now()).await
    }

    /// [`Self::purge_deleted`] against a fixed clock.
    pub async fn purge_deleted_at(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let Some(window) = self.purge_after else {
            return Ok(SweepReport::default());
        };
        let cutoff = now - window;
        let mut report = SweepReport::default();

        for record in self.blob_repo.find_by_status(BlobStatus::Deleted).await? {
            let expired = record.deleted_at.is_some_and(|at| at <= cutoff);
            if !expired || record.chunks_purged {
                continue;
            }
            report.scanned += 1;
            let outcome = self.purge_one(&record.id).await;
            report.absorb(outcome, &record.id);
        }

        info!(
            purged = report.affected,
            released_bytes = report.released_bytes,
            failed = report.failed,
            "Purge pass finished"
        );
        Ok(report)
    }

    async fn purge_one(&self, blob_id: &str) -> AppResult<Option<u64>> {
        self.blob_repo.delete_chunks(blob_id).await?;

        let ledger = self.ledger.clone();
        self.store
            .run_transaction(|tx| {
                let ledger = ledger.clone();
                let blob_id = blob_id.to_string();
                Box::pin(async move {
                    let path = blob::path(&blob_id);
                    let Some(mut record) = tx.get_as::<BlobRecord>(&path).await? else {
                        return Ok(None);
                    };
                    if record.status != BlobStatus::Deleted {
                        return Err(AppError::InvalidTransition(format!(
                            "blob {blob_id} left the deleted state during purge"
                        )));
                    }

                    let mut released = 0;
                    if record.quota_reserved {
                        ledger.release(tx, &record.owner_id, record.size_bytes).await?;
                        released = record.size_bytes;
                    }
                    record.chunks_purged = true;
                    record.quota_reserved = false;
                    tx.set(&path, &record)?;
                    Ok(Some(released))
                })
            })
            .await
    }

    /// Remove uploads left in `uploading` longer than the configured TTL.
    ///
    /// Does nothing unless a TTL is configured.
    pub async fn reap_abandoned(&self) -> AppResult<SweepReport> {
        self.reap_abandoned_at(entities::now()).await
    }

    /// [`Self::reap_abandoned`] against a fixed clock.
    pub async fn reap_abandoned_at(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let Some(ttl) = self.upload_ttl else {
            return Ok(SweepReport::default());
        };
        let cutoff = now - ttl;
        let mut report = SweepReport::default();

        for record in self.blob_repo.find_by_status(BlobStatus::Uploading).await? {
            if record.created_at > cutoff {
                continue;
            }
            report.scanned += 1;
            let outcome = self.reap_one(&record.id, cutoff).await;
            report.absorb(outcome, &record.id);
        }

        if report.affected > 0 {
            warn!(reaped = report.affected, "Abandoned uploads removed");
        }
        info!(
            scanned = report.scanned,
            reaped = report.affected,
            failed = report.failed,
            "Reap pass finished"
        );
        Ok(report)
    }

    /// The record goes first so a commit racing the reaper either wins the
    /// transaction or finds nothing to commit.
    async fn reap_one(&self, blob_id: &str, cutoff: DateTime<Utc>) -> AppResult<Option<u64>> {
        let ledger = self.ledger.clone();
        let released = self
            .store
            .run_transaction(|tx| {
                let ledger = ledger.clone();
                let blob_id = blob_id.to_string();
                Box::pin(async move {
                    let path = blob::path(&blob_id);
                    let Some(record) = tx.get_as::<BlobRecord>(&path).await? else {
                        return Ok(None);
                    };
                    if record.status != BlobStatus::Uploading || record.created_at > cutoff {
                        return Ok(None);
                    }

                    tx.delete(&path);
                    if record.quota_reserved {
                        ledger.release(tx, &record.owner_id, record.size_bytes).await?;
                        return Ok(Some(record.size_bytes));
                    }
                    Ok(Some(0))
                })
            })
            .await?;

        if released.is_some() {
            self.blob_repo.delete_chunks(blob_id).await?;
        }
        Ok(released)
    }
}
