//! Quota ledger: per-user byte accounting.
//!
//! `blobUsers/{uid}.totalBytesUsed` is only ever changed by [`QuotaLedger::reserve`]
//! and [`QuotaLedger::release`], both of which run inside the caller's
//! transaction so the counter moves atomically with the record it accounts for.

use blobhub_common::{AppError, AppResult, Limits};
use blobhub_db::{
    DocumentStore, Transaction,
    entities::{BlobRecord, UserUsage, blob, user_usage},
    repositories::{BlobRepository, UsageRepository},
};
use serde::Serialize;
use tracing::{info, warn};

/// A user's usage against the caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Bytes counted against the user.
    pub used_bytes: u64,
    /// Per-user cap.
    pub limit_bytes: u64,
    /// Per-file cap.
    pub max_file_bytes: u64,
}

/// Outcome of [`QuotaLedger::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    /// Total stored before reconciling.
    pub recorded_bytes: u64,
    /// Sum recomputed from the user's records.
    pub actual_bytes: u64,
}

impl Reconciliation {
    /// Whether the stored total had drifted.
    #[must_use]
    pub const fn drifted(&self) -> bool {
        self.recorded_bytes != self.actual_bytes
    }
}

/// Per-user byte ledger.
#[derive(Clone, Debug)]
pub struct QuotaLedger {
    store: DocumentStore,
    usage_repo: UsageRepository,
    blob_repo: BlobRepository,
    limits: Limits,
}

impl QuotaLedger {
    /// Create a new quota ledger.
    #[must_use]
    pub fn new(store: DocumentStore, limits: Limits) -> Self {
        Self {
            usage_repo: UsageRepository::new(store.clone()),
            blob_repo: BlobRepository::new(store.clone()),
            store,
            limits,
        }
    }

    /// Configured caps.
    #[must_use]
    pub const fn limits(&self) -> Limits {
        self.limits
    }

    /// Per-file cap, checked before any write.
    pub fn check_file_size(&self, size_bytes: u64) -> AppResult<()> {
        if size_bytes > self.limits.max_file_bytes {
            return Err(AppError::TooLarge(format!(
                "file is {size_bytes} bytes, the limit is {} bytes",
                self.limits.max_file_bytes
            )));
        }
        Ok(())
    }

    /// Optimistic check outside any transaction. Only a hint for early
    /// feedback; [`Self::reserve`] is authoritative.
    pub async fn precheck(&self, user_id: &str, delta: u64) -> AppResult<()> {
        let used = self.usage_repo.total_bytes_used(user_id).await?;
        self.ensure_room(used, delta).map(drop)
    }

    /// Add `delta` bytes to a user's total inside `tx`.
    ///
    /// Fails with [`AppError::QuotaExceeded`] if the new total would pass the
    /// per-user cap; the enclosing transaction then writes nothing.
    pub async fn reserve(&self, tx: &mut Transaction, user_id: &str, delta: u64) -> AppResult<u64> {
        let path = user_usage::path(user_id);
        let mut usage = tx
            .get_as::<UserUsage>(&path)
            .await?
            .unwrap_or_else(UserUsage::empty);

        usage.total_bytes_used = self.ensure_room(usage.total_bytes_used, delta)?;
        tx.set(&path, &usage)?;
        Ok(usage.total_bytes_used)
    }

    /// Subtract `delta` bytes from a user's total inside `tx`.
    ///
    /// The total is clamped at zero; clamping means the ledger had already
    /// drifted and is logged.
    pub async fn release(&self, tx: &mut Transaction, user_id: &str, delta: u64) -> AppResult<u64> {
        let path = user_usage::path(user_id);
        let mut usage = tx
            .get_as::<UserUsage>(&path)
            .await?
            .unwrap_or_else(UserUsage::empty);

        if delta > usage.total_bytes_used {
            warn!(
                user_id = %user_id,
                used = usage.total_bytes_used,
                bytes = delta,
                "Quota release exceeds recorded usage; clamping to zero"
            );
        }
        usage.total_bytes_used = usage.total_bytes_used.saturating_sub(delta);
        tx.set(&path, &usage)?;
        Ok(usage.total_bytes_used)
    }

    /// Release in a transaction of its own.
    pub async fn release_now(&self, user_id: &str, delta: u64) -> AppResult<u64> {
        let ledger = self.clone();
        let user_id = user_id.to_string();
        self.store
            .run_transaction(move |tx| {
                let ledger = ledger.clone();
                let user_id = user_id.clone();
                Box::pin(async move { ledger.release(tx, &user_id, delta).await })
            })
            .await
    }

    /// Current usage. Users who never uploaded read as zero.
    pub async fn usage(&self, user_id: &str) -> AppResult<Usage> {
        Ok(Usage {
            used_bytes: self.usage_repo.total_bytes_used(user_id).await?,
            limit_bytes: self.limits.max_user_bytes,
            max_file_bytes: self.limits.max_file_bytes,
        })
    }

    /// Recompute a user's total from their records and store it.
    ///
    /// The usage document is read before the owner's records are listed, and
    /// the listing is redone on every attempt. A commit or fork that lands
    /// after the listing also moves the usage document, so the attempt
    /// conflicts and the retry sees the new record.
    pub async fn reconcile(&self, user_id: &str) -> AppResult<Reconciliation> {
        let result = self
            .store
            .run_transaction(|tx| {
                let blob_repo = self.blob_repo.clone();
                let user_id = user_id.to_string();
                Box::pin(async move {
                    let path = user_usage::path(&user_id);
                    let mut usage = tx
                        .get_as::<UserUsage>(&path)
                        .await?
                        .unwrap_or_else(UserUsage::empty);
                    let recorded_bytes = usage.total_bytes_used;

                    let blob_ids: Vec<String> = blob_repo
                        .find_all_by_owner(&user_id)
                        .await?
                        .into_iter()
                        .map(|record| record.id)
                        .collect();

                    let mut actual_bytes = 0u64;
                    for id in &blob_ids {
                        if let Some(record) = tx.get_as::<BlobRecord>(&blob::path(id)).await? {
                            if record.quota_reserved {
                                actual_bytes = actual_bytes.saturating_add(record.size_bytes);
                            }
                        }
                    }

                    usage.total_bytes_used = actual_bytes;
                    tx.set(&path, &usage)?;

                    Ok(Reconciliation {
                        recorded_bytes,
                        actual_bytes,
                    })
                })
            })
            .await?;

        if result.drifted() {
            warn!(
                user_id = %user_id,
                recorded = result.recorded_bytes,
                actual = result.actual_bytes,
                "Quota ledger drift corrected"
            );
        } else {
            info!(user_id = %user_id, bytes = result.actual_bytes, "Quota ledger consistent");
        }
        Ok(result)
    }

    fn ensure_room(&self, used: u64, delta: u64) -> AppResult<u64> {
        let limit = self.limits.max_user_bytes;
        match used.checked_add(delta) {
            Some(total) if total <= limit => Ok(total),
            _ => Err(AppError::QuotaExceeded {
                used,
                requested: delta,
                limit,
            }),
        }
    }
}
