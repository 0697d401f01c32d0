//! Shared fixtures for service tests.

#![allow(clippy::unwrap_used)]

use super::{
    ArchiveService, BlobService, FollowingService, ForkService, LikeService, ProfileService,
    QuotaLedger,
};
use blobhub_common::{Limits, config::ArchiveConfig};
use blobhub_db::DocumentStore;

/// Every service wired to one in-memory store with small limits:
/// 4-byte chunks, 100-byte files, 250 bytes per user.
pub struct TestEnv {
    pub store: DocumentStore,
    pub ledger: QuotaLedger,
    pub blobs: BlobService,
    pub likes: LikeService,
    pub follows: FollowingService,
    pub forks: ForkService,
    pub archive: ArchiveService,
    pub profiles: ProfileService,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_store(DocumentStore::in_memory())
    }

    /// For tests that race many writers on one document.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self::with_store(DocumentStore::in_memory().with_max_attempts(max_attempts))
    }

    fn with_store(store: DocumentStore) -> Self {
        let limits = Limits {
            chunk_size: 4,
            max_file_bytes: 100,
            max_user_bytes: 250,
        };
        let archive = ArchiveConfig {
            purge_after_days: Some(7),
            abandoned_upload_ttl_hours: Some(24),
            ..ArchiveConfig::default()
        };
        let ledger = QuotaLedger::new(store.clone(), limits);

        Self {
            blobs: BlobService::new(store.clone(), ledger.clone()),
            likes: LikeService::new(store.clone()),
            follows: FollowingService::new(store.clone()),
            forks: ForkService::new(store.clone(), ledger.clone()),
            archive: ArchiveService::new(store.clone(), ledger.clone(), &archive),
            profiles: ProfileService::new(store.clone()),
            ledger,
            store,
        }
    }

    /// Bytes the ledger counts against `user_id`.
    pub async fn used(&self, user_id: &str) -> u64 {
        self.ledger.usage(user_id).await.unwrap().used_bytes
    }
}

/// Deterministic payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
