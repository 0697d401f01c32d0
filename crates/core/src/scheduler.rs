//! Periodic archive maintenance.

use std::sync::Arc;
use std::time::Duration;

use blobhub_common::{AppResult, config::ArchiveConfig};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::services::{ArchiveService, SweepReport};

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval between passes.
    pub interval: Duration,
    /// Whether to run the chunk purge pass.
    pub enable_purge: bool,
    /// Whether to run the abandoned-upload reaper.
    pub enable_reaper: bool,
}

impl SchedulerConfig {
    /// Derive from archive settings. `None` when scheduled passes are off.
    #[must_use]
    pub fn from_archive(config: &ArchiveConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
            enable_purge: config.purge_after_days.is_some(),
            enable_reaper: config.abandoned_upload_ttl_hours.is_some(),
        })
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            enable_purge: false,
            enable_reaper: false,
        }
    }
}

/// Maintenance passes the scheduler drives.
#[async_trait::async_trait]
pub trait MaintenanceJobs: Send + Sync {
    /// Archive stale blobs of every user.
    async fn sweep_all(&self) -> AppResult<SweepReport>;

    /// Purge chunks of long-deleted blobs.
    async fn purge_deleted(&self) -> AppResult<SweepReport>;

    /// Remove abandoned uploads.
    async fn reap_abandoned(&self) -> AppResult<SweepReport>;
}

#[async_trait::async_trait]
impl MaintenanceJobs for ArchiveService {
    async fn sweep_all(&self) -> AppResult<SweepReport> {
        Self::sweep_all(self).await
    }

    async fn purge_deleted(&self) -> AppResult<SweepReport> {
        Self::purge_deleted(self).await
    }

    async fn reap_abandoned(&self) -> AppResult<SweepReport> {
        Self::reap_abandoned(self).await
    }
}

/// Spawn the maintenance loop.
///
/// Passes run back to back on every tick: sweep, then purge, then reap. A
/// failed pass is logged and the loop carries on.
pub fn spawn_scheduler<J: MaintenanceJobs + 'static>(
    config: SchedulerConfig,
    jobs: Arc<J>,
) -> JoinHandle<()> {
    tracing::info!(
        interval_secs = config.interval.as_secs(),
        purge = config.enable_purge,
        reaper = config.enable_reaper,
        "Archive scheduler started"
    );

    tokio::spawn(async move {
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            if let Err(e) = jobs.sweep_all().await {
                tracing::error!(error = %e, "Archival sweep failed");
            }
            if config.enable_purge {
                if let Err(e) = jobs.purge_deleted().await {
                    tracing::error!(error = %e, "Chunk purge failed");
                }
            }
            if config.enable_reaper {
                if let Err(e) = jobs.reap_abandoned().await {
                    tracing::error!(error = %e, "Abandoned upload reaper failed");
                }
            }
        }
    })
}
