//! Periodic background jobs for one owner's library.
//!
//! Four timers run in one task: flush the index snapshot when dirty, rebuild
//! the index, reset rolling usage counters and sweep orphaned assets. They
//! stop together when the cancellation token fires, after a final flush.

pub mod stats;

pub use stats::{StatsSnapshot, UsageStats};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::ObjectCache;
use crate::error::Result;
use crate::index::AssetIndex;
use crate::store::{RecordStore, ThumbnailStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceJob {
    Flush,
    Rebuild,
    ResetStats,
    OrphanSweep,
}

impl fmt::Display for MaintenanceJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MaintenanceJob::Flush => "flush",
            MaintenanceJob::Rebuild => "rebuild",
            MaintenanceJob::ResetStats => "reset-stats",
            MaintenanceJob::OrphanSweep => "orphan-sweep",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceIntervals {
    pub flush: Duration,
    pub rebuild: Duration,
    pub stats_reset: Duration,
    pub orphan_sweep: Duration,
}

impl Default for MaintenanceIntervals {
    fn default() -> Self {
        Self {
            flush: Duration::from_secs(5 * 60),
            rebuild: Duration::from_secs(24 * 60 * 60),
            stats_reset: Duration::from_secs(30 * 60),
            orphan_sweep: Duration::from_secs(60 * 60),
        }
    }
}

/// Everything the jobs touch.
pub struct Maintenance {
    owner: i64,
    records: Arc<RecordStore>,
    index: Arc<AssetIndex>,
    thumbnails: Arc<ThumbnailStore>,
    caches: Vec<Arc<ObjectCache>>,
    stats: Arc<UsageStats>,
    intervals: MaintenanceIntervals,
}

impl Maintenance {
    pub fn new(
        owner: i64,
        records: Arc<RecordStore>,
        index: Arc<AssetIndex>,
        thumbnails: Arc<ThumbnailStore>,
        caches: Vec<Arc<ObjectCache>>,
        stats: Arc<UsageStats>,
        intervals: MaintenanceIntervals,
    ) -> Self {
        Self {
            owner,
            records,
            index,
            thumbnails,
            caches,
            stats,
            intervals,
        }
    }

    pub fn intervals(&self) -> MaintenanceIntervals {
        self.intervals
    }

    /// Run one job on the calling thread.
    #[instrument(skip(self), fields(owner = self.owner))]
    pub fn run_once(&self, job: MaintenanceJob) -> Result<()> {
        match job {
            MaintenanceJob::Flush => {
                if self.index.flush_if_dirty()? {
                    info!("Index saved");
                }
            }
            MaintenanceJob::Rebuild => {
                info!("Starting index rebuild");
                let report = self.index.rebuild(&self.records)?;
                self.stats.set_total(report.indexed);
            }
            MaintenanceJob::ResetStats => {
                self.stats.reset_rolling();
                debug!("Rolling upload counter reset");
            }
            MaintenanceJob::OrphanSweep => {
                self.sweep_orphans()?;
            }
        }
        Ok(())
    }

    /// Remove every indexed asset whose binary is gone: index entry, record,
    /// thumbnails and cached bytes. Returns how many were removed.
    pub fn sweep_orphans(&self) -> Result<usize> {
        let orphans = self.index.orphans();
        if orphans.is_empty() {
            return Ok(0);
        }

        for (id, file) in &orphans {
            warn!(asset_id = id, file = %file, "Removing orphaned asset");
            self.index.remove(*id);

            if let Err(e) = self.records.delete(*id) {
                if !e.is_not_found() {
                    warn!(asset_id = id, error = %e, "Failed to delete orphaned record");
                }
            }

            let thumbnails = match self.thumbnails.delete_all(*id) {
                Ok(names) => names,
                Err(e) => {
                    warn!(asset_id = id, error = %e, "Failed to delete orphaned thumbnails");
                    Vec::new()
                }
            };

            for cache in &self.caches {
                cache.remove(file);
                for name in &thumbnails {
                    cache.remove(name);
                }
            }
        }

        self.stats.record_removed(orphans.len());
        info!(removed = orphans.len(), "Orphan sweep finished");
        Ok(orphans.len())
    }

    async fn run_job(self: &Arc<Self>, job: MaintenanceJob) {
        let this = Arc::clone(self);
        match tokio::task::spawn_blocking(move || this.run_once(job)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(owner = self.owner, %job, error = %e, "Maintenance job failed"),
            Err(e) => error!(owner = self.owner, %job, error = %e, "Maintenance job panicked"),
        }
    }

    /// Start the timers. The task exits after a final flush once `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut flush = ticker(self.intervals.flush);
        let mut rebuild = ticker(self.intervals.rebuild);
        let mut stats = ticker(self.intervals.stats_reset);
        let mut orphans = ticker(self.intervals.orphan_sweep);

        // The first tick of a tokio interval completes immediately.
        flush.tick().await;
        rebuild.tick().await;
        stats.tick().await;
        orphans.tick().await;

        info!(owner = self.owner, "Maintenance started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = flush.tick() => self.run_job(MaintenanceJob::Flush).await,
                _ = rebuild.tick() => self.run_job(MaintenanceJob::Rebuild).await,
                _ = stats.tick() => self.run_job(MaintenanceJob::ResetStats).await,
                _ = orphans.tick() => self.run_job(MaintenanceJob::OrphanSweep).await,
            }
        }

        self.run_job(MaintenanceJob::Flush).await;
        info!(owner = self.owner, "Maintenance stopped");
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Asset;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        assets_dir: std::path::PathBuf,
        maintenance: Arc<Maintenance>,
        cache: Arc<ObjectCache>,
    }

    fn fixture(intervals: MaintenanceIntervals) -> Fixture {
        let dir = tempdir().unwrap();
        let assets_dir = dir.path().join("assets");
        fs::create_dir_all(&assets_dir).unwrap();
        let records = Arc::new(RecordStore::new(dir.path().join("metadata")).unwrap());
        let thumbnails = Arc::new(ThumbnailStore::new(dir.path().join("thumbnails"), 64).unwrap());

        for id in 1..=3 {
            let asset = Asset {
                id,
                user_id: 4,
                filename: format!("photo {}.jpg", id),
                format: "jpg".to_string(),
                ..Default::default()
            };
            records.save(&asset).unwrap();
            fs::write(assets_dir.join(asset.content_file_name()), b"data").unwrap();
        }

        let index = Arc::new(
            AssetIndex::open(dir.path().join("index.json"), &assets_dir, &records).unwrap(),
        );
        let cache = Arc::new(ObjectCache::new("originals", 8, Some(assets_dir.clone())));
        let stats = Arc::new(UsageStats::new(index.len()));
        let maintenance = Arc::new(Maintenance::new(
            4,
            records,
            index,
            thumbnails,
            vec![Arc::clone(&cache)],
            stats,
            intervals,
        ));

        Fixture {
            _dir: dir,
            assets_dir,
            maintenance,
            cache,
        }
    }

    #[test]
    fn test_orphan_sweep_removes_everything() {
        let fx = fixture(MaintenanceIntervals::default());
        let m = &fx.maintenance;
        m.thumbnails.save(2, 64, 64, b"thumb").unwrap();
        fx.cache.put("2.jpg", b"data".to_vec());
        fs::remove_file(fx.assets_dir.join("2.jpg")).unwrap();

        assert_eq!(m.sweep_orphans().unwrap(), 1);
        assert!(!m.index.contains(2));
        assert!(!m.records.exists(2));
        assert!(m.thumbnails.file_names(2).is_empty());
        assert!(fx.cache.get("2.jpg").is_none());
        assert_eq!(m.stats.snapshot().total_assets, 2);
        assert!(m.index.is_dirty());

        assert_eq!(m.sweep_orphans().unwrap(), 0);
    }

    #[test]
    fn test_run_once_flush_and_rebuild() {
        let fx = fixture(MaintenanceIntervals::default());
        let m = &fx.maintenance;

        m.index.mark_dirty();
        m.run_once(MaintenanceJob::Flush).unwrap();
        assert!(!m.index.is_dirty());

        fs::remove_file(fx.assets_dir.join("3.jpg")).unwrap();
        m.run_once(MaintenanceJob::Rebuild).unwrap();
        assert!(!m.index.contains(3));
        assert_eq!(m.stats.snapshot().total_assets, 2);
    }

    #[tokio::test]
    async fn test_scheduler_runs_and_flushes_on_cancel() {
        let intervals = MaintenanceIntervals {
            flush: Duration::from_secs(3600),
            rebuild: Duration::from_secs(3600),
            stats_reset: Duration::from_millis(10),
            orphan_sweep: Duration::from_secs(3600),
        };
        let fx = fixture(intervals);
        let m = Arc::clone(&fx.maintenance);
        m.stats.record_upload();
        m.index.mark_dirty();

        let cancel = CancellationToken::new();
        let handle = Arc::clone(&m).spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(m.stats.snapshot().uploads_24h, 0);
        assert!(!m.index.is_dirty());
    }
}
