use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// Point-in-time copy of an owner's usage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_assets: usize,
    /// Uploads since the last rolling reset.
    pub uploads_24h: u64,
    pub last_reset: Option<DateTime<Utc>>,
}

/// Usage counters for one owner.
#[derive(Debug, Default)]
pub struct UsageStats {
    inner: Mutex<StatsSnapshot>,
}

impl UsageStats {
    pub fn new(total_assets: usize) -> Self {
        Self {
            inner: Mutex::new(StatsSnapshot {
                total_assets,
                ..Default::default()
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut StatsSnapshot) -> R) -> R {
        f(&mut self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn record_upload(&self) {
        self.with(|s| {
            s.total_assets += 1;
            s.uploads_24h += 1;
        });
    }

    pub fn record_removed(&self, count: usize) {
        self.with(|s| s.total_assets = s.total_assets.saturating_sub(count));
    }

    pub fn set_total(&self, total: usize) {
        self.with(|s| s.total_assets = total);
    }

    /// Zero the rolling upload counter.
    pub fn reset_rolling(&self) {
        self.with(|s| {
            s.uploads_24h = 0;
            s.last_reset = Some(Utc::now());
        });
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.with(|s| s.clone())
    }
}
