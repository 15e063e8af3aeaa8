//! Derived inverted index over one owner's asset records.
//!
//! The index can always be discarded and rebuilt from the record store. A
//! single read-write lock guards every map together.

mod snapshot;

pub use snapshot::{tokenize, IndexMaps};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::model::Asset;
use crate::store::{atomic, RecordStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub last_rebuild: Option<DateTime<Utc>>,
    pub asset_count: usize,
    pub text_index_size: usize,
    pub date_index_size: usize,
    pub dirty: bool,
}

/// Outcome of a full rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub indexed: usize,
    pub missing_files: usize,
}

struct IndexState {
    maps: IndexMaps,
    dirty: bool,
    last_rebuild: Option<DateTime<Utc>>,
}

pub struct AssetIndex {
    snapshot_path: PathBuf,
    assets_dir: PathBuf,
    state: RwLock<IndexState>,
}

impl AssetIndex {
    /// Load the snapshot at `snapshot_path`, or rebuild from `records` when it
    /// is missing or unreadable.
    pub fn open(
        snapshot_path: impl Into<PathBuf>,
        assets_dir: impl Into<PathBuf>,
        records: &RecordStore,
    ) -> Result<Self> {
        let index = Self {
            snapshot_path: snapshot_path.into(),
            assets_dir: assets_dir.into(),
            state: RwLock::new(IndexState {
                maps: IndexMaps::default(),
                dirty: false,
                last_rebuild: None,
            }),
        };

        match atomic::read_json::<IndexMaps>(&index.snapshot_path) {
            Ok(Some(mut maps)) => {
                maps.last_id = maps.last_id.max(records.max_id());
                info!(
                    path = ?index.snapshot_path,
                    assets = maps.len(),
                    "Loaded index snapshot"
                );
                index.write_state().maps = maps;
            }
            Ok(None) => {
                info!(path = ?index.snapshot_path, "No index snapshot, rebuilding");
                index.rebuild(records)?;
            }
            Err(e @ StoreError::Corrupt { .. }) => {
                warn!(error = %e, "Index snapshot unreadable, rebuilding");
                index.rebuild(records)?;
            }
            Err(e) => return Err(e),
        }

        Ok(index)
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    fn read_state(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with shared access to the maps.
    pub fn read<R>(&self, f: impl FnOnce(&IndexMaps) -> R) -> R {
        f(&self.read_state().maps)
    }

    pub fn add(&self, asset: &Asset) {
        let mut state = self.write_state();
        state.maps.add(asset);
        state.dirty = true;
    }

    pub fn update(&self, asset: &Asset) {
        let mut state = self.write_state();
        state.maps.remove(asset.id);
        state.maps.add(asset);
        state.dirty = true;
    }

    pub fn remove(&self, id: i64) -> bool {
        let mut state = self.write_state();
        let removed = state.maps.remove(id);
        if removed {
            state.dirty = true;
        }
        removed
    }

    pub fn contains(&self, id: i64) -> bool {
        self.read_state().maps.contains(id)
    }

    pub fn len(&self) -> usize {
        self.read_state().maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().maps.is_empty()
    }

    /// Reserve the next asset id.
    pub fn next_id(&self) -> i64 {
        let mut state = self.write_state();
        state.maps.last_id += 1;
        state.dirty = true;
        state.maps.last_id
    }

    /// Clear and re-index every parseable record whose binary exists, then
    /// write a fresh snapshot. Holds the write lock throughout.
    pub fn rebuild(&self, records: &RecordStore) -> Result<RebuildReport> {
        let started = Instant::now();
        let mut state = self.write_state();

        let loaded = records.load_all()?;
        let max_record_id = loaded.keys().copied().max().unwrap_or(0);

        let mut assets: Vec<Asset> = loaded.into_values().collect();
        assets.sort_by_key(|a| a.id);

        state.maps.clear();
        let mut report = RebuildReport::default();
        for asset in &assets {
            let file = asset.content_file_name();
            if !self.assets_dir.join(&file).exists() {
                warn!(asset_id = asset.id, file = %file, "Asset file missing, not indexed");
                report.missing_files += 1;
                continue;
            }
            state.maps.add(asset);
            report.indexed += 1;
        }
        state.maps.last_id = state.maps.last_id.max(max_record_id);

        atomic::write_json(&self.snapshot_path, &state.maps)?;
        state.dirty = false;
        state.last_rebuild = Some(Utc::now());

        info!(
            indexed = report.indexed,
            missing = report.missing_files,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Index rebuilt"
        );
        Ok(report)
    }

    /// Write the snapshot unconditionally.
    pub fn save_snapshot(&self) -> Result<()> {
        let mut state = self.write_state();
        atomic::write_json(&self.snapshot_path, &state.maps)?;
        state.dirty = false;
        debug!(path = ?self.snapshot_path, "Index snapshot saved");
        Ok(())
    }

    /// Write the snapshot if anything changed since the last write.
    /// Returns whether a write happened.
    pub fn flush_if_dirty(&self) -> Result<bool> {
        let mut state = self.write_state();
        if !state.dirty {
            return Ok(false);
        }
        atomic::write_json(&self.snapshot_path, &state.maps)?;
        state.dirty = false;
        debug!(path = ?self.snapshot_path, "Index snapshot flushed");
        Ok(true)
    }

    /// Indexed ids whose binary no longer exists, with their file names.
    pub fn orphans(&self) -> Vec<(i64, String)> {
        let state = self.read_state();
        let mut orphans: Vec<(i64, String)> = state
            .maps
            .files
            .iter()
            .filter(|(_, file)| !self.assets_dir.join(file).exists())
            .map(|(&id, file)| (id, file.clone()))
            .collect();
        orphans.sort_by_key(|(id, _)| *id);
        orphans
    }

    pub fn status(&self) -> IndexStatus {
        let state = self.read_state();
        IndexStatus {
            last_rebuild: state.last_rebuild,
            asset_count: state.maps.len(),
            text_index_size: state.maps.tokens.len(),
            date_index_size: state.maps.dates.len(),
            dirty: state.dirty,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.read_state().dirty
    }

    pub fn mark_dirty(&self) {
        self.write_state().dirty = true;
    }
}
