//! One JSON file per asset record: `<dir>/<id>.json`.

use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::atomic;
use crate::error::{Result, StoreError};
use crate::model::Asset;

/// Persists asset records as individual files.
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: i64) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn exists(&self, id: i64) -> bool {
        self.path_for(id).exists()
    }

    pub fn save(&self, asset: &Asset) -> Result<()> {
        atomic::write_json(&self.path_for(asset.id), asset)
    }

    pub fn load(&self, id: i64) -> Result<Asset> {
        atomic::read_json(&self.path_for(id))?.ok_or_else(|| StoreError::not_found("asset", id))
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::not_found("asset", id)),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Ids of every file matching `<integer>.json`.
    pub fn list_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| record_id(e.path()))
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn max_id(&self) -> i64 {
        self.list_ids().last().copied().unwrap_or(0)
    }

    /// Load every record in the directory.
    ///
    /// Files that fail to parse are logged and skipped; the valid subset is
    /// returned.
    pub fn load_all(&self) -> Result<HashMap<i64, Asset>> {
        if !self.dir.exists() {
            return Err(StoreError::io(
                &self.dir,
                std::io::Error::new(ErrorKind::NotFound, "metadata directory missing"),
            ));
        }

        let started = Instant::now();
        let ids = self.list_ids();

        let loaded: Vec<(i64, Result<Asset>)> =
            ids.par_iter().map(|&id| (id, self.load(id))).collect();

        let mut assets = HashMap::with_capacity(loaded.len());
        let mut skipped = 0;
        for (id, result) in loaded {
            match result {
                Ok(asset) if asset.id == id => {
                    assets.insert(id, asset);
                }
                Ok(asset) => {
                    warn!(file_id = id, record_id = asset.id, "Skipping record with mismatched id");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(id, error = %e, "Skipping invalid metadata");
                    skipped += 1;
                }
            }
        }

        info!(
            loaded = assets.len(),
            skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded asset metadata from {:?}",
            self.dir
        );
        Ok(assets)
    }
}

fn record_id(path: &Path) -> Option<i64> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".json")?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}
