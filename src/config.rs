use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::maintenance::MaintenanceIntervals;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the data directory; owners live under `<data_dir>/users/<id>`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Largest accepted upload, in bytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phovault")
}

fn default_max_upload_size() -> u64 {
    100 * 1024 * 1024 // 100MB
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl StorageConfig {
    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join("users")
    }

    pub fn icons_dir(&self) -> PathBuf {
        self.data_dir.join("icons")
    }
}

/// Capacities are entry counts; TTLs are seconds, `0` disables expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_originals_capacity")]
    pub originals_capacity: usize,

    #[serde(default = "default_originals_ttl")]
    pub originals_ttl_secs: u64,

    #[serde(default = "default_thumbnails_capacity")]
    pub thumbnails_capacity: usize,

    #[serde(default = "default_thumbnails_ttl")]
    pub thumbnails_ttl_secs: u64,

    #[serde(default = "default_icons_capacity")]
    pub icons_capacity: usize,

    #[serde(default)]
    pub icons_ttl_secs: u64,

    /// How often expired entries are swept.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_originals_capacity() -> usize {
    50
}

fn default_originals_ttl() -> u64 {
    5 * 60
}

fn default_thumbnails_capacity() -> usize {
    30_000
}

fn default_thumbnails_ttl() -> u64 {
    60 * 60
}

fn default_icons_capacity() -> usize {
    1000
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            originals_capacity: default_originals_capacity(),
            originals_ttl_secs: default_originals_ttl(),
            thumbnails_capacity: default_thumbnails_capacity(),
            thumbnails_ttl_secs: default_thumbnails_ttl(),
            icons_capacity: default_icons_capacity(),
            icons_ttl_secs: 0,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Maintenance timer periods in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    #[serde(default = "default_rebuild_interval")]
    pub rebuild_interval_secs: u64,

    #[serde(default = "default_stats_reset_interval")]
    pub stats_reset_interval_secs: u64,

    #[serde(default = "default_orphan_sweep_interval")]
    pub orphan_sweep_interval_secs: u64,
}

fn default_flush_interval() -> u64 {
    5 * 60
}

fn default_rebuild_interval() -> u64 {
    24 * 60 * 60
}

fn default_stats_reset_interval() -> u64 {
    30 * 60
}

fn default_orphan_sweep_interval() -> u64 {
    60 * 60
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval(),
            rebuild_interval_secs: default_rebuild_interval(),
            stats_reset_interval_secs: default_stats_reset_interval(),
            orphan_sweep_interval_secs: default_orphan_sweep_interval(),
        }
    }
}

impl MaintenanceConfig {
    pub fn intervals(&self) -> MaintenanceIntervals {
        MaintenanceIntervals {
            flush: Duration::from_secs(self.flush_interval_secs),
            rebuild: Duration::from_secs(self.rebuild_interval_secs),
            stats_reset: Duration::from_secs(self.stats_reset_interval_secs),
            orphan_sweep: Duration::from_secs(self.orphan_sweep_interval_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Libraries untouched for this long are closed by the manager.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Number of newest assets kept as a collection preview.
    #[serde(default = "default_preview_size")]
    pub preview_size: usize,

    /// Edge length of generated thumbnails.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
}

fn default_idle_timeout() -> u64 {
    60 * 60
}

fn default_preview_size() -> usize {
    6
}

fn default_thumbnail_size() -> u32 {
    256
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            preview_size: default_preview_size(),
            thumbnail_size: default_thumbnail_size(),
        }
    }
}

impl Config {
    /// Load from `path`, else `PHOVAULT_CONFIG`, else the default location.
    /// A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {:?}", config_path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {:?}", config_path))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file {:?}", config_path))?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PHOVAULT_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("phovault")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[storage]\ndata_dir = \"/srv/photos\"\n\n[cache]\noriginals_capacity = 10\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/photos"));
        assert_eq!(config.storage.max_upload_size, default_max_upload_size());
        assert_eq!(config.cache.originals_capacity, 10);
        assert_eq!(config.cache.thumbnails_capacity, 30_000);
        assert_eq!(config.maintenance.intervals(), MaintenanceIntervals::default());
        assert_eq!(config.storage.users_dir(), PathBuf::from("/srv/photos/users"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
