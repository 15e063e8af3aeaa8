//! Owner id → open [`Library`], plus the shared icon cache.

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Library;
use crate::cache::ObjectCache;
use crate::config::Config;
use crate::error::{Result, StoreError};

pub struct LibraryManager {
    config: Config,
    libraries: RwLock<HashMap<i64, Arc<Library>>>,
    icons: Arc<ObjectCache>,
    cancel: CancellationToken,
}

impl LibraryManager {
    pub fn new(config: Config) -> Result<Self> {
        let icons_dir = config.storage.icons_dir();
        fs::create_dir_all(&icons_dir).map_err(|e| StoreError::io(&icons_dir, e))?;
        let users_dir = config.storage.users_dir();
        fs::create_dir_all(&users_dir).map_err(|e| StoreError::io(&users_dir, e))?;

        let icons = Arc::new(ObjectCache::new(
            "icons",
            config.cache.icons_capacity,
            Some(icons_dir),
        ));

        Ok(Self {
            config,
            libraries: RwLock::new(HashMap::new()),
            icons,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Owner ids with a directory under the users directory.
    pub fn discover_owners(&self) -> Vec<i64> {
        let users_dir = self.config.storage.users_dir();
        let entries = match fs::read_dir(&users_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = ?users_dir, error = %e, "Cannot list owners");
                return Vec::new();
            }
        };

        let mut owners: Vec<i64> = entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse().ok()))
            .filter(|&id: &i64| id > 0)
            .collect();
        owners.sort_unstable();
        owners
    }

    /// Owner ids of the libraries currently open.
    pub fn open_owners(&self) -> Vec<i64> {
        let mut owners: Vec<i64> = self
            .libraries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        owners.sort_unstable();
        owners
    }

    /// Return the library of `owner`, opening and starting it on first use.
    pub fn get_or_open(&self, owner: i64) -> Result<Arc<Library>> {
        if owner <= 0 {
            return Err(StoreError::not_found("owner", owner));
        }

        if let Some(library) = self
            .libraries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&owner)
        {
            return Ok(Arc::clone(library));
        }

        let mut libraries = self.libraries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(library) = libraries.get(&owner) {
            return Ok(Arc::clone(library));
        }

        let library = Arc::new(Library::open(owner, &self.config)?);
        library.start();
        libraries.insert(owner, Arc::clone(&library));
        Ok(library)
    }

    /// Open every owner found on disk. Owners that fail to open are logged
    /// and skipped.
    pub fn open_all(&self) -> Vec<i64> {
        self.discover_owners()
            .into_iter()
            .filter(|&owner| match self.get_or_open(owner) {
                Ok(_) => true,
                Err(e) => {
                    warn!(owner, error = %e, "Failed to open library");
                    false
                }
            })
            .collect()
    }

    /// Stop and forget the library of `owner`. Returns whether it was open.
    pub async fn remove(&self, owner: i64) -> bool {
        let removed = self
            .libraries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&owner);

        match removed {
            Some(library) => {
                library.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Close libraries idle for longer than `timeout`. Returns their owners.
    pub async fn evict_idle(&self, timeout: Duration) -> Vec<i64> {
        let idle: Vec<i64> = self
            .libraries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, library)| library.idle_for() > timeout)
            .map(|(&owner, _)| owner)
            .collect();

        for owner in &idle {
            info!(owner, "Closing idle library");
            self.remove(*owner).await;
        }
        idle
    }

    /// Periodically close idle libraries until [`LibraryManager::shutdown`].
    pub fn spawn_idle_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let cancel = self.cancel.child_token();
        let timeout = Duration::from_secs(self.config.library.idle_timeout_secs);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let closed = manager.evict_idle(timeout).await;
                        if !closed.is_empty() {
                            debug!(count = closed.len(), "Idle libraries closed");
                        }
                    }
                }
            }
        })
    }

    /// Expire idle icons when `icons_ttl_secs` is non-zero. Stops on
    /// [`LibraryManager::shutdown`].
    pub fn spawn_icon_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let ttl = Duration::from_secs(self.config.cache.icons_ttl_secs);
        if ttl.is_zero() {
            return None;
        }
        Some(self.icons.spawn_sweeper(
            self.config.cache.sweep_interval(),
            ttl,
            self.cancel.child_token(),
        ))
    }

    /// Icon bytes by file name, relative to the icons directory.
    pub async fn icon(&self, name: &str, cancel: &CancellationToken) -> Result<Arc<Vec<u8>>> {
        self.icons.load(name, cancel).await
    }

    pub fn icons(&self) -> &Arc<ObjectCache> {
        &self.icons
    }

    /// Close every open library.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        for owner in self.open_owners() {
            self.remove(owner).await;
        }
        self.icons.log_summary();
        info!("All libraries closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn manager(dir: &tempfile::TempDir) -> LibraryManager {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        LibraryManager::new(config).unwrap()
    }

    #[test]
    fn test_get_or_open_reuses_library() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);

        let a = manager.get_or_open(4).unwrap();
        let b = manager.get_or_open(4).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(dir.path().join("users/4/assets").is_dir());
        assert!(manager.get_or_open(0).unwrap_err().is_not_found());
    }

    #[test]
    fn test_discover_owners() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        for name in ["7", "3", "notes", "-1"] {
            fs::create_dir_all(dir.path().join("users").join(name)).unwrap();
        }
        fs::write(dir.path().join("users/12"), b"file").unwrap();

        assert_eq!(manager.discover_owners(), vec![3, 7]);
        assert_eq!(manager.open_all(), vec![3, 7]);
        assert_eq!(manager.open_owners(), vec![3, 7]);
    }

    #[tokio::test]
    async fn test_remove_and_evict_idle() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        manager.get_or_open(1).unwrap();
        manager.get_or_open(2).unwrap();

        assert!(manager.remove(1).await);
        assert!(!manager.remove(1).await);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let closed = manager.evict_idle(Duration::ZERO).await;
        assert_eq!(closed, vec![2]);
        assert!(manager.open_owners().is_empty());
    }

    #[tokio::test]
    async fn test_icon_cache() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        RgbImage::from_pixel(4, 4, Rgb([1, 1, 1]))
            .save(dir.path().join("icons/star.png"))
            .unwrap();

        let cancel = CancellationToken::new();
        let first = manager.icon("star.png", &cancel).await.unwrap();
        let second = manager.icon("star.png", &cancel).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.icons().metrics().hits, 1);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_icon_sweeper_expires_idle_icons() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        assert!(Arc::new(LibraryManager::new(config.clone()).unwrap())
            .spawn_icon_sweeper()
            .is_none());

        config.cache.icons_ttl_secs = 1;
        config.cache.sweep_interval_secs = 1;
        let manager = Arc::new(LibraryManager::new(config).unwrap());
        let sweeper = manager.spawn_icon_sweeper().unwrap();

        manager.icons().put("star.png", vec![0; 16]);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(manager.icons().is_empty());
        assert_eq!(manager.icons().metrics().expired_items, 1);

        manager.shutdown().await;
        sweeper.await.unwrap();
    }

    #[tokio::test]
    async fn test_icon_outside_icons_dir_is_rejected() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let mut config = Config::default();
        config.storage.data_dir = data_dir;
        let manager = LibraryManager::new(config).unwrap();
        RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]))
            .save(dir.path().join("secret.png"))
            .unwrap();

        let cancel = CancellationToken::new();
        let err = manager.icon("../../secret.png", &cancel).await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
        let absolute = dir.path().join("secret.png");
        assert!(manager
            .icon(absolute.to_str().unwrap(), &cancel)
            .await
            .is_err());
        assert!(manager.icons().is_empty());
        assert_eq!(manager.icons().metrics().load_errors, 2);
    }
}
