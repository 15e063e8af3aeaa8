//! One owner's media library: records, index, collections, caches and the
//! background jobs that keep them consistent.

pub mod manager;

pub use manager::LibraryManager;

use chrono::Utc;
use image::ImageReader;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheMetrics, ObjectCache};
use crate::collections::CollectionRegistry;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::index::{AssetIndex, IndexStatus};
use crate::maintenance::{Maintenance, StatsSnapshot, UsageStats};
use crate::model::{
    Album, Asset, AssetFilter, AssetUpdate, Camera, CollectionItem, CollectionPreview, MediaType,
    Page, Person, Pinned, SharedAlbum, Trip,
};
use crate::query;
use crate::store::{atomic, RecordStore, ThumbnailStore};

/// On-disk layout of one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPaths {
    pub root: PathBuf,
    pub assets: PathBuf,
    pub metadata: PathBuf,
    pub thumbnails: PathBuf,
    pub data: PathBuf,
    pub index_file: PathBuf,
}

impl LibraryPaths {
    pub fn for_owner(users_dir: &Path, owner: i64) -> Self {
        let root = users_dir.join(owner.to_string());
        Self {
            assets: root.join("assets"),
            metadata: root.join("metadata"),
            thumbnails: root.join("thumbnails"),
            data: root.join("data"),
            index_file: root.join("index.json"),
            root,
        }
    }

    pub fn collection_file(&self, name: &str) -> PathBuf {
        self.data.join(format!("{}.json", name))
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheTtls {
    originals: Duration,
    thumbnails: Duration,
    sweep_interval: Duration,
}

pub struct Library {
    owner: i64,
    paths: LibraryPaths,
    max_upload_size: u64,
    preview_size: usize,
    ttls: CacheTtls,

    /// Serializes uploads, updates and deletes.
    write_section: Mutex<()>,

    records: Arc<RecordStore>,
    index: Arc<AssetIndex>,
    thumbnails: Arc<ThumbnailStore>,
    originals: Arc<ObjectCache>,
    thumbnail_cache: Arc<ObjectCache>,
    stats: Arc<UsageStats>,
    maintenance: Arc<Maintenance>,

    albums: CollectionRegistry<Album>,
    shared_albums: CollectionRegistry<SharedAlbum>,
    trips: CollectionRegistry<Trip>,
    persons: CollectionRegistry<Person>,
    pinned: CollectionRegistry<Pinned>,
    cameras: CollectionRegistry<Camera>,

    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    last_used: Mutex<Instant>,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Library {
    /// Open (creating directories as needed) the library of `owner`.
    /// Background jobs are not started; see [`Library::start`].
    pub fn open(owner: i64, config: &Config) -> Result<Self> {
        let paths = LibraryPaths::for_owner(&config.storage.users_dir(), owner);
        for dir in [&paths.assets, &paths.data] {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }

        let records = Arc::new(RecordStore::new(&paths.metadata)?);
        let thumbnails = Arc::new(ThumbnailStore::new(
            &paths.thumbnails,
            config.library.thumbnail_size,
        )?);
        let index = Arc::new(AssetIndex::open(&paths.index_file, &paths.assets, &records)?);

        let originals = Arc::new(ObjectCache::new(
            format!("originals-{}", owner),
            config.cache.originals_capacity,
            Some(paths.assets.clone()),
        ));
        let thumbnail_cache = Arc::new(ObjectCache::new(
            format!("thumbnails-{}", owner),
            config.cache.thumbnails_capacity,
            Some(paths.thumbnails.clone()),
        ));
        let stats = Arc::new(UsageStats::new(index.len()));

        let maintenance = Arc::new(Maintenance::new(
            owner,
            Arc::clone(&records),
            Arc::clone(&index),
            Arc::clone(&thumbnails),
            vec![Arc::clone(&originals), Arc::clone(&thumbnail_cache)],
            Arc::clone(&stats),
            config.maintenance.intervals(),
        ));

        let library = Self {
            owner,
            max_upload_size: config.storage.max_upload_size,
            preview_size: config.library.preview_size,
            ttls: CacheTtls {
                originals: Duration::from_secs(config.cache.originals_ttl_secs),
                thumbnails: Duration::from_secs(config.cache.thumbnails_ttl_secs),
                sweep_interval: config.cache.sweep_interval(),
            },
            write_section: Mutex::new(()),
            records,
            index,
            thumbnails,
            originals,
            thumbnail_cache,
            stats,
            maintenance,
            albums: CollectionRegistry::open(paths.collection_file("albums"))?,
            shared_albums: CollectionRegistry::open(paths.collection_file("shared_albums"))?,
            trips: CollectionRegistry::open(paths.collection_file("trips"))?,
            persons: CollectionRegistry::open(paths.collection_file("persons"))?,
            pinned: CollectionRegistry::open(paths.collection_file("pinned"))?,
            cameras: CollectionRegistry::open(paths.collection_file("cameras"))?,
            paths,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            last_used: Mutex::new(Instant::now()),
        };

        library.refresh_collections()?;
        info!(owner, assets = library.index.len(), "Library opened");
        Ok(library)
    }

    /// Start maintenance and cache sweepers on the current tokio runtime.
    /// Outside a runtime this only logs a warning.
    pub fn start(&self) {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!(owner = self.owner, "No async runtime, background jobs not started");
            return;
        }

        let mut tasks = self.lock_tasks();
        if !tasks.is_empty() {
            return;
        }

        tasks.push(Arc::clone(&self.maintenance).spawn(self.cancel.child_token()));
        for (cache, ttl) in [
            (&self.originals, self.ttls.originals),
            (&self.thumbnail_cache, self.ttls.thumbnails),
        ] {
            if !ttl.is_zero() {
                tasks.push(cache.spawn_sweeper(
                    self.ttls.sweep_interval,
                    ttl,
                    self.cancel.child_token(),
                ));
            }
        }
        debug!(owner = self.owner, tasks = tasks.len(), "Background jobs started");
    }

    /// Stop every background job and flush the index.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.lock_tasks());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(owner = self.owner, error = %e, "Background job ended abnormally");
            }
        }

        if let Err(e) = self.index.flush_if_dirty() {
            warn!(owner = self.owner, error = %e, "Final index flush failed");
        }
        info!(owner = self.owner, "Library closed");
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_section
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a record about to be modified. A record the index still lists
    /// but the store no longer has was removed underneath the writer.
    fn load_for_write(&self, id: i64) -> Result<Asset> {
        match self.records.load(id) {
            Err(e) if e.is_not_found() && self.index.contains(id) => Err(StoreError::Conflict(
                format!("asset {} vanished while being modified", id),
            )),
            other => other,
        }
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the last operation on this library.
    pub fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    pub fn owner(&self) -> i64 {
        self.owner
    }

    pub fn paths(&self) -> &LibraryPaths {
        &self.paths
    }

    pub fn maintenance(&self) -> &Arc<Maintenance> {
        &self.maintenance
    }

    pub fn index(&self) -> &AssetIndex {
        &self.index
    }

    /// Store a new asset binary and its record.
    pub fn upload(&self, filename: &str, data: &[u8]) -> Result<Asset> {
        let size = data.len() as u64;
        if size > self.max_upload_size {
            return Err(StoreError::ResourceExceeded {
                actual: size,
                limit: self.max_upload_size,
            });
        }

        self.touch();
        let _guard = self.lock_writes();

        let format = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let (pixel_width, pixel_height) = probe_dimensions(data).unwrap_or((0, 0));
        let now = Utc::now();

        let asset = Asset {
            id: self.index.next_id(),
            user_id: self.owner,
            filename: filename.to_string(),
            media_type: MediaType::from_extension(&format),
            format,
            pixel_width,
            pixel_height,
            creation_date: now,
            modification_date: now,
            ..Default::default()
        };

        let asset_path = self.paths.assets.join(asset.content_file_name());
        atomic::write_bytes(&asset_path, data)?;

        if let Err(e) = self.records.save(&asset) {
            let _ = fs::remove_file(&asset_path);
            return Err(e);
        }

        self.index.add(&asset);
        self.stats.record_upload();

        if !asset.media_type.is_video() && pixel_width > 0 {
            if let Err(e) = self.thumbnails.generate(asset.id, &asset_path) {
                warn!(asset_id = asset.id, error = %e, "Thumbnail generation failed");
            }
        }

        info!(owner = self.owner, asset_id = asset.id, file = %asset.filename, size, "Asset uploaded");
        Ok(asset)
    }

    pub fn get_asset(&self, id: i64) -> Result<Asset> {
        self.touch();
        self.records.load(id)
    }

    /// Raw bytes of the stored binary.
    pub fn get_asset_content(&self, id: i64) -> Result<Vec<u8>> {
        let asset = self.get_asset(id)?;
        let path = self.paths.assets.join(asset.content_file_name());
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::not_found("file", asset.content_file_name()),
            _ => StoreError::io(path, e),
        })
    }

    /// The asset as a displayable image, through the originals cache.
    pub async fn original_image(&self, id: i64, cancel: &CancellationToken) -> Result<Arc<Vec<u8>>> {
        let asset = self.get_asset(id)?;
        self.originals.load(&asset.content_file_name(), cancel).await
    }

    /// The default thumbnail, generated on first request.
    pub async fn thumbnail_image(&self, id: i64, cancel: &CancellationToken) -> Result<Arc<Vec<u8>>> {
        let asset = self.get_asset(id)?;
        let thumbnails = Arc::clone(&self.thumbnails);
        let original = self.paths.assets.join(asset.content_file_name());

        let name = tokio::task::spawn_blocking(move || thumbnails.generate(id, &original))
            .await
            .map_err(|e| StoreError::Unsupported(format!("thumbnail task failed: {}", e)))??;
        self.thumbnail_cache.load(&name, cancel).await
    }

    /// Apply `update` to every id in `update.asset_ids`, in order.
    ///
    /// Each asset is persisted on its own. The first failure aborts the batch
    /// and is returned; assets before it keep their changes.
    pub fn update_assets(&self, update: &AssetUpdate) -> Result<usize> {
        self.touch();
        let _guard = self.lock_writes();

        for id in &update.asset_ids {
            let mut asset = self.load_for_write(*id)?;
            update.apply(&mut asset);
            asset.modification_date = Utc::now();
            self.records.save(&asset)?;
            self.index.update(&asset);
            debug!(asset_id = id, "Asset updated");
        }

        info!(owner = self.owner, count = update.asset_ids.len(), "Assets updated");
        Ok(update.asset_ids.len())
    }

    /// Remove an asset with its binary, record, thumbnails, index and cache
    /// entries.
    pub fn delete_asset(&self, id: i64) -> Result<()> {
        self.touch();
        let _guard = self.lock_writes();

        let asset = self.load_for_write(id)?;
        let file = asset.content_file_name();
        let path = self.paths.assets.join(&file);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(path, e)),
        }

        self.records.delete(id)?;
        let thumbnails = self.thumbnails.delete_all(id)?;
        self.index.remove(id);

        self.originals.remove(&file);
        for name in &thumbnails {
            self.thumbnail_cache.remove(name);
        }
        self.stats.record_removed(1);

        info!(owner = self.owner, asset_id = id, "Asset deleted");
        Ok(())
    }

    pub fn fetch_assets(&self, filter: &AssetFilter) -> Page<Asset> {
        self.touch();
        query::search(&self.index, &self.records, filter)
    }

    pub fn albums(&self) -> &CollectionRegistry<Album> {
        &self.albums
    }

    pub fn shared_albums(&self) -> &CollectionRegistry<SharedAlbum> {
        &self.shared_albums
    }

    pub fn trips(&self) -> &CollectionRegistry<Trip> {
        &self.trips
    }

    pub fn persons(&self) -> &CollectionRegistry<Person> {
        &self.persons
    }

    pub fn pinned(&self) -> &CollectionRegistry<Pinned> {
        &self.pinned
    }

    pub fn cameras(&self) -> &CollectionRegistry<Camera> {
        &self.cameras
    }

    /// Newest assets of one collection item plus its total count.
    fn preview_page(&self, mut filter: AssetFilter) -> Page<Asset> {
        filter.sort_by = "modificationDate".to_string();
        filter.sort_order = "desc".to_string();
        filter.fetch_limit = self.preview_size as i64;
        query::search(&self.index, &self.records, &filter)
    }

    fn refresh_previews<T: CollectionItem>(
        &self,
        registry: &CollectionRegistry<T>,
        filter_for: impl Fn(&T) -> AssetFilter,
    ) {
        for item in registry.get_all() {
            let page = self.preview_page(filter_for(&item));
            registry.set_count(item.id(), page.total);
            registry.set_item_assets(item.id(), page.items);
        }
    }

    /// Recompute counts and previews for albums, trips, people and cameras.
    pub fn refresh_collections(&self) -> Result<()> {
        self.refresh_cameras()?;

        let owner = self.owner;
        self.refresh_previews(&self.albums, |a| AssetFilter {
            albums: vec![a.id],
            ..AssetFilter::for_user(owner)
        });
        self.refresh_previews(&self.trips, |t| AssetFilter {
            trips: vec![t.id],
            ..AssetFilter::for_user(owner)
        });
        self.refresh_previews(&self.persons, |p| AssetFilter {
            persons: vec![p.id],
            ..AssetFilter::for_user(owner)
        });
        self.refresh_previews(&self.cameras, |c| AssetFilter {
            camera_make: c.camera_make.clone(),
            camera_model: c.camera_model.clone(),
            ..AssetFilter::for_user(owner)
        });
        Ok(())
    }

    /// Derive the camera collection from the make/model pairs of indexed
    /// assets. Known cameras keep their ids.
    fn refresh_cameras(&self) -> Result<()> {
        let page = query::search(&self.index, &self.records, &AssetFilter::for_user(self.owner));

        let mut seen: BTreeMap<(String, String), usize> = BTreeMap::new();
        for asset in &page.items {
            if asset.camera_make.is_empty() && asset.camera_model.is_empty() {
                continue;
            }
            *seen
                .entry((asset.camera_make.clone(), asset.camera_model.clone()))
                .or_default() += 1;
        }

        let existing: HashMap<(String, String), Camera> = self
            .cameras
            .get_all()
            .into_iter()
            .map(|c| ((c.camera_make.clone(), c.camera_model.clone()), c))
            .collect();
        if existing.len() == seen.len() && seen.keys().all(|k| existing.contains_key(k)) {
            return Ok(());
        }

        let mut next_id = existing.values().map(|c| c.id).max().unwrap_or(0);
        let now = Utc::now();
        let cameras: Vec<Camera> = seen
            .into_iter()
            .map(|((make, model), count)| match existing.get(&(make.clone(), model.clone())) {
                Some(known) => Camera {
                    count,
                    ..known.clone()
                },
                None => {
                    next_id += 1;
                    Camera {
                        id: next_id,
                        camera_make: make,
                        camera_model: model,
                        count,
                        creation_date: now,
                        modification_date: now,
                    }
                }
            })
            .collect();

        debug!(owner = self.owner, cameras = cameras.len(), "Camera collection refreshed");
        self.cameras.replace_all(cameras)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn index_status(&self) -> IndexStatus {
        self.index.status()
    }

    /// Metrics of the originals and thumbnail caches.
    pub fn cache_metrics(&self) -> (CacheMetrics, CacheMetrics) {
        (self.originals.metrics(), self.thumbnail_cache.metrics())
    }
}

/// Items of `registry` in the requested order, each with its asset preview.
pub fn previews<T: CollectionItem>(
    registry: &CollectionRegistry<T>,
    sort_by: &str,
    sort_order: &str,
) -> Vec<CollectionPreview<T>> {
    registry
        .get_all_sorted(sort_by, sort_order)
        .into_iter()
        .map(|item| CollectionPreview {
            assets: registry.item_assets(item.id()),
            item,
        })
        .collect()
}

fn probe_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::{tempdir, TempDir};

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.library.thumbnail_size = 32;
        config
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        RgbImage::from_pixel(width, height, Rgb([10, 200, 30]))
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_upload_update_query_delete() {
        let dir = tempdir().unwrap();
        let library = Library::open(4, &config(&dir)).unwrap();

        let uploaded = library.upload("img_01.jpg", b"not really a jpeg").unwrap();
        assert_eq!(uploaded.user_id, 4);
        assert!(!uploaded.is_favorite);

        library
            .update_assets(&AssetUpdate {
                asset_ids: vec![uploaded.id],
                is_favorite: Some(true),
                ..Default::default()
            })
            .unwrap();

        let favorites = AssetFilter {
            is_favorite: Some(true),
            ..AssetFilter::for_user(4)
        };
        let page = library.fetch_assets(&favorites);
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, uploaded.id);
        assert_eq!(page.items[0].filename, "img_01.jpg");

        library.delete_asset(uploaded.id).unwrap();
        let page = library.fetch_assets(&favorites);
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
        assert!(library.get_asset(uploaded.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_upload_size_limit() {
        let dir = tempdir().unwrap();
        let mut config = config(&dir);
        config.storage.max_upload_size = 4;
        let library = Library::open(4, &config).unwrap();

        assert!(matches!(
            library.upload("big.jpg", b"12345"),
            Err(StoreError::ResourceExceeded { actual: 5, limit: 4 })
        ));
        assert_eq!(library.stats().total_assets, 0);
    }

    #[test]
    fn test_upload_probes_image_and_makes_thumbnail() {
        let dir = tempdir().unwrap();
        let library = Library::open(4, &config(&dir)).unwrap();

        let asset = library.upload("Holiday.PNG", &png_bytes(64, 32)).unwrap();
        assert_eq!(asset.format, "png");
        assert_eq!(asset.media_type, MediaType::Png);
        assert_eq!((asset.pixel_width, asset.pixel_height), (64, 32));
        assert!(library.thumbnails.has_cached(asset.id, 32, 32));
        assert_eq!(library.get_asset_content(asset.id).unwrap(), png_bytes(64, 32));

        let stats = library.stats();
        assert_eq!(stats.total_assets, 1);
        assert_eq!(stats.uploads_24h, 1);
    }

    #[test]
    fn test_batch_update_stops_at_first_missing_id() {
        let dir = tempdir().unwrap();
        let library = Library::open(4, &config(&dir)).unwrap();
        let a = library.upload("a.jpg", b"a").unwrap();
        let b = library.upload("b.jpg", b"b").unwrap();

        let result = library.update_assets(&AssetUpdate {
            asset_ids: vec![a.id, 999, b.id],
            add_albums: vec![1],
            ..Default::default()
        });
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(library.get_asset(a.id).unwrap().albums, vec![1]);
        assert!(library.get_asset(b.id).unwrap().albums.is_empty());
    }

    #[test]
    fn test_record_removed_underneath_is_a_conflict() {
        let dir = tempdir().unwrap();
        let library = Library::open(4, &config(&dir)).unwrap();
        let a = library.upload("a.jpg", b"a").unwrap();
        fs::remove_file(library.records.path_for(a.id)).unwrap();

        let update = AssetUpdate {
            asset_ids: vec![a.id],
            is_hidden: Some(true),
            ..Default::default()
        };
        assert!(matches!(library.update_assets(&update), Err(StoreError::Conflict(_))));
        assert!(matches!(library.delete_asset(a.id), Err(StoreError::Conflict(_))));
        assert!(library.delete_asset(999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_album_previews_and_cameras() {
        let dir = tempdir().unwrap();
        let library = Library::open(4, &config(&dir)).unwrap();
        let album = library
            .albums()
            .create(Album {
                name: "Summer".to_string(),
                ..Default::default()
            })
            .unwrap();

        let mut ids = Vec::new();
        for i in 0..8 {
            ids.push(library.upload(&format!("beach_{}.jpg", i), b"x").unwrap().id);
        }
        library
            .update_assets(&AssetUpdate {
                asset_ids: ids.clone(),
                add_albums: vec![album.id],
                camera_make: Some("Canon".to_string()),
                camera_model: Some("R5".to_string()),
                ..Default::default()
            })
            .unwrap();
        library.refresh_collections().unwrap();

        let albums = previews(library.albums(), "id", "asc");
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].item.count, 8);
        assert_eq!(albums[0].assets.len(), 6);

        let cameras = library.cameras().get_all();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].camera_model, "R5");
        assert_eq!(cameras[0].count, 8);

        library.refresh_collections().unwrap();
        assert_eq!(library.cameras().get_all()[0].id, cameras[0].id);
    }

    #[test]
    fn test_reopen_keeps_ids_increasing() {
        let dir = tempdir().unwrap();
        let config = config(&dir);
        let first = {
            let library = Library::open(4, &config).unwrap();
            let asset = library.upload("a.jpg", b"a").unwrap();
            library.index().flush_if_dirty().unwrap();
            asset
        };

        let library = Library::open(4, &config).unwrap();
        assert!(library.index().contains(first.id));
        let second = library.upload("b.jpg", b"b").unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_cached_image_loads() {
        let dir = tempdir().unwrap();
        let library = Library::open(4, &config(&dir)).unwrap();
        library.start();
        let asset = library.upload("pic.png", &png_bytes(40, 40)).unwrap();

        let cancel = CancellationToken::new();
        let original = library.original_image(asset.id, &cancel).await.unwrap();
        assert_eq!(*original, png_bytes(40, 40));

        let thumb = library.thumbnail_image(asset.id, &cancel).await.unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));

        let (originals, thumbnails) = library.cache_metrics();
        assert_eq!(originals.file_loads, 1);
        assert_eq!(thumbnails.file_loads, 1);

        library.shutdown().await;
        assert!(!library.index_status().dirty);
    }
}
