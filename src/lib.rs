//! Storage core for a personal photo and video library.
//!
//! Assets are persisted one JSON record per file next to their binaries.
//! A rebuildable inverted index answers filtered, sorted and paginated
//! queries; collections (albums, trips, people, ...) live in one JSON file
//! per kind; binary payloads are served through bounded LRU/TTL caches.

pub mod cache;
pub mod collections;
pub mod config;
pub mod error;
pub mod index;
pub mod library;
pub mod logging;
pub mod maintenance;
pub mod model;
pub mod query;
pub mod store;

pub use cache::{CacheMetrics, ObjectCache};
pub use collections::CollectionRegistry;
pub use config::Config;
pub use error::{Result, StoreError};
pub use index::{AssetIndex, IndexStatus};
pub use library::{Library, LibraryManager};
pub use maintenance::{Maintenance, MaintenanceJob};
pub use model::{Asset, AssetFilter, AssetUpdate, Page};
pub use store::RecordStore;
