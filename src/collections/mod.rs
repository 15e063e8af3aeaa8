//! Generic CRUD over one JSON file per collection kind.
//!
//! The file holds the whole collection as a list and is the unit of atomicity.
//! Writers are serialized through a per-registry section that spans the
//! read-modify-write of the file; readers use the in-memory map.

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::model::{Asset, CollectionItem, ItemSortField, SortOrder};
use crate::store::atomic;

pub struct CollectionRegistry<T: CollectionItem> {
    path: PathBuf,
    write_section: Mutex<()>,
    items: RwLock<HashMap<i64, T>>,
    item_assets: RwLock<HashMap<i64, Vec<Asset>>>,
}

impl<T: CollectionItem> CollectionRegistry<T> {
    /// Open the collection stored at `path`. A missing file is an empty
    /// collection; an unparseable one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let list = Self::read_file(&path)?;

        let mut items = HashMap::with_capacity(list.len());
        for item in list {
            if let Some(previous) = items.insert(item.id(), item) {
                warn!(path = ?path, id = previous.id(), "Duplicate collection id, keeping the last entry");
            }
        }

        info!(path = ?path, count = items.len(), "Opened collection");
        Ok(Self {
            path,
            write_section: Mutex::new(()),
            items: RwLock::new(items),
            item_assets: RwLock::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(path: &Path) -> Result<Vec<T>> {
        Ok(atomic::read_json::<Vec<T>>(path)?.unwrap_or_default())
    }

    /// Run `f` over the file contents under the exclusive write section,
    /// persist the result when `f` succeeds, then let `apply` bring the
    /// in-memory map in line before the section is released.
    fn modify<R>(
        &self,
        f: impl FnOnce(&mut Vec<T>) -> Result<R>,
        apply: impl FnOnce(&mut HashMap<i64, T>, &R),
    ) -> Result<R> {
        let _guard = self
            .write_section
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut list = Self::read_file(&self.path)?;
        let result = f(&mut list)?;
        atomic::write_json(&self.path, &list)?;
        apply(&mut self.items_write(), &result);
        Ok(result)
    }

    fn items_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<i64, T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn items_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<i64, T>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign the next id (`max + 1`), stamp both dates and append.
    pub fn create(&self, mut item: T) -> Result<T> {
        let created = self.modify(
            |list| {
                let max_id = list.iter().map(|i| i.id()).max().unwrap_or(0);
                let now = Utc::now();
                item.set_id(max_id + 1);
                item.set_creation_date(now);
                item.set_modification_date(now);
                list.push(item.clone());
                Ok(item)
            },
            |map, created| {
                map.insert(created.id(), created.clone());
            },
        )?;

        debug!(path = ?self.path, id = created.id(), "Created collection item");
        Ok(created)
    }

    /// Replace the stored item with the same id, stamping its modification date.
    pub fn update(&self, mut item: T) -> Result<T> {
        self.modify(
            |list| {
                let slot = list
                    .iter_mut()
                    .find(|i| i.id() == item.id())
                    .ok_or(StoreError::ItemNotFound(item.id()))?;
                item.set_modification_date(Utc::now());
                *slot = item.clone();
                Ok(item)
            },
            |map, updated| {
                map.insert(updated.id(), updated.clone());
            },
        )
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.modify(
            |list| {
                let pos = list
                    .iter()
                    .position(|i| i.id() == id)
                    .ok_or(StoreError::ItemNotFound(id))?;
                list.remove(pos);
                Ok(())
            },
            |map, _| {
                map.remove(&id);
                self.item_assets
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
            },
        )?;

        debug!(path = ?self.path, id, "Deleted collection item");
        Ok(())
    }

    /// Replace the whole collection, keeping the ids of `items` as given.
    pub fn replace_all(&self, items: Vec<T>) -> Result<()> {
        self.modify(
            |list| {
                *list = items.clone();
                Ok(())
            },
            |map, _| {
                map.clear();
                map.extend(items.iter().map(|i| (i.id(), i.clone())));
            },
        )
    }

    pub fn get(&self, id: i64) -> Result<T> {
        self.items_read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::ItemNotFound(id))
    }

    /// Items matching `predicate`, in id order.
    pub fn get_list(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        let mut items: Vec<T> = self
            .items_read()
            .values()
            .filter(|item| predicate(item))
            .cloned()
            .collect();
        items.sort_by_key(|i| i.id());
        items
    }

    pub fn get_all(&self) -> Vec<T> {
        self.get_list(|_| true)
    }

    /// All items sorted by `sort_by` (`id`, `creationDate`, `modificationDate`).
    /// Unknown fields leave id order; `sort_order` other than `asc` is descending.
    pub fn get_all_sorted(&self, sort_by: &str, sort_order: &str) -> Vec<T> {
        self.get_sorted_list(|_| true, sort_by, sort_order)
    }

    pub fn get_sorted_list(
        &self,
        predicate: impl Fn(&T) -> bool,
        sort_by: &str,
        sort_order: &str,
    ) -> Vec<T> {
        let mut items = self.get_list(predicate);
        if let Some(field) = ItemSortField::parse(sort_by) {
            sort_items(&mut items, field, SortOrder::parse(sort_order));
        }
        items
    }

    pub fn len(&self) -> usize {
        self.items_read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items_read().is_empty()
    }

    /// Update the denormalized count held in memory. The file is not rewritten.
    pub fn set_count(&self, id: i64, count: usize) {
        if let Some(item) = self.items_write().get_mut(&id) {
            item.set_count(count);
        }
    }

    pub fn set_item_assets(&self, id: i64, assets: Vec<Asset>) {
        self.item_assets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, assets);
    }

    pub fn item_assets(&self, id: i64) -> Vec<Asset> {
        self.item_assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Stable sort of collection items.
pub fn sort_items<T: CollectionItem>(items: &mut [T], field: ItemSortField, order: SortOrder) {
    items.sort_by(|a, b| {
        let ordering = match field {
            ItemSortField::Id => a.id().cmp(&b.id()),
            ItemSortField::CreationDate => a.creation_date().cmp(&b.creation_date()),
            ItemSortField::ModificationDate => a.modification_date().cmp(&b.modification_date()),
        };
        order.apply(ordering)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Album, Trip};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn album(name: &str) -> Album {
        Album {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_delete_then_sorted() {
        let dir = tempdir().unwrap();
        let registry = CollectionRegistry::<Album>::open(dir.path().join("albums.json")).unwrap();

        assert_eq!(registry.create(album("Summer")).unwrap().id, 1);
        assert_eq!(registry.create(album("Winter")).unwrap().id, 2);
        registry.delete(1).unwrap();

        let all = registry.get_all_sorted("id", "asc");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, 2);
        assert_eq!(all[0].name, "Winter");
    }

    #[test]
    fn test_reopen_matches_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trips.json");
        let registry = CollectionRegistry::<Trip>::open(&path).unwrap();
        registry
            .create(Trip {
                name: "Coast".to_string(),
                ..Default::default()
            })
            .unwrap();
        let mut trip = registry
            .create(Trip {
                name: "Alps".to_string(),
                ..Default::default()
            })
            .unwrap();
        trip.trip_type = "hiking".to_string();
        registry.update(trip).unwrap();

        let reopened = CollectionRegistry::<Trip>::open(&path).unwrap();
        assert_eq!(reopened.get_all(), registry.get_all());
        assert_eq!(reopened.get(2).unwrap().trip_type, "hiking");
    }

    #[test]
    fn test_update_and_delete_missing() {
        let dir = tempdir().unwrap();
        let registry = CollectionRegistry::<Album>::open(dir.path().join("albums.json")).unwrap();

        let mut ghost = album("Ghost");
        ghost.id = 9;
        assert!(matches!(registry.update(ghost), Err(StoreError::ItemNotFound(9))));
        assert!(matches!(registry.delete(9), Err(StoreError::ItemNotFound(9))));
        assert!(registry.get(9).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_stamps_modification_only() {
        let dir = tempdir().unwrap();
        let registry = CollectionRegistry::<Album>::open(dir.path().join("albums.json")).unwrap();
        let created = registry.create(album("A")).unwrap();

        let mut changed = created.clone();
        changed.name = "B".to_string();
        let updated = registry.update(changed).unwrap();

        assert_eq!(updated.creation_date, created.creation_date);
        assert!(updated.modification_date >= created.modification_date);
        assert_eq!(registry.get(created.id).unwrap().name, "B");
    }

    #[test]
    fn test_concurrent_creates_get_unique_ids() {
        let dir = tempdir().unwrap();
        let registry =
            Arc::new(CollectionRegistry::<Album>::open(dir.path().join("albums.json")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..5)
                        .map(|i| registry.create(album(&format!("{}-{}", t, i))).unwrap().id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=40).collect::<Vec<_>>());

        let reopened = CollectionRegistry::<Album>::open(registry.path()).unwrap();
        assert_eq!(reopened.len(), 40);
    }

    #[test]
    fn test_racing_update_and_delete_keep_memory_in_line_with_file() {
        let dir = tempdir().unwrap();
        let registry =
            Arc::new(CollectionRegistry::<Album>::open(dir.path().join("albums.json")).unwrap());

        for round in 0..50 {
            let created = registry.create(album(&format!("round-{}", round))).unwrap();
            let barrier = Arc::new(std::sync::Barrier::new(3));

            let updater = {
                let (registry, barrier) = (Arc::clone(&registry), Arc::clone(&barrier));
                let mut changed = created.clone();
                changed.name = "renamed".to_string();
                std::thread::spawn(move || {
                    barrier.wait();
                    let _ = registry.update(changed);
                })
            };
            let renamer = {
                let (registry, barrier) = (Arc::clone(&registry), Arc::clone(&barrier));
                let mut changed = created.clone();
                changed.name = "other".to_string();
                std::thread::spawn(move || {
                    barrier.wait();
                    let _ = registry.update(changed);
                })
            };
            barrier.wait();
            if round % 2 == 0 {
                let _ = registry.delete(created.id);
            }
            updater.join().unwrap();
            renamer.join().unwrap();

            let on_disk = CollectionRegistry::<Album>::open(registry.path()).unwrap();
            assert_eq!(registry.get_all(), on_disk.get_all(), "round {}", round);
        }
    }

    #[test]
    fn test_sorted_list_and_unknown_field() {
        let dir = tempdir().unwrap();
        let registry = CollectionRegistry::<Album>::open(dir.path().join("albums.json")).unwrap();
        for name in ["a", "b", "c"] {
            registry.create(album(name)).unwrap();
        }
        let mut hidden = registry.get(2).unwrap();
        hidden.is_hidden = true;
        registry.update(hidden).unwrap();

        let desc: Vec<i64> = registry.get_all_sorted("id", "desc").iter().map(|a| a.id).collect();
        assert_eq!(desc, vec![3, 2, 1]);

        let unknown: Vec<i64> = registry.get_all_sorted("name", "asc").iter().map(|a| a.id).collect();
        assert_eq!(unknown, vec![1, 2, 3]);

        let visible = registry.get_sorted_list(|a| !a.is_hidden, "modificationDate", "asc");
        assert_eq!(visible.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("albums.json");
        std::fs::write(&path, b"[{").unwrap();
        assert!(matches!(
            CollectionRegistry::<Album>::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_item_assets_and_counts() {
        let dir = tempdir().unwrap();
        let registry = CollectionRegistry::<Album>::open(dir.path().join("albums.json")).unwrap();
        let created = registry.create(album("A")).unwrap();

        registry.set_count(created.id, 3);
        registry.set_item_assets(
            created.id,
            vec![Asset {
                id: 11,
                ..Default::default()
            }],
        );

        assert_eq!(registry.get(created.id).unwrap().count, 3);
        assert_eq!(registry.item_assets(created.id).len(), 1);
        assert!(registry.item_assets(99).is_empty());

        registry.delete(created.id).unwrap();
        assert!(registry.item_assets(created.id).is_empty());
    }
}
