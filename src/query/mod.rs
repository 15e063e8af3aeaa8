//! Asset search: narrow candidates through the index, materialize records,
//! apply residual predicates, then sort and paginate.

pub mod geo;

use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::index::{tokenize, AssetIndex, IndexMaps};
use crate::model::{Asset, AssetFilter, AssetSortField, Page, SortOrder};
use crate::store::RecordStore;

/// Run `filter` against one owner's index and records.
pub fn search(index: &AssetIndex, records: &RecordStore, filter: &AssetFilter) -> Page<Asset> {
    let ids = index.read(|maps| candidates(maps, filter));
    debug!(candidates = ids.len(), "Index narrowed search");

    let mut assets: Vec<Asset> = ids
        .par_iter()
        .filter_map(|&id| match records.load(id) {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!(asset_id = id, error = %e, "Skipping unloadable record during search");
                None
            }
        })
        .filter(|asset| matches(asset, filter))
        .collect();

    if let Some(field) = AssetSortField::parse(&filter.sort_by) {
        sort_assets(&mut assets, field, SortOrder::parse(&filter.sort_order));
    }

    let total = assets.len();
    let items = paginate(assets, filter.fetch_offset, filter.fetch_limit);
    Page {
        items,
        total,
        limit: filter.fetch_limit,
        offset: filter.fetch_offset,
    }
}

/// Ids that survive the index-backed predicates, ascending.
///
/// Multi-word queries are an AND: an id must appear in the posting list of
/// every query word.
pub fn candidates(maps: &IndexMaps, filter: &AssetFilter) -> Vec<i64> {
    let mut ids: Vec<i64> = if filter.user_id != 0 {
        maps.owners.get(&filter.user_id).cloned().unwrap_or_default()
    } else {
        let mut all: Vec<i64> = maps.files.keys().copied().collect();
        all.sort_unstable();
        all
    };

    for token in tokenize(&filter.query) {
        let posting: HashSet<i64> = maps
            .tokens
            .get(&token)
            .map(|list| list.iter().copied().collect())
            .unwrap_or_default();
        ids.retain(|id| posting.contains(id));
    }

    if let Some(media_type) = filter.media_type {
        let posting: HashSet<i64> = maps
            .media_types
            .get(media_type.as_str())
            .map(|list| list.iter().copied().collect())
            .unwrap_or_default();
        ids.retain(|id| posting.contains(id));
    }

    if !filter.camera_model.is_empty() {
        let posting: HashSet<i64> = maps
            .cameras
            .get(&filter.camera_model)
            .map(|list| list.iter().copied().collect())
            .unwrap_or_default();
        ids.retain(|id| posting.contains(id));
    }

    if let Some(want) = filter.is_favorite {
        ids.retain(|id| maps.favorites.get(id).copied().unwrap_or(false) == want);
    }
    if let Some(want) = filter.is_hidden {
        ids.retain(|id| maps.hidden.get(id).copied().unwrap_or(false) == want);
    }
    if let Some(want) = filter.is_screenshot {
        ids.retain(|id| maps.screenshots.get(id).copied().unwrap_or(false) == want);
    }

    ids
}

/// Full predicate check of one record.
pub fn matches(asset: &Asset, filter: &AssetFilter) -> bool {
    if filter.user_id != 0 && asset.user_id != filter.user_id {
        return false;
    }

    let query = filter.query.trim();
    if !query.is_empty() {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            if !asset.filename.to_lowercase().contains(&query.to_lowercase()) {
                return false;
            }
        } else {
            let own = tokenize(&asset.filename);
            if !tokens.iter().all(|t| own.contains(t)) {
                return false;
            }
        }
    }

    if let Some(media_type) = filter.media_type {
        if asset.media_type != media_type {
            return false;
        }
    }
    if !filter.camera_make.is_empty() && asset.camera_make != filter.camera_make {
        return false;
    }
    if !filter.camera_model.is_empty() && asset.camera_model != filter.camera_model {
        return false;
    }

    if let Some(start) = filter.start_date {
        if asset.creation_date < start {
            return false;
        }
    }
    if let Some(end) = filter.end_date {
        if asset.creation_date > end {
            return false;
        }
    }

    let flags = [
        (filter.is_camera, asset.is_camera),
        (filter.is_favorite, asset.is_favorite),
        (filter.is_screenshot, asset.is_screenshot),
        (filter.is_hidden, asset.is_hidden),
        (filter.is_landscape, asset.is_landscape()),
        (filter.not_in_one_album, asset.albums.is_empty()),
    ];
    if flags
        .iter()
        .any(|(want, actual)| want.is_some_and(|w| w != *actual))
    {
        return false;
    }
    if filter.hide_screenshot == Some(false) && asset.is_screenshot {
        return false;
    }

    if filter.pixel_width != 0 && asset.pixel_width != filter.pixel_width {
        return false;
    }
    if filter.pixel_height != 0 && asset.pixel_height != filter.pixel_height {
        return false;
    }

    if !any_of(&filter.albums, &asset.albums)
        || !any_of(&filter.trips, &asset.trips)
        || !any_of(&filter.persons, &asset.persons)
    {
        return false;
    }

    matches_location(asset, filter)
}

/// An empty `wanted` list does not constrain.
fn any_of(wanted: &[i64], have: &[i64]) -> bool {
    wanted.is_empty() || wanted.iter().any(|id| have.contains(id))
}

fn matches_location(asset: &Asset, filter: &AssetFilter) -> bool {
    let near = filter.near_point.filter(|_| filter.within_radius > 0.0);
    if near.is_none() && filter.bounding_box.is_none() {
        return true;
    }

    let Some(location) = asset.location else {
        return false;
    };

    if let Some(point) = near {
        if geo::haversine_km(point, location) > filter.within_radius {
            return false;
        }
    }
    if let Some(bbox) = filter.bounding_box {
        if !geo::in_bounding_box(location, bbox) {
            return false;
        }
    }
    true
}

/// Stable sort of assets.
pub fn sort_assets(assets: &mut [Asset], field: AssetSortField, order: SortOrder) {
    assets.sort_by(|a, b| {
        let ordering: Ordering = match field {
            AssetSortField::Id => a.id.cmp(&b.id),
            AssetSortField::CreationDate => a.creation_date.cmp(&b.creation_date),
            AssetSortField::ModificationDate => a.modification_date.cmp(&b.modification_date),
            AssetSortField::Filename => a.filename.cmp(&b.filename),
        };
        order.apply(ordering)
    });
}

/// Slice `items` to one page. The offset is clamped into `[0, len]`; a limit
/// of zero or less means "everything after the offset".
pub fn paginate<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    let len = items.len();
    let start = usize::try_from(offset.max(0)).unwrap_or(usize::MAX).min(len);
    let end = if limit <= 0 {
        len
    } else {
        start
            .saturating_add(usize::try_from(limit).unwrap_or(usize::MAX))
            .min(len)
    };

    items.into_iter().skip(start).take(end - start).collect()
}
