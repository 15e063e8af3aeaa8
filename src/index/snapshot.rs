//! The inverted maps of the asset index and their serialized form.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::Asset;

/// Words shorter than this are not indexed.
const MIN_TOKEN_LEN: usize = 3;

/// All lookup maps plus the id counter. This struct is also the on-disk
/// snapshot format.
///
/// Posting lists are kept sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexMaps {
    pub last_id: i64,
    /// id → stored file name under the assets directory.
    pub files: HashMap<i64, String>,
    pub owners: HashMap<i64, Vec<i64>>,
    /// `YYYY-MM-DD` of the creation date → ids.
    pub dates: HashMap<String, Vec<i64>>,
    pub tokens: HashMap<String, Vec<i64>>,
    pub media_types: HashMap<String, Vec<i64>>,
    pub cameras: HashMap<String, Vec<i64>>,
    pub favorites: HashMap<i64, bool>,
    pub hidden: HashMap<i64, bool>,
    pub screenshots: HashMap<i64, bool>,
}

fn insert_posting<K>(map: &mut HashMap<K, Vec<i64>>, key: K, id: i64)
where
    K: std::hash::Hash + Eq,
{
    let list = map.entry(key).or_default();
    if let Err(pos) = list.binary_search(&id) {
        list.insert(pos, id);
    }
}

fn remove_posting<K>(map: &mut HashMap<K, Vec<i64>>, id: i64) {
    map.retain(|_, list| {
        list.retain(|&x| x != id);
        !list.is_empty()
    });
}

impl IndexMaps {
    pub fn contains(&self, id: i64) -> bool {
        self.files.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn add(&mut self, asset: &Asset) {
        let id = asset.id;
        self.files.insert(id, asset.content_file_name());
        insert_posting(&mut self.owners, asset.user_id, id);
        insert_posting(
            &mut self.dates,
            asset.creation_date.format("%Y-%m-%d").to_string(),
            id,
        );
        for token in tokenize(&asset.filename) {
            insert_posting(&mut self.tokens, token, id);
        }
        insert_posting(&mut self.media_types, asset.media_type.as_str().to_string(), id);
        if let Some(camera) = asset.camera_key() {
            insert_posting(&mut self.cameras, camera.to_string(), id);
        }
        self.favorites.insert(id, asset.is_favorite);
        self.hidden.insert(id, asset.is_hidden);
        self.screenshots.insert(id, asset.is_screenshot);

        if id > self.last_id {
            self.last_id = id;
        }
    }

    /// Drop `id` from every map. Posting lists left empty are removed.
    pub fn remove(&mut self, id: i64) -> bool {
        let present = self.files.remove(&id).is_some();
        remove_posting(&mut self.owners, id);
        remove_posting(&mut self.dates, id);
        remove_posting(&mut self.tokens, id);
        remove_posting(&mut self.media_types, id);
        remove_posting(&mut self.cameras, id);
        self.favorites.remove(&id);
        self.hidden.remove(&id);
        self.screenshots.remove(&id);
        present
    }

    /// Everything but the id counter.
    pub fn clear(&mut self) {
        let last_id = self.last_id;
        *self = Self {
            last_id,
            ..Default::default()
        };
    }
}

/// Lower-cased words of a filename used by the text index.
///
/// Words are split on whitespace and on `_`, `-` and `.`; words shorter than
/// three characters are dropped. The result is deduplicated.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = text
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-' || c == '.')
        .filter(|w| w.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaType;
    use chrono::{TimeZone, Utc};

    fn asset(id: i64, filename: &str) -> Asset {
        Asset {
            id,
            user_id: 4,
            filename: filename.to_string(),
            format: "jpg".to_string(),
            media_type: MediaType::Jpeg,
            camera_make: "Canon".to_string(),
            creation_date: Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Beach_Sunset-2024.final.JPG"),
            vec!["2024", "beach", "final", "jpg", "sunset"]
        );
        assert_eq!(tokenize("a b  c"), Vec::<String>::new());
        assert_eq!(tokenize("cat cat dog"), vec!["cat", "dog"]);
    }

    #[test]
    fn test_add_and_remove() {
        let mut maps = IndexMaps::default();
        maps.add(&asset(2, "beach day.jpg"));
        maps.add(&asset(1, "beach night.jpg"));

        assert_eq!(maps.tokens["beach"], vec![1, 2]);
        assert_eq!(maps.dates["2024-03-09"], vec![1, 2]);
        assert_eq!(maps.cameras["Canon"], vec![1, 2]);
        assert_eq!(maps.files[&2], "2.jpg");
        assert_eq!(maps.last_id, 2);

        assert!(maps.remove(2));
        assert!(!maps.tokens.contains_key("day"));
        assert_eq!(maps.tokens["beach"], vec![1]);
        assert!(!maps.remove(2));

        assert!(maps.remove(1));
        assert!(maps.owners.is_empty());
        assert!(maps.media_types.is_empty());
        assert_eq!(maps.last_id, 2);
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let mut maps = IndexMaps::default();
        maps.add(&asset(5, "holiday.jpg"));

        let json = serde_json::to_string(&maps).unwrap();
        let back: IndexMaps = serde_json::from_str(&json).unwrap();
        assert_eq!(back, maps);
    }
}
