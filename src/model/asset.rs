//! Asset records and partial updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of media stored for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "video/mp4")]
    Mp4,
    #[serde(rename = "video/quicktime")]
    QuickTime,
    #[default]
    #[serde(rename = "unknown", other)]
    Unknown,
}

impl MediaType {
    /// Guess the media type from a file extension (with or without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "jpg" | "jpeg" => MediaType::Jpeg,
            "png" => MediaType::Png,
            "gif" => MediaType::Gif,
            "mp4" => MediaType::Mp4,
            "mov" => MediaType::QuickTime,
            _ => MediaType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Mp4 => "video/mp4",
            MediaType::QuickTime => "video/quicktime",
            MediaType::Unknown => "unknown",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaType::Mp4 | MediaType::QuickTime)
    }
}

/// Persisted metadata for a single photo or video.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Asset {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    /// Lower-case file extension of the stored binary, without the dot.
    pub format: String,
    pub media_type: MediaType,
    pub orientation: i32,

    pub pixel_width: u32,
    pub pixel_height: u32,

    pub camera_make: String,
    pub camera_model: String,
    /// `[latitude, longitude]` in decimal degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<[f64; 2]>,

    pub is_camera: bool,
    pub is_favorite: bool,
    pub is_screenshot: bool,
    pub is_hidden: bool,

    pub albums: Vec<i64>,
    pub trips: Vec<i64>,
    pub persons: Vec<i64>,

    /// Seconds, videos only.
    pub duration: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_date: Option<DateTime<Utc>>,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

impl Asset {
    /// Name of the binary under the owner's assets directory: `<id>.<format>`.
    pub fn content_file_name(&self) -> String {
        if self.format.is_empty() {
            self.id.to_string()
        } else {
            format!("{}.{}", self.id, self.format)
        }
    }

    pub fn is_landscape(&self) -> bool {
        self.pixel_width > self.pixel_height
    }

    /// Key used by the camera index: the model, or the make when no model is recorded.
    pub fn camera_key(&self) -> Option<&str> {
        if !self.camera_model.is_empty() {
            Some(&self.camera_model)
        } else if !self.camera_make.is_empty() {
            Some(&self.camera_make)
        } else {
            None
        }
    }
}

/// Partial update applied to one or more assets.
///
/// Scalars are replaced only when present. For each membership list a full
/// replacement takes precedence over the add/remove sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetUpdate {
    pub asset_ids: Vec<i64>,

    pub filename: Option<String>,
    pub media_type: Option<MediaType>,

    pub camera_make: Option<String>,
    pub camera_model: Option<String>,

    pub is_camera: Option<bool>,
    pub is_favorite: Option<bool>,
    pub is_screenshot: Option<bool>,
    pub is_hidden: Option<bool>,

    pub albums: Option<Vec<i64>>,
    pub add_albums: Vec<i64>,
    pub remove_albums: Vec<i64>,

    pub trips: Option<Vec<i64>>,
    pub add_trips: Vec<i64>,
    pub remove_trips: Vec<i64>,

    pub persons: Option<Vec<i64>>,
    pub add_persons: Vec<i64>,
    pub remove_persons: Vec<i64>,
}

impl AssetUpdate {
    /// Apply the update to `asset` in place. Does not touch timestamps.
    pub fn apply(&self, asset: &mut Asset) {
        if let Some(ref filename) = self.filename {
            asset.filename = filename.clone();
        }
        if let Some(media_type) = self.media_type {
            asset.media_type = media_type;
        }
        if let Some(ref make) = self.camera_make {
            asset.camera_make = make.clone();
        }
        if let Some(ref model) = self.camera_model {
            asset.camera_model = model.clone();
        }
        if let Some(v) = self.is_camera {
            asset.is_camera = v;
        }
        if let Some(v) = self.is_favorite {
            asset.is_favorite = v;
        }
        if let Some(v) = self.is_screenshot {
            asset.is_screenshot = v;
        }
        if let Some(v) = self.is_hidden {
            asset.is_hidden = v;
        }

        apply_membership(&mut asset.albums, &self.albums, &self.add_albums, &self.remove_albums);
        apply_membership(&mut asset.trips, &self.trips, &self.add_trips, &self.remove_trips);
        apply_membership(&mut asset.persons, &self.persons, &self.add_persons, &self.remove_persons);
    }
}

fn apply_membership(current: &mut Vec<i64>, replace: &Option<Vec<i64>>, add: &[i64], remove: &[i64]) {
    if let Some(ids) = replace {
        *current = ids.clone();
        return;
    }

    for id in add {
        if !current.contains(id) {
            current.push(*id);
        }
    }
    if !remove.is_empty() {
        current.retain(|id| !remove.contains(id));
    }
}
