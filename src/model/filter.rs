//! Asset search requests and paged results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MediaType;

/// Criteria for an asset search.
///
/// `None`/empty fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetFilter {
    pub user_id: i64,
    /// Whitespace separated words; every word must match (AND).
    pub query: String,
    pub media_type: Option<MediaType>,
    pub pixel_width: u32,
    pub pixel_height: u32,

    pub camera_make: String,
    pub camera_model: String,

    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    pub is_camera: Option<bool>,
    pub is_favorite: Option<bool>,
    pub is_screenshot: Option<bool>,
    pub is_hidden: Option<bool>,
    pub is_landscape: Option<bool>,
    /// When `Some(true)`, only assets that belong to no album match.
    pub not_in_one_album: Option<bool>,
    /// When `Some(false)`, screenshots are excluded.
    pub hide_screenshot: Option<bool>,

    pub albums: Vec<i64>,
    pub trips: Vec<i64>,
    pub persons: Vec<i64>,

    /// `[latitude, longitude]`, used together with `within_radius` (km).
    pub near_point: Option<[f64; 2]>,
    pub within_radius: f64,
    /// `[min_lat, min_lon, max_lat, max_lon]`.
    pub bounding_box: Option<[f64; 4]>,

    pub sort_by: String,
    pub sort_order: String,

    pub fetch_offset: i64,
    pub fetch_limit: i64,
}

impl AssetFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
}
