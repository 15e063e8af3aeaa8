use image::ImageFormat;
use std::fs;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::atomic;
use crate::error::{Result, StoreError};

/// Manages thumbnail files for one owner's assets.
///
/// Files are named `<asset id>_<width>x<height>.jpg`.
pub struct ThumbnailStore {
    dir: PathBuf,
    size: u32,
}

impl ThumbnailStore {
    pub fn new(dir: impl Into<PathBuf>, size: u32) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(Self { dir, size })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of a thumbnail, relative to the thumbnail directory.
    pub fn file_name(id: i64, width: u32, height: u32) -> String {
        format!("{}_{}x{}.jpg", id, width, height)
    }

    pub fn path_for(&self, id: i64, width: u32, height: u32) -> PathBuf {
        self.dir.join(Self::file_name(id, width, height))
    }

    pub fn has_cached(&self, id: i64, width: u32, height: u32) -> bool {
        self.path_for(id, width, height).exists()
    }

    pub fn save(&self, id: i64, width: u32, height: u32, data: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(id, width, height);
        atomic::write_bytes(&path, data)?;
        Ok(path)
    }

    pub fn load(&self, id: i64, width: u32, height: u32) -> Result<Vec<u8>> {
        let path = self.path_for(id, width, height);
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::not_found("thumbnail", Self::file_name(id, width, height)))
            }
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Generate the default-size thumbnail for an asset file, unless it exists.
    /// Returns the relative file name of the thumbnail.
    pub fn generate(&self, id: i64, original: &Path) -> Result<String> {
        let name = Self::file_name(id, self.size, self.size);
        if self.dir.join(&name).exists() {
            return Ok(name);
        }

        let img = image::open(original).map_err(|e| {
            StoreError::Unsupported(format!("{}: {}", original.display(), e))
        })?;
        let thumbnail = img.thumbnail(self.size, self.size).into_rgb8();

        let mut buf = Cursor::new(Vec::new());
        thumbnail
            .write_to(&mut buf, ImageFormat::Jpeg)
            .map_err(|e| StoreError::Unsupported(e.to_string()))?;

        self.save(id, self.size, self.size, buf.get_ref())?;
        Ok(name)
    }

    /// Relative file names of every thumbnail belonging to `id`.
    pub fn file_names(&self, id: i64) -> Vec<String> {
        let prefix = format!("{}_", id);
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        entries
            .flatten()
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| name.starts_with(&prefix) && name.ends_with(".jpg"))
            .collect()
    }

    /// Delete every thumbnail of an asset. Returns the removed file names.
    pub fn delete_all(&self, id: i64) -> Result<Vec<String>> {
        let names = self.file_names(id);
        for name in &names {
            let path = self.dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => debug!(asset_id = id, file = %name, "Deleted thumbnail"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
        Ok(names)
    }
}
