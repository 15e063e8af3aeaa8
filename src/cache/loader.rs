//! Miss-path loaders for the object cache: network, local disk, and reserved
//! synthetic prefixes.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Upper bound for a downloaded payload.
const MAX_NETWORK_BYTES: u64 = 64 * 1024 * 1024;

const JPEG_QUALITY: u8 = 85;

/// Prefixes reserved for generated content.
const SYNTHETIC_PREFIXES: [&str; 2] = ["gen:", "placeholder:"];

/// Where a cache key's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Network(String),
    Synthetic(String),
    Local(PathBuf),
}

/// Bytes produced by a loader, with the size read before any transcoding.
#[derive(Debug)]
pub struct Loaded {
    pub data: Vec<u8>,
    pub original_size: u64,
}

#[derive(Clone)]
pub struct SourceLoader {
    base_dir: Option<PathBuf>,
    agent: ureq::Agent,
}

impl SourceLoader {
    pub fn new(base_dir: Option<PathBuf>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { base_dir, agent }
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Pick the source for a key by its shape.
    ///
    /// Local keys must stay inside the base directory: absolute paths and
    /// `..` components are rejected.
    pub fn classify(&self, key: &str) -> Result<Source> {
        if key.starts_with("http://") || key.starts_with("https://") {
            return Ok(Source::Network(key.to_string()));
        }
        if SYNTHETIC_PREFIXES.iter().any(|p| key.starts_with(p)) {
            return Ok(Source::Synthetic(key.to_string()));
        }
        if !is_contained(Path::new(key)) {
            return Err(StoreError::Unsupported(format!(
                "key escapes the cache directory: {}",
                key
            )));
        }
        Ok(match self.base_dir {
            Some(ref base) => Source::Local(base.join(key)),
            None => Source::Local(PathBuf::from(key)),
        })
    }

    /// Blocking load of `source`.
    pub fn load(&self, source: &Source) -> Result<Loaded> {
        match source {
            Source::Network(url) => self.fetch(url),
            Source::Local(path) => read_local(path),
            Source::Synthetic(key) => Err(StoreError::Unsupported(format!(
                "no generator for synthetic key {}",
                key
            ))),
        }
    }

    fn fetch(&self, url: &str) -> Result<Loaded> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, resp) => {
                StoreError::Network(format!("HTTP {}: {}", code, resp.status_text()))
            }
            other => StoreError::Network(other.to_string()),
        })?;

        if response.status() != 200 {
            return Err(StoreError::Network(format!(
                "HTTP {}: {}",
                response.status(),
                response.status_text()
            )));
        }

        let mut data = Vec::new();
        response
            .into_reader()
            .take(MAX_NETWORK_BYTES)
            .read_to_end(&mut data)
            .map_err(|e| StoreError::Network(format!("read error from {}: {}", url, e)))?;

        detect_format(&data).map_err(|e| match e {
            StoreError::Unsupported(msg) => {
                StoreError::Unsupported(format!("invalid image from {}: {}", url, msg))
            }
            other => other,
        })?;

        let original_size = data.len() as u64;
        Ok(Loaded { data, original_size })
    }
}

fn is_contained(relative: &Path) -> bool {
    relative.components().next().is_some()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Read an image from disk, transcoding anything but JPEG/PNG to JPEG.
pub fn read_local(path: &Path) -> Result<Loaded> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::not_found("file", path.display()))
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };
    let original_size = data.len() as u64;

    let format = detect_format(&data).map_err(|e| match e {
        StoreError::Unsupported(msg) => {
            StoreError::Unsupported(format!("invalid image format for {}: {}", path.display(), msg))
        }
        other => other,
    })?;

    let data = match format {
        ImageFormat::Jpeg | ImageFormat::Png => data,
        _ => transcode_to_jpeg(&data)?,
    };

    Ok(Loaded {
        data,
        original_size,
    })
}

/// Check the payload has a decodable image header and return its format.
pub fn detect_format(data: &[u8]) -> Result<ImageFormat> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| StoreError::Unsupported(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| StoreError::Unsupported("unrecognized image format".to_string()))?;
    reader
        .into_dimensions()
        .map_err(|e| StoreError::Unsupported(e.to_string()))?;
    Ok(format)
}

pub fn transcode_to_jpeg(data: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data).map_err(|e| StoreError::Unsupported(e.to_string()))?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))
        .map_err(|e| StoreError::Unsupported(e.to_string()))?;
    Ok(buf)
}
