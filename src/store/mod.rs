//! Flat-file persistence: asset records, thumbnails and the atomic write helpers
//! everything else is built on.

pub mod atomic;
pub mod records;
pub mod thumbnails;

pub use records::RecordStore;
pub use thumbnails::ThumbnailStore;
