pub mod asset;
pub mod collection;
pub mod filter;
pub mod sort;

pub use asset::{Asset, AssetUpdate, MediaType};
pub use collection::{
    Album, Camera, CollectionItem, CollectionPreview, Person, Pinned, SharedAlbum, Trip,
};
pub use filter::{AssetFilter, Page};
pub use sort::{AssetSortField, ItemSortField, SortOrder};
