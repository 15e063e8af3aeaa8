//! Collection item kinds managed by the generic registry.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::Asset;

/// Capabilities the registry needs from every item it stores.
pub trait CollectionItem: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn creation_date(&self) -> DateTime<Utc>;
    fn modification_date(&self) -> DateTime<Utc>;
    fn set_creation_date(&mut self, at: DateTime<Utc>);
    fn set_modification_date(&mut self, at: DateTime<Utc>);
    /// Denormalized number of assets in this item.
    fn set_count(&mut self, count: usize);
}

macro_rules! impl_collection_item {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl CollectionItem for $ty {
                fn id(&self) -> i64 {
                    self.id
                }
                fn set_id(&mut self, id: i64) {
                    self.id = id;
                }
                fn creation_date(&self) -> DateTime<Utc> {
                    self.creation_date
                }
                fn modification_date(&self) -> DateTime<Utc> {
                    self.modification_date
                }
                fn set_creation_date(&mut self, at: DateTime<Utc>) {
                    self.creation_date = at;
                }
                fn set_modification_date(&mut self, at: DateTime<Utc>) {
                    self.modification_date = at;
                }
                fn set_count(&mut self, count: usize) {
                    self.count = count;
                }
            }
        )+
    };
}

/// A user album.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Album {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub album_type: String,
    pub count: usize,
    pub is_collection: bool,
    pub is_hidden: bool,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

/// An album shared with other users.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedAlbum {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub album_type: String,
    pub count: usize,
    pub is_collection: bool,
    pub is_hidden: bool,
    pub members: Vec<i64>,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trip {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub trip_type: String,
    pub count: usize,
    pub is_collection: bool,
    pub is_hidden: bool,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

/// A person recognized in the library.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub person_type: String,
    pub count: usize,
    pub is_collection: bool,
    pub is_hidden: bool,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

/// A pinned shortcut shown at the top of the library.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pinned {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pinned_type: String,
    pub count: usize,
    pub is_collection: bool,
    pub is_hidden: bool,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

/// A camera seen in the library's asset metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Camera {
    pub id: i64,
    pub camera_make: String,
    pub camera_model: String,
    pub count: usize,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
}

impl_collection_item!(Album, SharedAlbum, Trip, Person, Pinned, Camera);

/// An item together with a preview of its newest assets.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionPreview<T> {
    pub item: T,
    pub assets: Vec<Asset>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_trait_roundtrip() {
        let mut album = Album {
            name: "Summer".to_string(),
            ..Default::default()
        };
        album.set_id(7);
        album.set_count(3);
        assert_eq!(album.id(), 7);
        assert_eq!(album.count, 3);
    }

    #[test]
    fn test_empty_type_tag_is_omitted() {
        let trip = Trip {
            id: 1,
            name: "Rome".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&trip).unwrap();
        assert!(json.get("tripType").is_none());
        assert_eq!(json["isCollection"], false);
    }

    #[test]
    fn test_person_type_tag() {
        let mut person = Person {
            id: 2,
            name: "Sara".to_string(),
            ..Default::default()
        };
        assert!(serde_json::to_value(&person).unwrap().get("personType").is_none());

        person.person_type = "family".to_string();
        let json = serde_json::to_value(&person).unwrap();
        assert_eq!(json["personType"], "family");
        assert_eq!(serde_json::from_value::<Person>(json).unwrap(), person);
    }
}
