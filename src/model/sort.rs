//! Sort keys shared by the query engine and the collection registry.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `"asc"` is ascending; any other value sorts descending.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Fields collection items can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemSortField {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "creationDate")]
    CreationDate,
    #[serde(rename = "modificationDate")]
    ModificationDate,
}

impl ItemSortField {
    /// Unknown or empty names yield `None`, meaning "keep the current order".
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(ItemSortField::Id),
            "creationDate" => Some(ItemSortField::CreationDate),
            "modificationDate" => Some(ItemSortField::ModificationDate),
            _ => None,
        }
    }
}

/// Fields assets can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetSortField {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "creationDate")]
    CreationDate,
    #[serde(rename = "modificationDate")]
    ModificationDate,
    #[serde(rename = "filename")]
    Filename,
}

impl AssetSortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(AssetSortField::Id),
            "creationDate" => Some(AssetSortField::CreationDate),
            "modificationDate" => Some(AssetSortField::ModificationDate),
            "filename" => Some(AssetSortField::Filename),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("ASC"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("whatever"), SortOrder::Desc);
    }

    #[test]
    fn test_unknown_field_is_none() {
        assert_eq!(ItemSortField::parse("name"), None);
        assert_eq!(AssetSortField::parse(""), None);
        assert_eq!(AssetSortField::parse("filename"), Some(AssetSortField::Filename));
    }
}
