//! Storage categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A top-level storage partition. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Gallery,
    History,
}

impl Category {
    /// Every known category, in bootstrap and migration order.
    pub const ALL: [Category; 2] = [Category::Gallery, Category::History];

    /// Directory name under the storage root (also the URL prefix).
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Gallery => "gallery",
            Category::History => "history",
        }
    }

    /// Well-known subfolders created at startup.
    pub fn default_subfolders(&self) -> &'static [&'static str] {
        match self {
            Category::Gallery => &["upload", "outputs", "image_editor", "extra"],
            Category::History => &["upload"],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gallery" => Ok(Category::Gallery),
            "history" => Ok(Category::History),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_categories() {
        assert_eq!("gallery".parse::<Category>(), Ok(Category::Gallery));
        assert_eq!("history".parse::<Category>(), Ok(Category::History));
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("Gallery".parse::<Category>().is_err());
        assert!("HISTORY".parse::<Category>().is_err());
    }

    #[test]
    fn test_parse_rejects_traversal() {
        let err = "../etc".parse::<Category>().unwrap_err();
        assert_eq!(err.0, "../etc");
        assert!("".parse::<Category>().is_err());
        assert!("gallery/".parse::<Category>().is_err());
    }

    #[test]
    fn test_unknown_category_message() {
        let err = "thumbnails".parse::<Category>().unwrap_err();
        assert_eq!(err.to_string(), "unknown category: thumbnails");

        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        assert_eq!(boxed.to_string(), "unknown category: thumbnails");
    }

    #[test]
    fn test_display_matches_directory_name() {
        for category in Category::ALL {
            assert_eq!(category.to_string(), category.as_str());
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Category::History).unwrap();
        assert_eq!(json, "\"history\"");
    }
}
