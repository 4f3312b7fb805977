//! Records describing stored image files.

use serde::Serialize;

use super::Category;

/// A file written by an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub category: Category,
    /// Sanitized subfolder, empty for the category root.
    pub subfolder: String,
    pub filename: String,
}

impl StoredFile {
    /// Path below the server's public base, e.g. `gallery/upload/img-1.png`.
    pub fn url_path(&self) -> String {
        if self.subfolder.is_empty() {
            format!("{}/{}", self.category, self.filename)
        } else {
            format!("{}/{}/{}", self.category, self.subfolder, self.filename)
        }
    }
}

/// One entry of a category listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    pub filename: String,
    pub url: String,
    /// Forward-slash directory relative to the category, empty at the root.
    pub subfolder: String,
    /// Modification time in milliseconds since the Unix epoch.
    pub mtime: i64,
}
