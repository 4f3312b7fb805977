//! Sandboxed on-disk storage.
//!
//! Everything the server persists lives under a single storage root:
//! - One directory per [`Category`] holding image files
//! - A flat `data/` directory of JSON documents
//! - The legacy `uploads/` tree, drained by [`migrate`] at startup
//!
//! Untrusted request input only reaches the filesystem through
//! [`resolver`], which confines every path to its category directory.

pub mod allocator;
pub mod documents;
pub mod images;
pub mod migrate;
pub mod resolver;
pub mod walk;

pub use allocator::{create_unique, reserve_unique, upload_filename};
pub use documents::DocumentStore;
pub use images::ImageStore;
pub use migrate::{migrate_legacy, MigrationReport};
pub use resolver::{is_valid_segment, parse_file_url, resolve, sanitize_subfolder, ResolvedPath};
pub use walk::{walk_tree, EntryKind, TreeEntry};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::models::Category;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("Invalid path segment: {0}")]
    InvalidSegment(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected upload: {0}")]
    BadUpload(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<walkdir::Error> for StorageError {
    fn from(err: walkdir::Error) -> Self {
        StorageError::Io(err.into())
    }
}

/// Directory layout below the storage root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Create a layout rooted at `root`, made absolute against the
    /// current directory so containment checks compare absolute paths.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = std::path::absolute(root.as_ref())?;
        Ok(Self {
            root: resolver::normalize(&root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.as_str())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn legacy_root(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn legacy_category_dir(&self, category: Category) -> PathBuf {
        self.legacy_root().join(category.as_str())
    }

    /// Create the category roots, their well-known subfolders and the data
    /// directory. Existing directories are left alone.
    pub fn ensure(&self) -> io::Result<()> {
        for category in Category::ALL {
            let dir = self.category_dir(category);
            fs::create_dir_all(&dir)?;
            for sub in category.default_subfolders() {
                fs::create_dir_all(dir.join(sub))?;
            }
        }
        fs::create_dir_all(self.data_dir())?;
        debug!("Storage layout ready under {:?}", self.root);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = StorageLayout::new("/srv/apix").unwrap();

        assert_eq!(layout.root(), Path::new("/srv/apix"));
        assert_eq!(
            layout.category_dir(Category::Gallery),
            PathBuf::from("/srv/apix/gallery")
        );
        assert_eq!(layout.data_dir(), PathBuf::from("/srv/apix/data"));
        assert_eq!(
            layout.legacy_category_dir(Category::History),
            PathBuf::from("/srv/apix/uploads/history")
        );
    }

    #[test]
    fn test_layout_relative_root_is_absolute() {
        let layout = StorageLayout::new("./storage/../storage").unwrap();
        assert!(layout.root().is_absolute());
        assert!(layout.root().ends_with("storage"));
        assert!(!layout.root().components().any(|c| c.as_os_str() == ".."));
    }

    #[test]
    fn test_ensure_creates_tree() {
        let tmp = TempDir::new().unwrap();
        let layout = StorageLayout::new(tmp.path()).unwrap();

        layout.ensure().unwrap();

        for sub in ["upload", "outputs", "image_editor", "extra"] {
            assert!(layout.category_dir(Category::Gallery).join(sub).is_dir());
        }
        assert!(layout.category_dir(Category::History).join("upload").is_dir());
        assert!(layout.data_dir().is_dir());
        assert!(!layout.legacy_root().exists());
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let layout = StorageLayout::new(tmp.path()).unwrap();
        layout.ensure().unwrap();

        let marker = layout.category_dir(Category::Gallery).join("upload/keep.png");
        fs::write(&marker, b"png").unwrap();

        layout.ensure().unwrap();
        assert_eq!(fs::read(&marker).unwrap(), b"png");
    }
}
