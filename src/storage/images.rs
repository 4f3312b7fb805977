//! Image files stored per category.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info, warn};

use super::allocator::{create_unique, extension_of};
use super::resolver::{self, is_valid_segment, ResolvedPath};
use super::walk::walk_tree;
use super::{StorageError, StorageLayout};
use crate::models::{Category, StoredFile, StoredImage};

/// Image types accepted for upload and shown in listings.
pub const IMAGE_TYPES: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

static DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/(\w+);base64,(.+)$").expect("data URL pattern is valid")
});

/// Case-insensitive match of a bare extension (no dot) against [`IMAGE_TYPES`].
pub fn is_image_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    IMAGE_TYPES.contains(&ext.as_str())
}

/// `image/<type>` with `<type>` in [`IMAGE_TYPES`].
pub fn is_image_mime(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    mime.split(';')
        .next()
        .and_then(|essence| essence.trim().strip_prefix("image/"))
        .is_some_and(|subtype| IMAGE_TYPES.contains(&subtype))
}

/// Check a multipart upload's client filename and content type. Returns the
/// extension (with dot) to give the stored file.
pub fn check_upload(
    original_name: &str,
    content_type: Option<&str>,
) -> Result<String, StorageError> {
    if !content_type.is_some_and(is_image_mime) {
        return Err(StorageError::BadUpload(
            "Only image files are allowed!".to_string(),
        ));
    }

    let extension = extension_of(original_name);
    if !is_image_extension(extension.trim_start_matches('.')) {
        return Err(StorageError::BadUpload(
            "Only image files are allowed!".to_string(),
        ));
    }
    Ok(extension)
}

/// Decode a `data:image/<type>;base64,<payload>` URL into the extension
/// (without dot) and raw bytes.
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>), StorageError> {
    let captures = DATA_URL
        .captures(data_url)
        .ok_or_else(|| StorageError::BadUpload("Invalid base64 format".to_string()))?;

    let extension = captures[1].to_string();
    if !is_image_extension(&extension) {
        return Err(StorageError::BadUpload(format!(
            "Unsupported image type: {extension}"
        )));
    }

    let bytes = STANDARD
        .decode(&captures[2])
        .map_err(|e| StorageError::BadUpload(format!("Invalid base64 data: {e}")))?;
    Ok((extension, bytes))
}

/// Read, write and list image files confined to the category directories.
#[derive(Debug, Clone)]
pub struct ImageStore {
    layout: StorageLayout,
}

impl ImageStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn resolve<S: AsRef<str>>(
        &self,
        category: Category,
        segments: &[S],
    ) -> Result<ResolvedPath, StorageError> {
        resolver::resolve(&self.layout, category, segments)
    }

    pub fn parse_url(&self, url: &str) -> Result<ResolvedPath, StorageError> {
        resolver::parse_file_url(&self.layout, url)
    }

    /// Directory a (sanitized) subfolder maps to, the category root when empty.
    fn target_dir(&self, category: Category, subfolder: &str) -> Result<PathBuf, StorageError> {
        if subfolder.is_empty() {
            Ok(self.layout.category_dir(category))
        } else {
            Ok(self.resolve(category, &[subfolder])?.path)
        }
    }

    /// Write `bytes` as `filename` under the category/subfolder. A taken name
    /// gets a `-N` suffix; existing files are never overwritten.
    pub fn save(
        &self,
        category: Category,
        subfolder: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        if !is_valid_segment(filename) {
            return Err(StorageError::InvalidSegment(filename.to_string()));
        }

        let dir = self.target_dir(category, subfolder)?;
        fs::create_dir_all(&dir)?;

        let (path, mut file) = create_unique(&dir.join(filename))?;
        let written = file.write_all(bytes).and_then(|()| file.flush());
        drop(file);
        if let Err(e) = written {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }

        let stored_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        info!("Stored {} bytes at {:?}", bytes.len(), path);

        Ok(StoredFile {
            category,
            subfolder: subfolder.to_string(),
            filename: stored_name,
        })
    }

    /// Save several files into one category/subfolder, all or nothing. When
    /// any write fails, the files already written by this call are removed.
    pub fn save_batch(
        &self,
        category: Category,
        subfolder: &str,
        files: &[(String, Vec<u8>)],
    ) -> Result<Vec<StoredFile>, StorageError> {
        let dir = self.target_dir(category, subfolder)?;
        let mut stored = Vec::with_capacity(files.len());

        for (filename, bytes) in files {
            match self.save(category, subfolder, filename, bytes) {
                Ok(file) => stored.push(file),
                Err(e) => {
                    for file in &stored {
                        if let Err(cleanup) = fs::remove_file(dir.join(&file.filename)) {
                            warn!("Failed to roll back {:?}: {}", file.filename, cleanup);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    /// The on-disk file behind `resolved`, which must be a regular file.
    pub fn locate(&self, resolved: &ResolvedPath) -> Result<PathBuf, StorageError> {
        if resolved.is_contained() && resolved.path.is_file() {
            Ok(resolved.path.clone())
        } else {
            Err(StorageError::NotFound("Image not found".to_string()))
        }
    }

    pub fn delete(&self, resolved: &ResolvedPath) -> Result<(), StorageError> {
        let path = self.locate(resolved)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound("Image not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every image below the category, newest first. `base_url` prefixes the
    /// returned URLs.
    pub fn list(
        &self,
        category: Category,
        base_url: &str,
    ) -> Result<Vec<StoredImage>, StorageError> {
        let root = self.layout.category_dir(category);
        let mut images = Vec::new();

        for entry in walk_tree(&root)? {
            if entry.is_dir() {
                continue;
            }
            let is_image = entry
                .path
                .extension()
                .is_some_and(|ext| is_image_extension(&ext.to_string_lossy()));
            if !is_image {
                continue;
            }

            let modified = match fs::metadata(&entry.path).and_then(|m| m.modified()) {
                Ok(time) => time,
                Err(e) => {
                    // Deleted between the walk and the stat.
                    warn!("Skipping {:?}: {}", entry.path, e);
                    continue;
                }
            };

            let filename = entry
                .relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let subfolder = entry.parent_slashed();
            let url = if subfolder.is_empty() {
                format!("{}/{}/{}", base_url, category, filename)
            } else {
                format!("{}/{}/{}/{}", base_url, category, subfolder, filename)
            };

            images.push(StoredImage {
                filename,
                url,
                subfolder,
                mtime: DateTime::<Utc>::from(modified).timestamp_millis(),
            });
        }

        images.sort_by(|a, b| b.mtime.cmp(&a.mtime).then_with(|| a.url.cmp(&b.url)));
        debug!("Listed {} images in {}", images.len(), category);
        Ok(images)
    }
}
