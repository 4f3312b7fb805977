//! Path validation and resolution.
//!
//! Maps (category, segments) and previously issued file URLs onto absolute
//! paths inside a category directory. Nothing here touches the disk.

use std::path::{Component, Path, PathBuf};

use url::Url;

use super::{StorageError, StorageLayout};
use crate::models::Category;

/// A path proven to lie inside its category directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub category: Category,
    pub path: PathBuf,
    pub category_dir: PathBuf,
}

impl ResolvedPath {
    /// Re-check containment against the category directory.
    pub fn is_contained(&self) -> bool {
        is_within(&self.path, &self.category_dir)
    }
}

/// A segment may only contain ASCII letters, digits, `_`, `.` and `-`,
/// and may not be `.` or `..`.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Strip everything but ASCII letters, digits, `-` and `_` from a free-form
/// subfolder value. An empty result means "no subfolder".
pub fn sanitize_subfolder(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}

/// Lexically resolve `.` and `..` components.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Component-wise containment: `root` itself or anything below it.
/// `/srv/gallery2` is not within `/srv/gallery`.
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Join `segments` under the category directory. Empty segments are
/// skipped; at least one must remain and every one must be valid.
pub fn resolve<S: AsRef<str>>(
    layout: &StorageLayout,
    category: Category,
    segments: &[S],
) -> Result<ResolvedPath, StorageError> {
    let segments: Vec<&str> = segments
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return Err(StorageError::InvalidSegment("empty path".to_string()));
    }

    if let Some(bad) = segments.iter().find(|s| !is_valid_segment(s)) {
        return Err(StorageError::InvalidSegment((*bad).to_string()));
    }

    let category_dir = layout.category_dir(category);
    let mut joined = category_dir.clone();
    joined.extend(&segments);
    let path = normalize(&joined);

    if !is_within(&path, &category_dir) {
        return Err(StorageError::InvalidSegment(segments.join("/")));
    }

    Ok(ResolvedPath {
        category,
        path,
        category_dir,
    })
}

/// Invert a URL issued by this server (or a bare `/category/...` path).
pub fn parse_file_url(layout: &StorageLayout, url: &str) -> Result<ResolvedPath, StorageError> {
    let url = url.trim();
    let pathname = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    let parts: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();
    let Some((first, rest)) = parts.split_first() else {
        return Err(StorageError::InvalidSegment(format!("malformed file URL: {url}")));
    };
    if rest.is_empty() {
        return Err(StorageError::InvalidSegment(format!("malformed file URL: {url}")));
    }

    let category: Category = first
        .parse()
        .map_err(|_| StorageError::InvalidCategory((*first).to_string()))?;

    resolve(layout, category, rest)
}
