//! Directory tree traversal shared by listing and migration.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One node below the walked root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: PathBuf,
    /// Path relative to the walked root, never empty.
    pub relative: PathBuf,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// Forward-slash form of the parent of `relative`, empty at the root.
    pub fn parent_slashed(&self) -> String {
        self.relative
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default()
    }
}

/// Every entry below `root`, parents before children, siblings sorted by
/// name. Symlinks are not followed and are reported as files. A missing
/// root yields no entries.
///
/// The listing is collected up front, so callers may move or delete
/// entries while iterating the result.
pub fn walk_tree(root: &Path) -> Result<Vec<TreeEntry>, StorageError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(entry.file_name()));
        let kind = if entry.file_type().is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };
        entries.push(TreeEntry {
            path: entry.into_path(),
            relative,
            kind,
        });
    }
    Ok(entries)
}
