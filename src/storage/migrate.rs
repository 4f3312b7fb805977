//! One-time move of the legacy `uploads/<category>` tree into the
//! category layout.
//!
//! Directories are merged into existing destinations, files are moved and
//! renamed on collision, and legacy directories are removed bottom-up only
//! once drained. Re-running after an interrupted run finishes the rest.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use super::allocator::reserve_unique;
use super::walk::{walk_tree, EntryKind};
use super::{StorageError, StorageLayout};
use crate::models::Category;

/// What a migration run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub files_moved: usize,
    /// Files that landed under a `-N` name because the original was taken.
    pub files_renamed: usize,
    pub directories_created: usize,
    pub legacy_root_removed: bool,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Drain the legacy storage root into the category layout.
///
/// A missing legacy root is a no-op. The legacy root itself is removed only
/// when nothing unrecognized is left inside it.
pub fn migrate_legacy(layout: &StorageLayout) -> Result<MigrationReport, StorageError> {
    let legacy_root = layout.legacy_root();
    let mut report = MigrationReport::default();

    if !legacy_root.exists() {
        debug!("No legacy storage at {:?}", legacy_root);
        return Ok(report);
    }

    for category in Category::ALL {
        migrate_category(layout, category, &mut report)?;
    }

    if fs::read_dir(&legacy_root)?.next().is_none() {
        fs::remove_dir(&legacy_root)?;
        report.legacy_root_removed = true;
    } else {
        warn!(
            "Legacy storage root {:?} still holds unrecognized entries, leaving it in place",
            legacy_root
        );
    }

    info!(
        "Legacy migration finished: {} files moved ({} renamed), {} directories created",
        report.files_moved, report.files_renamed, report.directories_created
    );
    Ok(report)
}

fn migrate_category(
    layout: &StorageLayout,
    category: Category,
    report: &mut MigrationReport,
) -> Result<(), StorageError> {
    let source = layout.legacy_category_dir(category);
    if !source.is_dir() {
        return Ok(());
    }

    let dest_root = layout.category_dir(category);
    fs::create_dir_all(&dest_root)?;
    info!("Migrating legacy {} from {:?}", category, source);

    let mut drained = Vec::new();
    for entry in walk_tree(&source)? {
        let dest = dest_root.join(&entry.relative);
        match entry.kind {
            EntryKind::Dir => {
                if !dest.is_dir() {
                    fs::create_dir_all(&dest)?;
                    report.directories_created += 1;
                }
                drained.push(entry.path);
            }
            EntryKind::File => move_file(&entry.path, &dest, report)?,
        }
    }

    // Children come after parents in the walk, so reverse for bottom-up.
    for dir in drained.iter().rev() {
        fs::remove_dir(dir)?;
    }
    fs::remove_dir(&source)?;
    Ok(())
}

fn move_file(src: &Path, dest: &Path, report: &mut MigrationReport) -> Result<(), StorageError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let target = reserve_unique(dest)?;
    if let Err(e) = fs::rename(src, &target) {
        // Drop the placeholder so a re-run does not skip past it.
        let _ = fs::remove_file(&target);
        return Err(e.into());
    }

    if target != dest {
        debug!("{:?} exists, moved {:?} to {:?}", dest, src, target);
        report.files_renamed += 1;
    }
    report.files_moved += 1;
    Ok(())
}
