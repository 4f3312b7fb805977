//! Collision-free destination filenames.
//!
//! Names are claimed with exclusive creation, so two writers can never be
//! handed the same non-empty path.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;

/// Extension used when the original name has none.
pub const DEFAULT_EXTENSION: &str = ".png";

/// The `n`th candidate for `path`: the path itself for `0`, otherwise
/// `<stem>-<n><ext>` in the same directory.
pub fn candidate(path: &Path, n: u32) -> PathBuf {
    if n == 0 {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}-{}", stem, n),
    };
    path.with_file_name(name)
}

/// Create the first free candidate for `path` and return it, open for
/// writing. Only `AlreadyExists` moves on to the next candidate.
pub fn create_unique(path: &Path) -> io::Result<(PathBuf, File)> {
    let mut n = 0u32;
    loop {
        let target = candidate(path, n);
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(file) => return Ok((target, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n = next(n)?,
            Err(e) => return Err(e),
        }
    }
}

/// Claim a name for `path` that a rename can land on. An existing empty
/// regular file is taken over as the placeholder of a move that never
/// completed.
pub fn reserve_unique(path: &Path) -> io::Result<PathBuf> {
    let mut n = 0u32;
    loop {
        let target = candidate(path, n);
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(_) => return Ok(target),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if is_placeholder(&target) {
                    return Ok(target);
                }
                n = next(n)?;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_placeholder(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() == 0)
}

fn next(n: u32) -> io::Result<u32> {
    n.checked_add(1)
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no free filename left"))
}

/// Extension of `original` including the dot, or [`DEFAULT_EXTENSION`].
pub fn extension_of(original: &str) -> String {
    Path::new(original)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Fresh name for an uploaded file: `img-<unix-millis>-<random><ext>`.
pub fn upload_filename(extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..=1_000_000_000);
    format!("img-{}-{}{}", millis, suffix, extension)
}
