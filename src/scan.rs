//! Directory scanning for candidate photos.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::Error;

/// Return `true` if `path` has an allowed image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    let exts: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| *e == ext)
        })
}

/// Recursively list candidate images under `root` in lexicographic order.
///
/// Only regular files with a supported extension are returned, so the same
/// directory always yields the same sequence.
///
/// # Errors
/// Returns [`Error::DirectoryNotFound`] if `root` is missing or not a
/// directory. An existing-but-empty directory is not an error; it yields an
/// empty list and the caller decides what to do about it.
pub fn list_candidates(root: &Path) -> Result<Vec<PathBuf>, Error> {
    if !root.is_dir() {
        return Err(Error::DirectoryNotFound(root.to_path_buf()));
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !should_skip_dir(e))
        .flatten()
    {
        let path = entry.path();
        if path.is_file() && is_supported_image(path) {
            out.push(path.to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

fn should_skip_dir(entry: &DirEntry) -> bool {
    // Never skip the root; tempfile roots can be dot-dirs.
    if entry.depth() == 0 {
        return false;
    }
    // Skip typical hidden dot-directories like .git, .thumbnails, etc.
    if !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|n| n.starts_with('.'))
}
