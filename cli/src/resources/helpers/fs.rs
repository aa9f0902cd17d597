//! File-system resource helpers.
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigureError;

/// Wrap an I/O error with the operation and path.
pub fn io_error(operation: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> ConfigureError {
    let path = path.to_path_buf();
    move |source| ConfigureError::Io {
        operation,
        path,
        source,
    }
}

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<(), ConfigureError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error("create parent", parent))?;
    }
    Ok(())
}

/// Whether anything (including a broken symlink) exists at `path`.
#[must_use]
pub fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Remove whatever is at `path`: file, symlink, or directory tree.
///
/// Does nothing if `path` does not exist.  Symlinks are removed, never
/// followed.
///
/// # Errors
///
/// Returns the I/O error if the path exists but cannot be removed.
pub fn remove_path(path: &Path) -> std::io::Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if meta.is_dir() {
        return fs::remove_dir_all(path);
    }
    let removed = fs::remove_file(path);
    // Windows directory symlinks need remove_dir.
    #[cfg(windows)]
    if removed.is_err() && meta.file_type().is_symlink() {
        return fs::remove_dir(path);
    }
    removed
}

/// [`remove_path`] reporting failures as a [`ConfigureError`].
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_any(path: &Path) -> Result<(), ConfigureError> {
    remove_path(path).map_err(io_error("remove", path))
}

/// First free backup name for `path`: `<name>.bak`, then `<name>.bak.1`, …
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    let base = path.as_os_str().to_string_lossy().into_owned();
    let first = PathBuf::from(format!("{base}.bak"));
    if !occupied(&first) {
        return first;
    }
    (1..)
        .map(|n| PathBuf::from(format!("{base}.bak.{n}")))
        .find(|candidate| !occupied(candidate))
        .unwrap_or(first)
}

/// Move `path` to its first free backup name and return that name.
///
/// # Errors
///
/// Returns an error if the rename fails.
pub fn back_up(path: &Path) -> Result<PathBuf, ConfigureError> {
    let backup = backup_path(path);
    fs::rename(path, &backup).map_err(io_error("back up", path))?;
    Ok(backup)
}
