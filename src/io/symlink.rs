//! Symlink resolution and guarded removal.
//!
//! Linking a package expands each `(source, destination)` pair into a flat
//! map of leaf files: a file links directly, a directory links every regular
//! file underneath it. Removal only ever deletes symbolic links, and
//! [`safe_remove_all`] refuses to leave the data root.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RemoveError {
    #[error("refusing to remove '{}': outside the trusted base '{}'", dir.display(), base.display())]
    OutsideBase { dir: PathBuf, base: PathBuf },

    #[error("refusing to remove '{}': not a directory or symlink", .0.display())]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Expand `(src, dest)` into leaf `dest -> src` pairs.
///
/// A file source yields the pair itself; a directory source yields one pair
/// per regular file underneath, mirroring the relative layout under `dest`.
pub fn resolve(src: &Path, dest: &Path) -> io::Result<BTreeMap<PathBuf, PathBuf>> {
    let mut links = BTreeMap::new();

    if !src.is_dir() {
        links.insert(dest.to_path_buf(), src.to_path_buf());
        return Ok(links);
    }

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        links.insert(dest.join(rel), entry.path().to_path_buf());
    }

    Ok(links)
}

/// Symlink `dest -> source`, creating parent directories and replacing an
/// existing symlink at the destination.
pub fn create(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if dest
        .symlink_metadata()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
    {
        fs::remove_file(dest)?;
    }

    #[cfg(unix)]
    return std::os::unix::fs::symlink(source, dest);
    #[cfg(windows)]
    return std::os::windows::fs::symlink_file(source, dest);
}

/// Remove `dest` iff it is a symbolic link. Missing paths are fine.
pub fn remove(dest: &Path) -> io::Result<()> {
    match dest.symlink_metadata() {
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(dest),
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Recursively delete `dir`, but only if it lives under `base` and is a
/// directory or symlink. Guards against poisoned receipts and traversal in
/// entry data.
pub fn safe_remove_all(dir: &Path, base: &Path) -> Result<(), RemoveError> {
    let abs_dir = absolutize(dir)?;
    let abs_base = absolutize(base)?;

    if !abs_dir.starts_with(&abs_base) {
        return Err(RemoveError::OutsideBase {
            dir: abs_dir,
            base: abs_base,
        });
    }

    let meta = fs::symlink_metadata(&abs_dir)?;
    if !meta.is_dir() && !meta.file_type().is_symlink() {
        return Err(RemoveError::NotADirectory(abs_dir));
    }

    fs::remove_dir_all(&abs_dir)?;
    Ok(())
}

fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
