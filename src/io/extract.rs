//! Archive extraction.
//!
//! Dispatches on the lowercased path suffix: gzip, tar (plain, gz, bz2, xz),
//! and zip (including `.vsix`). Callers use [`is_extractable`] to decide
//! whether a downloaded file should be expanded and deleted.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use thiserror::Error;
use xz2::read::XzDecoder;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Expand `path` into `out_dir`.
pub fn extract(path: &Path, out_dir: &Path) -> Result<(), ExtractError> {
    let name = path.to_string_lossy().to_lowercase();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        unpack_tar(GzDecoder::new(open(path)?), out_dir)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        unpack_tar(BzDecoder::new(open(path)?), out_dir)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        unpack_tar(XzDecoder::new(open(path)?), out_dir)
    } else if name.ends_with(".tar") {
        unpack_tar(open(path)?, out_dir)
    } else if name.ends_with(".zip") || name.ends_with(".vsix") {
        unpack_zip(path, out_dir)
    } else if name.ends_with(".gz") {
        gunzip(path, out_dir)
    } else {
        Err(ExtractError::UnsupportedFormat(
            path.display().to_string(),
        ))
    }
}

/// True if [`extract`] knows the suffix.
pub fn is_extractable(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    [
        ".gz", ".tar", ".tar.bz2", ".tar.xz", ".tbz2", ".tgz", ".txz", ".vsix", ".zip",
    ]
    .iter()
    .any(|suffix| name.ends_with(suffix))
}

fn open(path: &Path) -> io::Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

/// Single-file gunzip; the output drops the `.gz` suffix.
fn gunzip(path: &Path, out_dir: &Path) -> Result<(), ExtractError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let out_name = file_name.strip_suffix(".gz").unwrap_or(&file_name);

    let mut decoder = GzDecoder::new(open(path)?);
    let mut out = File::create(out_dir.join(out_name))?;
    io::copy(&mut decoder, &mut out)?;
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, out_dir: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(out_dir)?;
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = entry.path()?.into_owned();
        let target = out_dir.join(&rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&target)?;
    }
    Ok(())
}

fn unpack_zip(path: &Path, out_dir: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(out_dir)?;
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel) = entry.enclosed_name().map(Path::to_path_buf) else {
            continue;
        };
        let target = out_dir.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}
