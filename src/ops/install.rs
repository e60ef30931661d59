//! The install state machine.
//!
//! Packages are staged under `staging/<name>`, downloaded and built there,
//! then promoted into `packages/<name>` with one atomic rename. Linking and
//! receipt writing happen after promotion; a failure there unwinds the links
//! and the promoted directory. The staging directory never survives: every
//! exit path removes it, including a terminate-style signal mid-install.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::Client;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::core::package::{Package, PackageError};
use crate::core::receipt::{Receipt, ReceiptError};
use crate::io::symlink::{self, safe_remove_all, RemoveError};

#[derive(Error, Debug)]
pub enum InstallError {
    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    #[error(transparent)]
    Remove(#[from] RemoveError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Owns `staging/<name>` for the duration of one install.
///
/// Dropping the guard removes the directory if it still exists; the spawned
/// watcher does the same on SIGINT/SIGTERM and exits 1. Both paths tolerate
/// the directory already being gone, because successful promotion renames it
/// away.
struct StagingGuard {
    path: PathBuf,
    base: PathBuf,
    watcher: Option<JoinHandle<()>>,
}

impl StagingGuard {
    fn new(path: PathBuf, base: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&path)?;

        let watch_path = path.clone();
        let watch_base = base.clone();
        let watcher = tokio::spawn(async move {
            wait_for_shutdown().await;
            remove_staging(&watch_path, &watch_base);
            std::process::exit(1);
        });

        Ok(Self {
            path,
            base,
            watcher: Some(watcher),
        })
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        remove_staging(&self.path, &self.base);
    }
}

fn remove_staging(path: &Path, base: &Path) {
    if path.symlink_metadata().is_err() {
        return;
    }
    if let Err(err) = safe_remove_all(path, base) {
        tracing::warn!(staging = %path.display(), %err, "failed to clean staging directory");
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let Ok(mut term) = signal(SignalKind::terminate()) else {
        return std::future::pending().await;
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(windows)]
async fn wait_for_shutdown() {
    use tokio::signal::windows::{ctrl_break, ctrl_c};

    let (Ok(mut interrupt), Ok(mut brk)) = (ctrl_c(), ctrl_break()) else {
        return std::future::pending().await;
    };
    tokio::select! {
        _ = interrupt.recv() => {}
        _ = brk.recv() => {}
    }
}

/// Stage, download, build, promote, link, and record one package.
pub async fn install_package(
    pkg: &Package,
    config: &Config,
    client: &Client,
) -> Result<(), InstallError> {
    let staging_dir = config.staging_dir.join(&pkg.name);
    let pkg_dir = config.packages_dir.join(&pkg.name);

    let _guard = StagingGuard::new(staging_dir.clone(), config.data_dir.clone())?;

    pkg.download(&staging_dir, client).await?;
    pkg.build(&staging_dir)?;

    fs::rename(&staging_dir, &pkg_dir)?;

    finish_install(pkg, &pkg_dir, config)
}

/// Same as an install, but tears down the previous version's links and
/// directory just before promotion.
pub async fn upgrade_package(
    pkg: &Package,
    previous: &Receipt,
    config: &Config,
    client: &Client,
) -> Result<(), InstallError> {
    let staging_dir = config.staging_dir.join(&pkg.name);
    let pkg_dir = config.packages_dir.join(&pkg.name);

    let _guard = StagingGuard::new(staging_dir.clone(), config.data_dir.clone())?;

    pkg.download(&staging_dir, client).await?;
    pkg.build(&staging_dir)?;

    remove_receipt_links(previous, config)?;
    safe_remove_all(&pkg_dir, &config.data_dir)?;

    fs::rename(&staging_dir, &pkg_dir)?;

    finish_install(pkg, &pkg_dir, config)
}

/// Remove a package: its recorded links first, then the directory itself.
pub fn uninstall_package(receipt: &Receipt, config: &Config) -> Result<(), InstallError> {
    remove_receipt_links(receipt, config)?;
    safe_remove_all(
        &config.packages_dir.join(&receipt.name),
        &config.data_dir,
    )?;
    Ok(())
}

/// Post-promotion steps. Any failure unwinds both the links and the
/// promoted package directory before propagating.
fn finish_install(pkg: &Package, pkg_dir: &Path, config: &Config) -> Result<(), InstallError> {
    let unwind = |err: InstallError| -> InstallError {
        let _ = pkg.unlink(pkg_dir, &config.bin_dir, &config.share_dir, &config.opt_dir);
        let _ = safe_remove_all(pkg_dir, &config.data_dir);
        err
    };

    pkg.link(pkg_dir, &config.bin_dir, &config.share_dir, &config.opt_dir)
        .map_err(|e| unwind(e.into()))?;

    let receipt = Receipt::from_package(pkg, pkg_dir, &config.share_dir, &config.opt_dir)
        .map_err(|e| unwind(e.into()))?;
    receipt.write(pkg_dir).map_err(|e| unwind(e.into()))?;

    Ok(())
}

fn remove_receipt_links(receipt: &Receipt, config: &Config) -> Result<(), InstallError> {
    for dest in receipt.links.bin.keys() {
        symlink::remove(&config.bin_dir.join(dest))?;
    }
    for dest in receipt.links.share.keys() {
        symlink::remove(&config.share_dir.join(dest))?;
    }
    for dest in receipt.links.opt.keys() {
        symlink::remove(&config.opt_dir.join(dest))?;
    }
    Ok(())
}
