//! Store layout derived from the environment.
//!
//! Everything mason touches lives under one data root, selected by
//! `MASON_DATA_DIR` with platform-conventional fallbacks.

use std::env;
use std::io;
use std::path::PathBuf;

use crate::core::platform::select_by_os;

/// Registries consulted when none are configured.
pub const DEFAULT_REGISTRY: &str = "github:mason-org/mason-registry";

/// Resolved store paths plus the configured registry list.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub registries_dir: PathBuf,
    pub packages_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub share_dir: PathBuf,
    pub opt_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub registries: Vec<String>,
}

impl Config {
    /// Build a config rooted at `data_dir`.
    pub fn new(data_dir: PathBuf, registries: Vec<String>) -> Self {
        Self {
            registries_dir: data_dir.join("registries"),
            packages_dir: data_dir.join("packages"),
            bin_dir: data_dir.join("bin"),
            share_dir: data_dir.join("share"),
            opt_dir: data_dir.join("opt"),
            staging_dir: data_dir.join("staging"),
            data_dir,
            registries,
        }
    }

    /// Read `MASON_DATA_DIR` and `MASON_REGISTRIES` from the environment.
    ///
    /// Without `MASON_DATA_DIR` the root is `$XDG_DATA_HOME/mason` (falling
    /// back to `~/.local/share/mason`) on Unix and `%APPDATA%/mason` on
    /// Windows.
    pub fn from_env() -> Self {
        let data_dir = match env::var_os("MASON_DATA_DIR").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_root().join("mason"),
        };

        let registries = env::var("MASON_REGISTRIES")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REGISTRY.to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self::new(data_dir, registries)
    }

    /// Create every store subdirectory. Must run before any mutating op.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [
            &self.registries_dir,
            &self.packages_dir,
            &self.bin_dir,
            &self.share_dir,
            &self.opt_dir,
            &self.staging_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Path of the cross-process lock file.
    pub fn lock_path() -> PathBuf {
        env::temp_dir().join("mason.lock")
    }
}

fn default_data_root() -> PathBuf {
    let home = dirs::home_dir().expect("could not determine home directory");
    let (var, fallback) = select_by_os(
        ("XDG_DATA_HOME", home.join(".local").join("share")),
        ("APPDATA", home.join("AppData").join("Roaming")),
    );
    env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or(fallback)
}
