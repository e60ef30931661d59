//! Registry stores.
//!
//! Two backends: `github:<owner>/<repo>` bundles (a `registry.json.zip` plus
//! `checksums.txt` on the latest release, cached under
//! `registries/github/<owner>/<repo>/`) and `file:<path>` trees of
//! `packages/*/package.yaml`.

pub mod entry;
pub mod resolve;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::package::Package;
use crate::core::platform::Platform;
use crate::io::download::{download_github_release, DownloadError};
use crate::io::extract::{extract, ExtractError};
use crate::registry::entry::RegistryEntry;
use crate::registry::resolve::resolve_entry;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid registry format: '{0}'")]
    InvalidSpec(String),

    #[error("invalid registry kind: '{0}'")]
    InvalidKind(String),

    #[error("checksum mismatch for '{0}'")]
    ChecksumMismatch(String),

    #[error("GitHub API error for '{url}': {status}")]
    Api {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed registry data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed package definition: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    Github,
    File,
}

/// Cached state written next to a downloaded bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub download_timestamp: u64,
    pub version: String,
    pub checksums: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct Registry {
    pub kind: RegistryKind,
    pub source: String,
    pub dir: PathBuf,
    pub info: Option<RegistryInfo>,
}

#[derive(Deserialize)]
struct LatestRelease {
    tag_name: String,
}

impl Registry {
    /// Split a `kind:source` registry spec.
    pub fn parse_spec(spec: &str) -> Result<(RegistryKind, String), RegistryError> {
        let Some((kind, source)) = spec.split_once(':') else {
            return Err(RegistryError::InvalidSpec(spec.to_string()));
        };
        match kind {
            "github" => Ok((RegistryKind::Github, source.to_string())),
            "file" => Ok((RegistryKind::File, source.to_string())),
            other => Err(RegistryError::InvalidKind(other.to_string())),
        }
    }

    /// Open a registry, bootstrapping the cache on first access.
    pub async fn open(
        spec: &str,
        registries_dir: &Path,
        client: &Client,
    ) -> Result<Self, RegistryError> {
        let (kind, source) = Self::parse_spec(spec)?;

        match kind {
            RegistryKind::Github => {
                let dir = registries_dir.join("github").join(&source);
                fs::create_dir_all(&dir)?;

                let registry_file = dir.join("registry.json");
                let info_file = dir.join("info.json");

                let info = if !registry_file.exists() || !info_file.exists() {
                    println!("Downloading 'github:{source}'...");
                    Some(bootstrap(client, &source, &dir).await?)
                } else {
                    Some(serde_json::from_slice(&fs::read(&info_file)?)?)
                };

                Ok(Self {
                    kind,
                    source,
                    dir,
                    info,
                })
            }
            RegistryKind::File => Ok(Self {
                kind,
                dir: PathBuf::from(&source),
                source,
                info: None,
            }),
        }
    }

    /// Re-check the upstream version and refresh the cache if it moved.
    pub async fn update(&mut self, client: &Client) -> Result<(), RegistryError> {
        match self.kind {
            RegistryKind::Github => {
                let latest = latest_tag(client, &self.source).await?;
                let current = self.info.as_ref().map(|i| i.version.as_str());
                if current != Some(latest.as_str()) {
                    println!("Updating 'github:{}'...", self.source);
                    self.info = Some(bootstrap(client, &self.source, &self.dir).await?);
                }
                Ok(())
            }
            RegistryKind::File => Ok(()),
        }
    }

    /// Decode every entry and resolve it against the platform.
    ///
    /// Entries whose templates fail are dropped with a diagnostic; entries
    /// with no matching platform variant are dropped silently. Neither kills
    /// the load.
    pub fn load(&self, platform: &Platform) -> Result<Vec<Package>, RegistryError> {
        let entries = match self.kind {
            RegistryKind::Github => {
                let data = fs::read(self.dir.join("registry.json"))?;
                serde_json::from_slice::<Vec<RegistryEntry>>(&data)?
            }
            RegistryKind::File => {
                let packages_dir = self.dir.join("packages");
                let mut names: Vec<_> = fs::read_dir(&packages_dir)?
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .map(|e| e.path())
                    .collect();
                names.sort();

                let mut entries = Vec::with_capacity(names.len());
                for package_dir in names {
                    let data = fs::read_to_string(package_dir.join("package.yaml"))?;
                    entries.push(serde_yaml::from_str(&data)?);
                }
                entries
            }
        };

        let mut packages = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry.name.clone();
            match resolve_entry(entry, platform) {
                Ok(Some(pkg)) => packages.push(pkg),
                Ok(None) => {
                    tracing::debug!(package = %name, "no variant for this platform, dropped")
                }
                Err(err) => tracing::warn!(package = %name, %err, "entry dropped"),
            }
        }
        Ok(packages)
    }
}

/// Download, verify, and index the latest bundle for a GitHub registry.
async fn bootstrap(
    client: &Client,
    source: &str,
    dir: &Path,
) -> Result<RegistryInfo, RegistryError> {
    let zip_file = download_github_release(client, source, "registry.json.zip", None, dir).await?;
    let checksums_file = download_github_release(client, source, "checksums.txt", None, dir).await?;

    extract(&zip_file, dir)?;

    let checksums = read_checksums(&checksums_file)?;
    if !verify_checksums(&checksums, dir)? {
        return Err(RegistryError::ChecksumMismatch(source.to_string()));
    }

    fs::remove_file(&zip_file)?;
    fs::remove_file(&checksums_file)?;

    let version = latest_tag(client, source).await?;
    let info = RegistryInfo {
        download_timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
        version,
        checksums,
    };
    fs::write(dir.join("info.json"), serde_json::to_vec(&info)?)?;
    Ok(info)
}

async fn latest_tag(client: &Client, source: &str) -> Result<String, RegistryError> {
    let url = format!("https://api.github.com/repos/{source}/releases/latest");
    let response = client
        .get(&url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(RegistryError::Api {
            url,
            status: response.status(),
        });
    }

    let release: LatestRelease = response.json().await?;
    Ok(release.tag_name)
}

/// Parse `<hex-digest>  <filename>` lines. Blank and malformed lines are
/// skipped.
pub fn read_checksums(path: &Path) -> io::Result<BTreeMap<String, String>> {
    let mut checksums = BTreeMap::new();
    for line in fs::read_to_string(path)?.lines() {
        let mut fields = line.split_whitespace();
        let (Some(digest), Some(file), None) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        checksums.insert(file.to_string(), digest.to_string());
    }
    Ok(checksums)
}

/// Check each listed file in `dir` against its sha256 digest.
pub fn verify_checksums(checksums: &BTreeMap<String, String>, dir: &Path) -> io::Result<bool> {
    for (file, expected) in checksums {
        let data = fs::read(dir.join(file))?;
        if &hex::encode(Sha256::digest(&data)) != expected {
            return Ok(false);
        }
    }
    Ok(true)
}
