//! Install receipts.
//!
//! A receipt is the on-disk record of a completed install: the package name,
//! its purl, and the exact symlink map that was created. A directory under
//! `packages/` without one is not installed.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::package::{Package, PackageError};
use crate::core::purl::{Purl, PurlError};
use crate::io::symlink;

/// Receipt file name inside each package directory.
pub const FILE_NAME: &str = "mason-receipt.json";

#[derive(Error, Debug)]
pub enum ReceiptError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed receipt: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Purl(#[from] PurlError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("link path escapes its root: {0}")]
    Path(#[from] std::path::StripPrefixError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub name: String,
    pub primary_source: PrimarySource,
    pub links: Links,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimarySource {
    pub id: String,
    #[serde(skip)]
    pub purl: Purl,
}

/// Destination-relative to source-relative link maps for the three output
/// trees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub bin: BTreeMap<String, String>,
    #[serde(default)]
    pub share: BTreeMap<String, String>,
    #[serde(default)]
    pub opt: BTreeMap<String, String>,
}

impl Receipt {
    /// Load and parse a receipt file.
    pub fn from_file(path: &Path) -> Result<Self, ReceiptError> {
        let data = fs::read(path)?;
        let mut receipt: Receipt = serde_json::from_slice(&data)?;
        receipt.primary_source.purl = Purl::parse(&receipt.primary_source.id)?;
        Ok(receipt)
    }

    /// Compute the final link maps for an installed package.
    ///
    /// `bin` destinations map to resolved sources relative to the package
    /// directory; `share`/`opt` are the resolver expansion with both sides
    /// made relative to their roots.
    pub fn from_package(
        pkg: &Package,
        dir: &Path,
        share_dir: &Path,
        opt_dir: &Path,
    ) -> Result<Self, ReceiptError> {
        Ok(Self {
            name: pkg.name.clone(),
            primary_source: PrimarySource {
                id: pkg.source.purl.as_str().to_string(),
                purl: pkg.source.purl.clone(),
            },
            links: Links {
                bin: pkg.resolve_bin()?,
                share: relative_links(&pkg.share, dir, share_dir)?,
                opt: relative_links(&pkg.opt, dir, opt_dir)?,
            },
        })
    }

    /// Write the receipt into `dir`.
    pub fn write(&self, dir: &Path) -> Result<(), ReceiptError> {
        fs::write(dir.join(FILE_NAME), serde_json::to_vec(self)?)?;
        Ok(())
    }
}

fn relative_links(
    mappings: &BTreeMap<String, String>,
    dir: &Path,
    out_dir: &Path,
) -> Result<BTreeMap<String, String>, ReceiptError> {
    let mut links = BTreeMap::new();
    for (dest, src) in mappings {
        let resolved = symlink::resolve(&dir.join(src), &out_dir.join(dest))?;
        for (leaf_dest, leaf_src) in resolved {
            links.insert(
                leaf_dest.strip_prefix(out_dir)?.to_string_lossy().into_owned(),
                leaf_src.strip_prefix(dir)?.to_string_lossy().into_owned(),
            );
        }
    }
    Ok(links)
}
