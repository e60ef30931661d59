//! Per-invocation context.
//!
//! Loads every configured registry, resolves the package map, and scans the
//! store for receipts. Read-only after construction; commands decide what to
//! mutate and go through the install engine.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};
use reqwest::Client;

use crate::config::Config;
use crate::core::package::Package;
use crate::core::platform::Platform;
use crate::core::receipt::{self, Receipt};
use crate::registry::Registry;

pub struct Context {
    pub config: Config,
    pub platform: Platform,
    pub client: Client,
    pub registries: Vec<Registry>,
    pub packages: BTreeMap<String, Package>,
    pub receipts: BTreeMap<String, Receipt>,
}

impl Context {
    pub async fn load() -> Result<Self> {
        let config = Config::from_env();
        Self::load_with(config, Platform::current()).await
    }

    pub async fn load_with(config: Config, platform: Platform) -> Result<Self> {
        config
            .ensure_dirs()
            .with_context(|| format!("failed to create store under {}", config.data_dir.display()))?;

        let client = Client::new();

        let mut registries = Vec::with_capacity(config.registries.len());
        for spec in &config.registries {
            let registry = Registry::open(spec, &config.registries_dir, &client)
                .await
                .with_context(|| format!("failed to open registry '{spec}'"))?;
            registries.push(registry);
        }

        // later registries overwrite earlier entries on name collision
        let mut packages = BTreeMap::new();
        for registry in &registries {
            for pkg in registry.load(&platform)? {
                packages.insert(pkg.name.clone(), pkg);
            }
        }

        let receipts = scan_receipts(&config)?;

        Ok(Self {
            config,
            platform,
            client,
            registries,
            packages,
            receipts,
        })
    }
}

/// A package directory without a readable receipt is treated as
/// not-installed.
fn scan_receipts(config: &Config) -> Result<BTreeMap<String, Receipt>> {
    let mut receipts = BTreeMap::new();
    for entry in std::fs::read_dir(&config.packages_dir)? {
        let entry = entry?;
        let receipt_path = entry.path().join(receipt::FILE_NAME);
        if !receipt_path.is_file() {
            continue;
        }
        match Receipt::from_file(&receipt_path) {
            Ok(receipt) => {
                receipts.insert(receipt.name.clone(), receipt);
            }
            Err(err) => {
                tracing::warn!(path = %receipt_path.display(), %err, "unreadable receipt, skipping")
            }
        }
    }
    Ok(receipts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_load_with_file_registry_and_receipt_scan() {
        let tmp = tempfile::tempdir().unwrap();

        let reg_pkg = tmp.path().join("registry/packages/tool");
        fs::create_dir_all(&reg_pkg).unwrap();
        fs::write(
            reg_pkg.join("package.yaml"),
            "name: tool\nsource:\n  id: pkg:npm/tool@1.0.0\n",
        )
        .unwrap();

        let config = Config::new(
            tmp.path().join("mason"),
            vec![format!("file:{}", tmp.path().join("registry").display())],
        );
        config.ensure_dirs().unwrap();

        // one installed package, one junk directory without a receipt
        let installed = config.packages_dir.join("tool");
        fs::create_dir_all(&installed).unwrap();
        fs::write(
            installed.join(receipt::FILE_NAME),
            r#"{"name":"tool","primary_source":{"id":"pkg:npm/tool@0.9.0"},"links":{"bin":{},"share":{},"opt":{}}}"#,
        )
        .unwrap();
        fs::create_dir_all(config.packages_dir.join("leftover")).unwrap();

        let platform = Platform::from_tags(["linux", "unix"]);
        let ctx = Context::load_with(config, platform).await.unwrap();

        assert_eq!(ctx.packages.len(), 1);
        assert!(ctx.packages.contains_key("tool"));
        assert_eq!(ctx.receipts.len(), 1);
        assert_eq!(ctx.receipts["tool"].primary_source.purl.version, "0.9.0");
    }

    #[tokio::test]
    async fn test_later_registry_wins_on_collision() {
        let tmp = tempfile::tempdir().unwrap();

        for (reg, version) in [("first", "1.0.0"), ("second", "2.0.0")] {
            let dir = tmp.path().join(reg).join("packages/tool");
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join("package.yaml"),
                format!("name: tool\nsource:\n  id: pkg:npm/tool@{version}\n"),
            )
            .unwrap();
        }

        let config = Config::new(
            tmp.path().join("mason"),
            vec![
                format!("file:{}", tmp.path().join("first").display()),
                format!("file:{}", tmp.path().join("second").display()),
            ],
        );
        let ctx = Context::load_with(config, Platform::from_tags(["unix"]))
            .await
            .unwrap();
        assert_eq!(ctx.packages["tool"].source.purl.version, "2.0.0");
    }
}
