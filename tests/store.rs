//! End-to-end store scenarios over a temporary data directory.
//!
//! These exercise the full install state machine without touching the
//! network: a `file:` registry supplies the entries, and `generic` packages
//! with an empty download map plus a build script stand in for upstream
//! ecosystems.

#![cfg(unix)]

use std::fs;
use std::path::Path;

use mason::config::Config;
use mason::core::platform::Platform;
use mason::core::receipt::{Receipt, FILE_NAME};
use mason::ops::install;
use mason::ops::Context;

fn write_package_yaml(registry: &Path, name: &str, yaml: &str) {
    let dir = registry.join("packages").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("package.yaml"), yaml).unwrap();
}

async fn context_for(tmp: &Path, registry: &Path) -> Context {
    let config = Config::new(
        tmp.join("mason"),
        vec![format!("file:{}", registry.display())],
    );
    Context::load_with(config, Platform::from_tags(["linux", "linux_x64", "unix"]))
        .await
        .unwrap()
}

const HELLO_TOOL: &str = r#"
name: hello-tool
description: Test fixture
homepage: https://example.com
licenses:
  - MIT
categories:
  - Linter
source:
  id: pkg:generic/hello-tool@1.0.0
  download:
    files: {}
  build:
    run: |
      mkdir -p out doc
      printf '#!/bin/sh\necho hello\n' > out/hello
      echo docs > doc/readme.md
bin:
  hello: out/hello
share:
  hello-tool/: doc
"#;

#[tokio::test]
async fn test_install_creates_receipt_and_links() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = tmp.path().join("registry");
    write_package_yaml(&registry, "hello-tool", HELLO_TOOL);

    let ctx = context_for(tmp.path(), &registry).await;
    let pkg = &ctx.packages["hello-tool"];

    install::install_package(pkg, &ctx.config, &ctx.client)
        .await
        .unwrap();

    let pkg_dir = ctx.config.packages_dir.join("hello-tool");
    assert!(pkg_dir.join("out/hello").is_file());
    assert!(!ctx.config.staging_dir.join("hello-tool").exists());

    let receipt = Receipt::from_file(&pkg_dir.join(FILE_NAME)).unwrap();
    assert_eq!(receipt.name, "hello-tool");
    assert_eq!(receipt.primary_source.id, "pkg:generic/hello-tool@1.0.0");
    assert_eq!(receipt.links.bin["hello"], "out/hello");
    assert_eq!(receipt.links.share["hello-tool/readme.md"], "doc/readme.md");

    // every recorded link is a symlink into the package directory
    for (dest, src) in &receipt.links.bin {
        let link = ctx.config.bin_dir.join(dest);
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), pkg_dir.join(src));
    }
    for (dest, src) in &receipt.links.share {
        let link = ctx.config.share_dir.join(dest);
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), pkg_dir.join(src));
    }
}

#[tokio::test]
async fn test_failed_build_leaves_no_trace() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = tmp.path().join("registry");
    write_package_yaml(
        &registry,
        "broken-tool",
        r#"
name: broken-tool
source:
  id: pkg:generic/broken-tool@1.0.0
  download:
    files: {}
  build:
    run: exit 1
"#,
    );

    let ctx = context_for(tmp.path(), &registry).await;
    let pkg = &ctx.packages["broken-tool"];

    assert!(install::install_package(pkg, &ctx.config, &ctx.client)
        .await
        .is_err());
    assert!(!ctx.config.staging_dir.join("broken-tool").exists());
    assert!(!ctx.config.packages_dir.join("broken-tool").exists());
}

#[tokio::test]
async fn test_reinstalled_store_is_seen_as_installed() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = tmp.path().join("registry");
    write_package_yaml(&registry, "hello-tool", HELLO_TOOL);

    let ctx = context_for(tmp.path(), &registry).await;
    install::install_package(&ctx.packages["hello-tool"], &ctx.config, &ctx.client)
        .await
        .unwrap();

    // a fresh context over the same store picks up the receipt
    let ctx = context_for(tmp.path(), &registry).await;
    assert!(ctx.receipts.contains_key("hello-tool"));
    assert_eq!(
        ctx.receipts["hello-tool"].primary_source.purl.version,
        "1.0.0"
    );
}

#[tokio::test]
async fn test_uninstall_removes_links_then_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = tmp.path().join("registry");
    write_package_yaml(&registry, "hello-tool", HELLO_TOOL);

    let ctx = context_for(tmp.path(), &registry).await;
    install::install_package(&ctx.packages["hello-tool"], &ctx.config, &ctx.client)
        .await
        .unwrap();

    let ctx = context_for(tmp.path(), &registry).await;
    install::uninstall_package(&ctx.receipts["hello-tool"], &ctx.config).unwrap();

    assert!(!ctx.config.bin_dir.join("hello").exists());
    assert!(!ctx.config.share_dir.join("hello-tool/readme.md").exists());
    assert!(!ctx.config.packages_dir.join("hello-tool").exists());
}

#[tokio::test]
async fn test_upgrade_replaces_previous_version() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = tmp.path().join("registry");
    write_package_yaml(&registry, "hello-tool", HELLO_TOOL);

    let ctx = context_for(tmp.path(), &registry).await;
    install::install_package(&ctx.packages["hello-tool"], &ctx.config, &ctx.client)
        .await
        .unwrap();

    // registry moves to 2.0.0
    write_package_yaml(
        &registry,
        "hello-tool",
        &HELLO_TOOL.replace("@1.0.0", "@2.0.0"),
    );

    let ctx = context_for(tmp.path(), &registry).await;
    let pkg = &ctx.packages["hello-tool"];
    let previous = &ctx.receipts["hello-tool"];
    assert_ne!(
        pkg.source.purl.version,
        previous.primary_source.purl.version
    );

    install::upgrade_package(pkg, previous, &ctx.config, &ctx.client)
        .await
        .unwrap();

    let receipt =
        Receipt::from_file(&ctx.config.packages_dir.join("hello-tool").join(FILE_NAME)).unwrap();
    assert_eq!(receipt.primary_source.purl.version, "2.0.0");
    assert!(ctx
        .config
        .bin_dir
        .join("hello")
        .symlink_metadata()
        .unwrap()
        .file_type()
        .is_symlink());
    assert!(!ctx.config.staging_dir.join("hello-tool").exists());
}
