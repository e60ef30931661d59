//! mason - a package manager for developer tooling
//!
//! Installs language servers, linters, formatters, and debug adapters into an
//! isolated per-package store by delegating to upstream ecosystems (cargo,
//! npm, pip, gem, ...), then exposes the artifacts through symlink and shim
//! layers under a shared `bin/`.

pub mod cmd;
pub mod config;
pub mod core;
pub mod io;
pub mod ops;
pub mod registry;
pub mod ui;

/// User agent sent with every HTTP request (GitHub rejects anonymous ones).
pub const USER_AGENT: &str = concat!("mason/", env!("CARGO_PKG_VERSION"));
