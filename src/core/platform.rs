//! Host platform tags.
//!
//! Registry entries select their variants with tags like `linux_x64_gnu` or
//! `darwin_arm64`. The set for the running host is computed once at startup
//! and threaded through registry loading and template evaluation, so tests
//! can substitute an arbitrary tag set.

use std::collections::BTreeSet;
use std::process::Command;

/// The set of platform tags recognised for a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    tags: BTreeSet<String>,
}

impl Platform {
    /// Probe the running host.
    pub fn current() -> Self {
        let os = std::env::consts::OS;
        let libc = if os == "linux" { detect_libc() } else { None };
        Self::probe(os, std::env::consts::ARCH, libc)
    }

    /// Build a platform from an explicit tag set.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    fn probe(os: &str, arch: &str, libc: Option<&str>) -> Self {
        let arch = normalize_arch(arch);
        let mut tags = BTreeSet::new();

        match os {
            "windows" => {
                tags.insert("win".to_string());
                tags.insert(format!("win_{arch}"));
            }
            "macos" => {
                tags.insert("unix".to_string());
                tags.insert("darwin".to_string());
                tags.insert(format!("darwin_{arch}"));
            }
            "linux" => {
                tags.insert("unix".to_string());
                tags.insert("linux".to_string());
                tags.insert(format!("linux_{arch}"));
                if let Some(libc) = libc {
                    tags.insert(format!("linux_{arch}_{libc}"));
                }
            }
            _ => {
                tags.insert("unix".to_string());
            }
        }

        Self { tags }
    }

    /// True if any of `targets` names a tag of this platform.
    pub fn matches<S: AsRef<str>>(&self, targets: &[S]) -> bool {
        targets.iter().any(|t| self.tags.contains(t.as_ref()))
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }
}

/// Pick a value by host OS family.
pub fn select_by_os<T>(unix: T, windows: T) -> T {
    if cfg!(windows) {
        windows
    } else {
        unix
    }
}

fn normalize_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "x86" => "x86",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Identify the system libc by asking the system itself.
///
/// `getconf GNU_LIBC_VERSION` answers on glibc hosts; `ldd --version` is the
/// fallback and also identifies musl. Neither answering leaves the libc tag
/// off entirely.
fn detect_libc() -> Option<&'static str> {
    if let Ok(out) = Command::new("getconf").arg("GNU_LIBC_VERSION").output() {
        if out.status.success() && String::from_utf8_lossy(&out.stdout).contains("glibc") {
            return Some("gnu");
        }
    }

    if let Ok(out) = Command::new("ldd").arg("--version").output() {
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
        if text.contains("musl") {
            return Some("musl");
        }
        if text.contains("glibc") || text.contains("GNU") {
            return Some("gnu");
        }
    }

    None
}
