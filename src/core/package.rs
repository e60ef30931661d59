//! Resolved package descriptors.
//!
//! A [`Package`] is the typed view of a registry entry after platform
//! selection and template expansion. It knows how to materialise itself into
//! a directory (delegating to the upstream ecosystem named by its purl), run
//! its build script, and wire its artifacts into the shared `bin/`, `share/`
//! and `opt/` trees.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use reqwest::Client;
use thiserror::Error;

use crate::core::platform::select_by_os;
use crate::core::purl::Purl;
use crate::io::download::{download_file, download_github_release, DownloadError};
use crate::io::extract::{extract, is_extractable, ExtractError};
use crate::io::symlink;
use crate::registry::entry::Deprecation;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("packages of type '{0}' are not implemented")]
    Unsupported(String),

    #[error("launchers of kind '{0}' are not implemented")]
    UnsupportedLauncher(String),

    #[error("package '{0}' has no usable download source")]
    MissingDownload(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with status {code:?}")]
    CommandFailed { program: String, code: Option<i32> },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A fully resolved package, ready to install.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub name: String,
    pub description: String,
    pub homepage: String,
    pub licenses: Vec<String>,
    pub languages: Vec<String>,
    pub categories: Vec<String>,
    pub deprecation: Option<Deprecation>,
    pub source: PackageSource,
    pub bin: BTreeMap<String, String>,
    pub share: BTreeMap<String, String>,
    pub opt: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageSource {
    pub purl: Purl,
    pub asset: Option<Asset>,
    pub download: Option<DownloadSource>,
    pub build: Option<BuildScript>,
    pub extra_packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub files: Vec<String>,
}

/// Either a single named file or a destination-path to URL mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadSource {
    File(String),
    Files(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildScript {
    pub run: String,
    /// `K=V` environment additions.
    pub env: Vec<String>,
}

/// Launcher kinds whose bin source is a generated shim script.
const SHIM_KINDS: &[&str] = &[
    "dotnet", "exec", "gem", "java-jar", "node", "php", "python", "pyvenv", "ruby",
];

impl Package {
    /// Fetch the package contents into `dir`, dispatching on the purl type.
    ///
    /// Upstream tools run with `dir` as their working directory and inherit
    /// stdout/stderr; direct downloads land in `dir` and extractable
    /// archives are expanded in place.
    pub async fn download(&self, dir: &Path, client: &Client) -> Result<(), PackageError> {
        let purl = &self.source.purl;
        let name = purl.name.as_str();
        let namespace = purl.namespace.as_str();
        let version = purl.version.as_str();
        let qualifiers = &purl.qualifiers;

        match purl.ty.as_str() {
            "cargo" => {
                let mut cmd = command(&["cargo", "install", "--root", "."]);
                if let Some(repo_url) = qualifiers.get("repository_url") {
                    cmd.extend(["--git".to_string(), repo_url.clone()]);
                    if qualifiers.get("rev").map(String::as_str) == Some("true") {
                        cmd.extend(["--rev".to_string(), version.to_string()]);
                    } else {
                        cmd.extend(["--tag".to_string(), version.to_string()]);
                    }
                } else {
                    cmd.extend(["--version".to_string(), version.to_string()]);
                }
                if let Some(features) = qualifiers.get("features") {
                    cmd.extend(["--features".to_string(), features.clone()]);
                }
                if qualifiers.get("locked").map(String::as_str) == Some("true") {
                    cmd.push("--locked".to_string());
                }
                cmd.push(name.to_string());
                run_tool(dir, &cmd, &[])?;
            }

            "composer" => {
                run_tool(
                    dir,
                    &command(&["composer", "init", "--no-interaction", "--stability=stable"]),
                    &[],
                )?;
                run_tool(
                    dir,
                    &command(&[
                        "composer",
                        "require",
                        &format!("{namespace}/{name}:{version}"),
                    ]),
                    &[],
                )?;
            }

            "gem" => {
                run_tool(
                    dir,
                    &command(&[
                        "gem",
                        "install",
                        "--no-user-install",
                        "--no-format-executable",
                        "--install-dir=.",
                        "--bindir=bin",
                        "--no-document",
                        &format!("{name}:{version}"),
                    ]),
                    &[("GEM_HOME".to_string(), dir.display().to_string())],
                )?;
            }

            "generic" => {
                let Some(DownloadSource::Files(files)) = &self.source.download else {
                    return Err(PackageError::MissingDownload(self.name.clone()));
                };
                for (out_rel, url) in files {
                    let out_path = dir.join(out_rel);
                    if let Some(parent) = out_path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    download_file(client, url, &out_path).await?;
                    if is_extractable(&out_path) {
                        extract(&out_path, dir)?;
                        fs::remove_file(&out_path)?;
                    }
                }
            }

            "github" => {
                let repo = format!("{namespace}/{name}");
                if let Some(asset) = &self.source.asset {
                    for file in &asset.files {
                        self.download_github_asset(dir, client, &repo, version, file)
                            .await?;
                    }
                } else {
                    run_tool(
                        dir,
                        &command(&[
                            "git",
                            "clone",
                            "--depth=1",
                            &format!("https://github.com/{repo}.git"),
                            &dir.display().to_string(),
                        ]),
                        &[],
                    )?;
                    run_tool(
                        dir,
                        &command(&["git", "fetch", "--depth=1", "--tags", "origin", version]),
                        &[],
                    )?;
                    run_tool(dir, &command(&["git", "checkout", version]), &[])?;
                }
            }

            "golang" => {
                let mut target = format!("{namespace}/{name}");
                if !purl.subpath.is_empty() {
                    target = format!("{target}/{}", purl.subpath);
                }
                run_tool(
                    dir,
                    &command(&["go", "install", "-v", &format!("{target}@{version}")]),
                    &[("GOBIN".to_string(), dir.display().to_string())],
                )?;
            }

            "luarocks" => {
                let mut cmd = command(&["luarocks", "install", "--tree", "."]);
                if let Some(repo_url) = qualifiers.get("repository_url") {
                    cmd.extend(["--server".to_string(), repo_url.clone()]);
                }
                if qualifiers.get("dev").map(String::as_str) == Some("true") {
                    cmd.push("--dev".to_string());
                }
                cmd.extend([name.to_string(), version.to_string()]);
                run_tool(dir, &cmd, &[])?;
            }

            "npm" => {
                let target = if namespace.is_empty() {
                    format!("{name}@{version}")
                } else {
                    format!("{namespace}/{name}@{version}")
                };
                fs::write(dir.join(".npmrc"), "install-strategy=shallow")?;
                run_tool(dir, &command(&["npm", "init", "--yes", "--scope=mason"]), &[])?;
                let mut cmd = command(&["npm", "install", &target]);
                cmd.extend(self.source.extra_packages.iter().cloned());
                run_tool(dir, &cmd, &[])?;
            }

            "nuget" => {
                run_tool(
                    dir,
                    &command(&[
                        "dotnet", "tool", "update", "--tool-path", ".", "--version", version, name,
                    ]),
                    &[],
                )?;
            }

            "opam" => {
                run_tool(
                    dir,
                    &command(&[
                        "opam",
                        "install",
                        "--destdir=.",
                        "--yes",
                        "--verbose",
                        &format!("{name}.{version}"),
                    ]),
                    &[],
                )?;
            }

            "openvsx" => {
                let Some(DownloadSource::File(file)) = &self.source.download else {
                    return Err(PackageError::MissingDownload(self.name.clone()));
                };
                let out_path = dir.join(file);
                let url = format!(
                    "https://open-vsx.org/api/{namespace}/{name}/{version}/file/{file}"
                );
                download_file(client, &url, &out_path).await?;
                extract(&out_path, dir)?;
                fs::remove_file(&out_path)?;
            }

            "pypi" => {
                run_tool(
                    dir,
                    &command(&[
                        select_by_os("python3", "python"),
                        "-m",
                        "venv",
                        "venv",
                        "--system-site-packages",
                    ]),
                    &[],
                )?;
                let venv_python = dir
                    .join("venv")
                    .join(select_by_os("bin", "Scripts"))
                    .join(select_by_os("python", "python.exe"));
                let extras = qualifiers
                    .get("extra")
                    .map(|e| format!("[{e}]"))
                    .unwrap_or_default();
                let mut cmd = vec![
                    venv_python.display().to_string(),
                    "-m".to_string(),
                    "pip".to_string(),
                    "--disable-pip-version-check".to_string(),
                    "install".to_string(),
                    "--ignore-installed".to_string(),
                    "-U".to_string(),
                    format!("{name}{extras}=={version}"),
                ];
                cmd.extend(self.source.extra_packages.iter().cloned());
                run_tool(dir, &cmd, &[])?;
            }

            other => return Err(PackageError::Unsupported(other.to_string())),
        }

        Ok(())
    }

    async fn download_github_asset(
        &self,
        dir: &Path,
        client: &Client,
        repo: &str,
        version: &str,
        file: &str,
    ) -> Result<(), PackageError> {
        let (out_dir, out_path) = if let Some((source, dest)) = file.split_once(':') {
            if dest.ends_with('/') {
                let out_dir = dir.join(dest);
                fs::create_dir_all(&out_dir)?;
                download_github_release(client, repo, source, Some(version), &out_dir).await?;
                let out_path = out_dir.join(source);
                (out_dir, out_path)
            } else {
                download_github_release(client, repo, source, Some(version), dir).await?;
                let out_path = dir.join(dest);
                fs::rename(dir.join(source), &out_path)?;
                (dir.to_path_buf(), out_path)
            }
        } else {
            download_github_release(client, repo, file, Some(version), dir).await?;
            (dir.to_path_buf(), dir.join(file))
        };

        if is_extractable(&out_path) {
            extract(&out_path, &out_dir)?;
            fs::remove_file(&out_path)?;
        }
        Ok(())
    }

    /// Run the entry's build script, if any, inside `dir`.
    pub fn build(&self, dir: &Path) -> Result<(), PackageError> {
        let Some(build) = &self.source.build else {
            return Ok(());
        };

        let env: Vec<(String, String)> = build
            .env
            .iter()
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let cmd = select_by_os(
            vec![
                "bash".to_string(),
                "-c".to_string(),
                format!("set -euxo pipefail;\n{}", build.run),
            ],
            vec![
                "powershell".to_string(),
                "-Command".to_string(),
                format!(
                    "$ErrorActionPreference='Stop'; $ProgressPreference='SilentlyContinue'; \
                     [Net.ServicePointManager]::SecurityProtocol=[Net.SecurityProtocolType]::Tls12; {}",
                    build.run
                ),
            ],
        );
        run_tool(dir, &cmd, &env)
    }

    /// Map every bin entry to its in-package source path, rewriting launcher
    /// directives (`kind:target`) per ecosystem conventions.
    pub fn resolve_bin(&self) -> Result<BTreeMap<String, String>, PackageError> {
        self.bin
            .iter()
            .map(|(dest, src)| Ok((dest.clone(), resolve_bin_source(dest, src)?)))
            .collect()
    }

    /// Create every symlink (and shim) this package exposes.
    pub fn link(
        &self,
        dir: &Path,
        bin_dir: &Path,
        share_dir: &Path,
        opt_dir: &Path,
    ) -> Result<(), PackageError> {
        for (dest, raw_src) in &self.bin {
            let resolved = resolve_bin_source(dest, raw_src)?;
            if let Some((kind, target)) = raw_src.split_once(':') {
                if SHIM_KINDS.contains(&kind) {
                    self.write_launcher(dir, &resolved, kind, target)?;
                }
            }
            let source = dir.join(&resolved);
            set_executable(&source)?;
            symlink::create(&source, &bin_dir.join(dest))?;
        }

        for (dest, src) in &self.share {
            link_tree(&dir.join(src), &share_dir.join(dest))?;
        }
        for (dest, src) in &self.opt {
            link_tree(&dir.join(src), &opt_dir.join(dest))?;
        }

        Ok(())
    }

    /// Remove every symlink [`Package::link`] would create. Idempotent:
    /// only symbolic links are deleted and missing entries are skipped.
    pub fn unlink(
        &self,
        dir: &Path,
        bin_dir: &Path,
        share_dir: &Path,
        opt_dir: &Path,
    ) -> Result<(), PackageError> {
        for dest in self.resolve_bin()?.keys() {
            symlink::remove(&bin_dir.join(dest))?;
        }
        for (dest, src) in &self.share {
            unlink_tree(&dir.join(src), &share_dir.join(dest))?;
        }
        for (dest, src) in &self.opt {
            unlink_tree(&dir.join(src), &opt_dir.join(dest))?;
        }
        Ok(())
    }

    /// Materialise the launcher script for a shim-kind bin entry.
    ///
    /// The script is written at the resolved source path (inside the package
    /// directory) before the symlink pointing at it is created.
    fn write_launcher(
        &self,
        dir: &Path,
        resolved: &str,
        kind: &str,
        target: &str,
    ) -> Result<(), PackageError> {
        let mut env: Vec<(String, String)> = Vec::new();

        let cmd = match kind {
            "dotnet" => format!("dotnet \"{}\"", dir.join(target).display()),
            "exec" => {
                let target_path = dir.join(target);
                set_executable(&target_path)?;
                target_path.display().to_string()
            }
            "gem" => {
                env.push((
                    "GEM_PATH".to_string(),
                    format!(
                        "{}{}",
                        dir.display(),
                        select_by_os(":$GEM_PATH", ";%GEM_PATH%")
                    ),
                ));
                dir.join("bin")
                    .join(select_by_os(target.to_string(), format!("{target}.bat")))
                    .display()
                    .to_string()
            }
            "java-jar" => format!("java -jar \"{}\"", dir.join(target).display()),
            "node" => format!("node \"{}\"", dir.join(target).display()),
            "php" => format!("php \"{}\"", dir.join(target).display()),
            "python" => format!(
                "{} \"{}\"",
                select_by_os("python3", "python"),
                dir.join(target).display()
            ),
            "pyvenv" => format!(
                "{} -m {target}",
                dir.join("venv")
                    .join(select_by_os("bin", "Scripts"))
                    .join(select_by_os("python", "python.exe"))
                    .display()
            ),
            "ruby" => format!("ruby \"{}\"", dir.join(target).display()),
            other => return Err(PackageError::UnsupportedLauncher(other.to_string())),
        };

        let env_lines = env
            .iter()
            .map(|(k, v)| format!("{} {k}={v}", select_by_os("export", "SET")))
            .collect::<Vec<_>>()
            .join("\n");

        let script = select_by_os(
            format!("#!/usr/bin/env bash\n{env_lines}\nexec {cmd} \"$@\"\n"),
            format!("@ECHO off\n{env_lines}\n{cmd} %*\n"),
        );

        let path = dir.join(resolved);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, script)?;
        set_executable(&path)?;
        Ok(())
    }
}

fn resolve_bin_source(dest: &str, src: &str) -> Result<String, PackageError> {
    let Some((kind, target)) = src.split_once(':') else {
        return Ok(src.to_string());
    };

    Ok(match kind {
        k if SHIM_KINDS.contains(&k) => select_by_os(dest.to_string(), format!("{dest}.cmd")),
        "cargo" => select_by_os(format!("bin/{target}"), format!("bin/{target}.exe")),
        "composer" => select_by_os(
            format!("vendor/bin/{target}"),
            format!("vendor/bin/{target}.bat"),
        ),
        "golang" => select_by_os(target.to_string(), format!("{target}.exe")),
        "luarocks" => select_by_os(format!("bin/{target}"), format!("bin/{target}.bat")),
        "npm" => select_by_os(
            format!("node_modules/.bin/{target}"),
            format!("node_modules/.bin/{target}.cmd"),
        ),
        "nuget" => select_by_os(target.to_string(), format!("{target}.exe")),
        "opam" => select_by_os(format!("bin/{target}"), format!("bin/{target}.exe")),
        "pypi" => select_by_os(
            format!("venv/bin/{target}"),
            format!("venv/Scripts/{target}.exe"),
        ),
        other => return Err(PackageError::UnsupportedLauncher(other.to_string())),
    })
}

fn link_tree(source: &Path, dest: &Path) -> Result<(), PackageError> {
    for (leaf_dest, leaf_src) in symlink::resolve(source, dest)? {
        symlink::create(&leaf_src, &leaf_dest)?;
    }
    Ok(())
}

fn unlink_tree(source: &Path, dest: &Path) -> Result<(), PackageError> {
    if source.symlink_metadata().is_err() {
        return Ok(());
    }
    for leaf_dest in symlink::resolve(source, dest)?.into_keys() {
        symlink::remove(&leaf_dest)?;
    }
    Ok(())
}

fn command(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn run_tool(dir: &Path, cmd: &[String], env: &[(String, String)]) -> Result<(), PackageError> {
    let Some((program, args)) = cmd.split_first() else {
        return Err(PackageError::CommandFailed {
            program: String::new(),
            code: None,
        });
    };

    tracing::debug!(%program, ?args, dir = %dir.display(), "running");
    let status = Command::new(program)
        .args(args)
        .current_dir(dir)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .status()
        .map_err(|source| PackageError::Spawn {
            program: program.clone(),
            source,
        })?;

    if !status.success() {
        return Err(PackageError::CommandFailed {
            program: program.clone(),
            code: status.code(),
        });
    }
    Ok(())
}

fn set_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::purl::Purl;

    fn fake_package(bin: &[(&str, &str)]) -> Package {
        Package {
            name: "tool".to_string(),
            description: String::new(),
            homepage: String::new(),
            licenses: vec![],
            languages: vec![],
            categories: vec![],
            deprecation: None,
            source: PackageSource {
                purl: Purl::parse("pkg:pypi/tool@1.0.0").unwrap(),
                asset: None,
                download: None,
                build: None,
                extra_packages: vec![],
            },
            bin: bin
                .iter()
                .map(|(d, s)| (d.to_string(), s.to_string()))
                .collect(),
            share: BTreeMap::new(),
            opt: BTreeMap::new(),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_bin_rewrites_launcher_directives() {
        let pkg = fake_package(&[
            ("rg", "cargo:rg"),
            ("prettier", "npm:prettier"),
            ("black", "pypi:black"),
            ("mod", "pyvenv:mod"),
            ("plain", "out/plain"),
            ("fmt", "golang:fmt"),
            ("lint", "luarocks:lint"),
            ("srv", "opam:srv"),
            ("csfix", "composer:csfix"),
            ("tool", "nuget:tool"),
        ]);
        let resolved = pkg.resolve_bin().unwrap();
        assert_eq!(resolved["rg"], "bin/rg");
        assert_eq!(resolved["prettier"], "node_modules/.bin/prettier");
        assert_eq!(resolved["black"], "venv/bin/black");
        assert_eq!(resolved["mod"], "mod");
        assert_eq!(resolved["plain"], "out/plain");
        assert_eq!(resolved["fmt"], "fmt");
        assert_eq!(resolved["lint"], "bin/lint");
        assert_eq!(resolved["srv"], "bin/srv");
        assert_eq!(resolved["csfix"], "vendor/bin/csfix");
        assert_eq!(resolved["tool"], "tool");
    }

    #[test]
    fn test_resolve_bin_unknown_kind_errors() {
        let pkg = fake_package(&[("x", "mystery:x")]);
        assert!(matches!(
            pkg.resolve_bin(),
            Err(PackageError::UnsupportedLauncher(_))
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_link_writes_pyvenv_shim_and_symlink() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg_dir = tmp.path().join("packages/black");
        let bin_dir = tmp.path().join("bin");
        fs::create_dir_all(&pkg_dir).unwrap();
        fs::create_dir_all(&bin_dir).unwrap();

        let pkg = fake_package(&[("black", "pyvenv:black")]);
        pkg.link(&pkg_dir, &bin_dir, tmp.path(), tmp.path()).unwrap();

        let shim = fs::read_to_string(pkg_dir.join("black")).unwrap();
        assert!(shim.starts_with("#!/usr/bin/env bash\n"));
        assert!(shim.contains(&format!(
            "exec {} -m black \"$@\"",
            pkg_dir.join("venv/bin/python").display()
        )));

        let link = bin_dir.join("black");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), pkg_dir.join("black"));

        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(pkg_dir.join("black")).unwrap().permissions().mode();
        assert_eq!(mode & 0o755, 0o755);
    }

    #[test]
    #[cfg(unix)]
    fn test_gem_shim_exports_gem_path() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg_dir = tmp.path().join("packages/rubocop");
        let bin_dir = tmp.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        fs::create_dir_all(pkg_dir.join("bin")).unwrap();

        let pkg = fake_package(&[("rubocop", "gem:rubocop")]);
        pkg.link(&pkg_dir, &bin_dir, tmp.path(), tmp.path()).unwrap();

        let shim = fs::read_to_string(pkg_dir.join("rubocop")).unwrap();
        assert!(shim.contains(&format!("export GEM_PATH={}:$GEM_PATH", pkg_dir.display())));
        assert!(shim.contains(&format!("exec {} \"$@\"", pkg_dir.join("bin/rubocop").display())));
    }

    #[test]
    #[cfg(unix)]
    fn test_link_and_unlink_share_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg_dir = tmp.path().join("packages/tool");
        let share_dir = tmp.path().join("share");
        fs::create_dir_all(pkg_dir.join("data/nested")).unwrap();
        fs::create_dir_all(&share_dir).unwrap();
        fs::write(pkg_dir.join("data/a.json"), "{}").unwrap();
        fs::write(pkg_dir.join("data/nested/b.json"), "{}").unwrap();

        let mut pkg = fake_package(&[]);
        pkg.share.insert("tool/".to_string(), "data".to_string());

        pkg.link(&pkg_dir, tmp.path(), &share_dir, tmp.path()).unwrap();
        assert!(share_dir.join("tool/a.json").symlink_metadata().unwrap().file_type().is_symlink());
        assert!(share_dir.join("tool/nested/b.json").exists());

        pkg.unlink(&pkg_dir, tmp.path(), &share_dir, tmp.path()).unwrap();
        assert!(!share_dir.join("tool/a.json").exists());
        assert!(!share_dir.join("tool/nested/b.json").exists());
        // repeated unlink is a no-op
        pkg.unlink(&pkg_dir, tmp.path(), &share_dir, tmp.path()).unwrap();
    }

    #[test]
    fn test_build_without_script_is_noop() {
        let pkg = fake_package(&[]);
        let tmp = tempfile::tempdir().unwrap();
        pkg.build(tmp.path()).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_build_runs_script_with_env() {
        let tmp = tempfile::tempdir().unwrap();
        let mut pkg = fake_package(&[]);
        pkg.source.build = Some(BuildScript {
            run: "echo \"$MARKER\" > out.txt".to_string(),
            env: vec!["MARKER=hello".to_string()],
        });
        pkg.build(tmp.path()).unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("out.txt")).unwrap().trim(), "hello");
    }

    #[test]
    #[cfg(unix)]
    fn test_build_failure_surfaces() {
        let tmp = tempfile::tempdir().unwrap();
        let mut pkg = fake_package(&[]);
        pkg.source.build = Some(BuildScript {
            run: "exit 3".to_string(),
            env: vec![],
        });
        assert!(matches!(
            pkg.build(tmp.path()),
            Err(PackageError::CommandFailed { code: Some(3), .. })
        ));
    }
}
