//! Entry resolution: raw registry entry to installable package.
//!
//! Order matters: newline cleanup, platform variant selection, purl parsing,
//! template expansion to a fixed point, then projection into the typed
//! [`Package`]. A sequence field with no matching variant drops the entry;
//! that is the caller's signal to skip it, not a load failure.

use serde_json::json;
use thiserror::Error;

use crate::core::package::{Asset, BuildScript, DownloadSource, Package, PackageSource};
use crate::core::platform::Platform;
use crate::core::purl::{Purl, PurlError};
use crate::core::template::{TemplateEngine, TemplateError, Value};
use crate::registry::entry::{OneOrMany, RegistryEntry, Targeted};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Purl(#[from] PurlError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("entry is not valid JSON after expansion: {0}")]
    Json(#[from] serde_json::Error),
}

/// Resolve one raw entry against the platform. `Ok(None)` means no variant
/// matched and the entry should be dropped.
pub fn resolve_entry(
    mut entry: RegistryEntry,
    platform: &Platform,
) -> Result<Option<Package>, ResolveError> {
    entry.description = entry.description.replace('\n', " ");

    if !select_variant(&mut entry.source.asset, platform)
        || !select_variant(&mut entry.source.build, platform)
        || !select_variant(&mut entry.source.download, platform)
    {
        return Ok(None);
    }

    let purl = Purl::parse(&entry.source.id)?;

    let mut ctx_json = serde_json::to_value(&entry)?;
    if let serde_json::Value::Object(map) = &mut ctx_json {
        map.insert("version".to_string(), json!(purl.version));
    }
    let ctx = Value::from_json(&ctx_json);

    let engine = TemplateEngine::new(platform);
    let rendered = engine.render_to_fixed_point(&serde_json::to_string(&entry)?, &ctx)?;
    let entry: RegistryEntry = serde_json::from_str(&rendered)?;

    Ok(Some(project(entry, purl)))
}

/// Collapse a variant sequence to its first platform match. False means no
/// variant matched.
fn select_variant<T: Targeted>(field: &mut Option<OneOrMany<T>>, platform: &Platform) -> bool {
    match field.take() {
        None => true,
        Some(OneOrMany::One(spec)) => {
            *field = Some(OneOrMany::One(spec));
            true
        }
        Some(OneOrMany::Many(variants)) => {
            match variants.into_iter().find(|v| v.matches(platform)) {
                Some(spec) => {
                    *field = Some(OneOrMany::One(spec));
                    true
                }
                None => false,
            }
        }
    }
}

fn project(entry: RegistryEntry, purl: Purl) -> Package {
    let source = entry.source;

    let asset = match source.asset {
        Some(OneOrMany::One(spec)) => spec.file.map(|file| Asset {
            files: file.into_vec(),
        }),
        _ => None,
    };

    let download = match source.download {
        Some(OneOrMany::One(spec)) => {
            if let Some(files) = spec.files {
                Some(DownloadSource::Files(files))
            } else {
                spec.file.map(DownloadSource::File)
            }
        }
        _ => None,
    };

    let build = match source.build {
        Some(OneOrMany::One(spec)) => spec.run.map(|run| BuildScript {
            run,
            env: spec
                .env
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect(),
        }),
        _ => None,
    };

    Package {
        name: entry.name,
        description: entry.description,
        homepage: entry.homepage,
        licenses: entry.licenses,
        languages: entry.languages,
        categories: entry.categories,
        deprecation: entry.deprecation,
        source: PackageSource {
            purl,
            asset,
            download,
            build,
            extra_packages: source.extra_packages.unwrap_or_default(),
        },
        bin: entry.bin.unwrap_or_default(),
        share: entry.share.unwrap_or_default(),
        opt: entry.opt.unwrap_or_default(),
    }
}
