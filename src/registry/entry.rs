//! Raw registry entry schema.
//!
//! `asset`, `build`, and `download` are polymorphic in registry data: either
//! a single object or an ordered list of variants distinguished by `target`
//! platform tags. They decode into typed variants once, up front; variant
//! selection and templating happen in [`crate::registry::resolve`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::platform::Platform;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub licenses: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation: Option<Deprecation>,
    pub source: EntrySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<OneOrMany<AssetSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<OneOrMany<BuildSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<OneOrMany<DownloadSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_packages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_overrides: Option<Vec<VersionOverride>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deprecation {
    pub message: String,
    #[serde(default)]
    pub since: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionOverride {
    pub constraint: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<OneOrMany<AssetSpec>>,
}

/// A single object or an ordered sequence of variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        }
    }

    fn as_slice(&self) -> &[String] {
        match self {
            StringOrList::One(s) => std::slice::from_ref(s),
            StringOrList::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<StringOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<StringOrList>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<StringOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<StringOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Targeted variants: anything carrying an optional `target` tag set.
pub trait Targeted {
    fn target(&self) -> Option<&StringOrList>;

    fn matches(&self, platform: &Platform) -> bool {
        match self.target() {
            Some(target) => platform.matches(target.as_slice()),
            None => false,
        }
    }
}

impl Targeted for AssetSpec {
    fn target(&self) -> Option<&StringOrList> {
        self.target.as_ref()
    }
}

impl Targeted for DownloadSpec {
    fn target(&self) -> Option<&StringOrList> {
        self.target.as_ref()
    }
}

impl Targeted for BuildSpec {
    fn target(&self) -> Option<&StringOrList> {
        self.target.as_ref()
    }
}
