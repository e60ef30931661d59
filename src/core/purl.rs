//! Package URL parsing.
//!
//! Every registry entry identifies its upstream source with a purl of the
//! form `pkg:type/namespace/name@version?qualifiers#subpath`. The parsed
//! value is immutable; the original string is kept verbatim for receipts.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PurlError {
    #[error("invalid purl '{0}': missing scheme")]
    MissingScheme(String),

    #[error("invalid purl '{0}': missing package type")]
    MissingType(String),

    #[error("invalid purl '{0}': missing package name")]
    MissingName(String),
}

/// A parsed package URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Purl {
    raw: String,
    pub scheme: String,
    pub ty: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub qualifiers: BTreeMap<String, String>,
    pub subpath: String,
}

impl Purl {
    pub fn parse(purl: &str) -> Result<Self, PurlError> {
        let mut remainder = purl;
        let mut parsed = Purl {
            raw: purl.to_string(),
            ..Purl::default()
        };

        if let Some((rest, subpath)) = remainder.rsplit_once('#') {
            remainder = rest;
            parsed.subpath = subpath
                .trim_matches('/')
                .split('/')
                .filter(|p| !p.is_empty() && *p != "." && *p != "..")
                .map(unquote)
                .collect::<Vec<_>>()
                .join("/");
        }

        if let Some((rest, query)) = remainder.rsplit_once('?') {
            remainder = rest;
            for pair in query.split('&') {
                if let Some((key, value)) = pair.split_once('=') {
                    if !value.is_empty() {
                        parsed.qualifiers.insert(key.to_lowercase(), unquote(value));
                    }
                }
            }
        }

        let Some((scheme, rest)) = remainder.split_once(':') else {
            return Err(PurlError::MissingScheme(purl.to_string()));
        };
        parsed.scheme = scheme.to_lowercase();
        remainder = rest;

        let remainder = remainder.trim_matches('/');
        let Some((ty, mut remainder)) = remainder.split_once('/') else {
            return Err(PurlError::MissingType(purl.to_string()));
        };
        parsed.ty = ty.to_lowercase();

        if let Some((rest, version)) = remainder.rsplit_once('@') {
            remainder = rest;
            parsed.version = unquote(version);
        }

        match remainder.rsplit_once('/') {
            Some((namespace, name)) => {
                parsed.name = unquote(name);
                parsed.namespace = namespace
                    .split('/')
                    .filter(|p| !p.is_empty())
                    .map(unquote)
                    .collect::<Vec<_>>()
                    .join("/");
            }
            None => parsed.name = unquote(remainder),
        }

        if parsed.name.is_empty() {
            return Err(PurlError::MissingName(purl.to_string()));
        }

        Ok(parsed)
    }

    /// The exact string this purl was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Purl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn unquote(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let purl = Purl::parse("pkg:pypi/black@24.3.0").unwrap();
        assert_eq!(purl.scheme, "pkg");
        assert_eq!(purl.ty, "pypi");
        assert_eq!(purl.namespace, "");
        assert_eq!(purl.name, "black");
        assert_eq!(purl.version, "24.3.0");
        assert_eq!(purl.as_str(), "pkg:pypi/black@24.3.0");
    }

    #[test]
    fn test_parse_namespace() {
        let purl = Purl::parse("pkg:github/rust-lang/rust-analyzer@2024-01-01").unwrap();
        assert_eq!(purl.ty, "github");
        assert_eq!(purl.namespace, "rust-lang");
        assert_eq!(purl.name, "rust-analyzer");
        assert_eq!(purl.version, "2024-01-01");
    }

    #[test]
    fn test_parse_multi_segment_namespace() {
        let purl = Purl::parse("pkg:golang/github.com/mvdan/gofumpt@v0.6.0").unwrap();
        assert_eq!(purl.namespace, "github.com/mvdan");
        assert_eq!(purl.name, "gofumpt");
    }

    #[test]
    fn test_parse_qualifiers_and_subpath() {
        let purl =
            Purl::parse("pkg:golang/golang.org/x/tools@v0.17.0?Locked=true#cmd/goimports").unwrap();
        assert_eq!(purl.qualifiers.get("locked"), Some(&"true".to_string()));
        assert_eq!(purl.subpath, "cmd/goimports");
    }

    #[test]
    fn test_empty_qualifier_values_are_dropped() {
        let purl = Purl::parse("pkg:cargo/ripgrep@14.1.0?features=&locked=true").unwrap();
        assert!(!purl.qualifiers.contains_key("features"));
        assert_eq!(purl.qualifiers.get("locked"), Some(&"true".to_string()));
    }

    #[test]
    fn test_percent_decoding() {
        let purl = Purl::parse("pkg:npm/%40angular/language-server@17.0.0").unwrap();
        assert_eq!(purl.namespace, "@angular");
        assert_eq!(purl.name, "language-server");
    }

    #[test]
    fn test_missing_pieces_error() {
        assert!(Purl::parse("no-scheme-here").is_err());
        assert!(Purl::parse("pkg:typeonly").is_err());
    }

    #[test]
    fn test_subpath_sanitised() {
        let purl = Purl::parse("pkg:golang/a/b@v1#/../cmd//tool/").unwrap();
        assert_eq!(purl.subpath, "cmd/tool");
    }
}
