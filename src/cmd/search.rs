//! Search command.

use anyhow::Result;

use crate::core::package::Package;
use crate::ops::Context;

pub fn run(
    ctx: &Context,
    query: Option<&str>,
    category: Option<&str>,
    language: Option<&str>,
) -> Result<()> {
    let query = query.unwrap_or_default().to_lowercase();

    for pkg in ctx.packages.values() {
        if !matches(pkg, &query, category, language) {
            continue;
        }

        println!("{}  {}", pkg.name, pkg.source.purl.version);
        if let Some(deprecation) = &pkg.deprecation {
            println!("    Deprecation: {}", deprecation.message);
        }
        println!("    Description: {}", pkg.description);
        println!("    Homepage: {}", pkg.homepage);
        println!("    Categories: {}", pkg.categories.join(", "));
        if !pkg.languages.is_empty() {
            println!("    Languages: {}", pkg.languages.join(", "));
        }
        println!("    Licenses: {}\n", pkg.licenses.join(", "));
    }

    Ok(())
}

fn matches(pkg: &Package, query: &str, category: Option<&str>, language: Option<&str>) -> bool {
    if let Some(category) = category {
        if !pkg.categories.iter().any(|c| c.eq_ignore_ascii_case(category)) {
            return false;
        }
    }
    if let Some(language) = language {
        if !pkg.languages.iter().any(|l| l.eq_ignore_ascii_case(language)) {
            return false;
        }
    }
    pkg.name.to_lowercase().contains(query) || pkg.description.to_lowercase().contains(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::core::package::PackageSource;
    use crate::core::purl::Purl;

    fn pkg(name: &str, description: &str, categories: &[&str], languages: &[&str]) -> Package {
        Package {
            name: name.to_string(),
            description: description.to_string(),
            homepage: String::new(),
            licenses: vec![],
            languages: languages.iter().map(|s| s.to_string()).collect(),
            categories: categories.iter().map(|s| s.to_string()).collect(),
            deprecation: None,
            source: PackageSource {
                purl: Purl::parse(&format!("pkg:npm/{name}@1.0.0")).unwrap(),
                asset: None,
                download: None,
                build: None,
                extra_packages: vec![],
            },
            bin: BTreeMap::new(),
            share: BTreeMap::new(),
            opt: BTreeMap::new(),
        }
    }

    #[test]
    fn test_query_matches_name_or_description() {
        let p = pkg("rust-analyzer", "Language server for Rust", &["LSP"], &["Rust"]);
        assert!(matches(&p, "analyzer", None, None));
        assert!(matches(&p, "language server", None, None));
        assert!(matches(&p, "", None, None));
        assert!(!matches(&p, "python", None, None));
    }

    #[test]
    fn test_category_and_language_filters() {
        let p = pkg("black", "Python formatter", &["Formatter"], &["Python"]);
        assert!(matches(&p, "", Some("formatter"), None));
        assert!(!matches(&p, "", Some("linter"), None));
        assert!(matches(&p, "", None, Some("PYTHON")));
        assert!(!matches(&p, "", None, Some("Rust")));
        assert!(matches(&p, "black", Some("Formatter"), Some("python")));
    }
}
