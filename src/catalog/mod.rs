//! Test catalog loading and filtering
//!
//! A catalog declares the checks to run:
//!
//! ```toml
//! [[tests]]
//! module = "system"
//! name = "VerifyUptime"
//! tags = ["leaf"]
//!
//! [tests.inputs]
//! minimum = 86400
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::document::{load_document, DocumentError};
use crate::models::TestDefinition;
use crate::registry::TestRegistry;

pub mod filter;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("invalid catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("catalog entry {index} has an empty '{field}'")]
    EmptyField { index: usize, field: &'static str },
    #[error("invalid filter pattern '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    #[serde(default)]
    pub tests: Vec<TestDefinition>,
}

impl Catalog {
    pub fn new(tests: Vec<TestDefinition>) -> Self {
        Self { tests }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let catalog: Catalog = load_document(path)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        for (index, test) in self.tests.iter().enumerate() {
            if test.module.trim().is_empty() {
                return Err(CatalogError::EmptyField { index, field: "module" });
            }
            if test.name.trim().is_empty() {
                return Err(CatalogError::EmptyField { index, field: "name" });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Tests whose tags match any of `tags` and whose name (or
    /// `module/name`) matches any of `names`. Empty filter lists match all.
    pub fn select(&self, tags: &[String], names: &[String]) -> Result<Vec<TestDefinition>, CatalogError> {
        filter::validate_filters(tags)?;
        filter::validate_filters(names)?;

        let selected: Vec<TestDefinition> = self
            .tests
            .iter()
            .filter(|test| filter::any_matches(test.tags.iter().map(String::as_str), tags))
            .filter(|test| {
                let qualified = test.qualified_name();
                filter::any_matches([test.name.as_str(), qualified.as_str()], names)
            })
            .cloned()
            .collect();

        log::debug!("Selected {} of {} catalog tests", selected.len(), self.tests.len());
        Ok(selected)
    }

    /// `module/name` of every entry with no registered check
    pub fn unknown_checks(&self, registry: &TestRegistry) -> Vec<String> {
        self.tests
            .iter()
            .filter(|test| !registry.contains(&test.module, &test.name))
            .map(TestDefinition::qualified_name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const CATALOG: &str = r#"
[[tests]]
module = "system"
name = "VerifyUptime"
tags = ["leaf", "spine"]
categories = ["system"]

[tests.inputs]
minimum = 86400

[[tests]]
module = "software"
name = "VerifyEOSVersion"
tags = ["spine"]

[tests.inputs]
versions = ["4.31.1F"]

[[tests]]
module = "system"
name = "VerifyReloadCause"
"#;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn names(tests: &[TestDefinition]) -> Vec<&str> {
        tests.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = Catalog::from_toml_str(CATALOG).unwrap();

        assert_eq!(catalog.len(), 3);
        let uptime = &catalog.tests[0];
        assert_eq!(uptime.qualified_name(), "system/VerifyUptime");
        assert_eq!(uptime.inputs["minimum"], 86400);
        assert!(uptime.categories.contains("system"));
        assert!(catalog.tests[2].inputs.is_empty());
    }

    #[test]
    fn test_select_by_tags_and_names() {
        let catalog = Catalog::from_toml_str(CATALOG).unwrap();

        assert_eq!(catalog.select(&[], &[]).unwrap().len(), 3);
        assert_eq!(
            names(&catalog.select(&strings(&["spine"]), &[]).unwrap()),
            vec!["VerifyUptime", "VerifyEOSVersion"]
        );
        assert_eq!(
            names(&catalog.select(&strings(&["leaf"]), &[]).unwrap()),
            vec!["VerifyUptime"]
        );
        assert_eq!(
            names(&catalog.select(&[], &strings(&["system/*"])).unwrap()),
            vec!["VerifyUptime", "VerifyReloadCause"]
        );
        assert_eq!(
            names(&catalog.select(&strings(&["sp*"]), &strings(&["VerifyEOSVersion"])).unwrap()),
            vec!["VerifyEOSVersion"]
        );
        assert!(catalog.select(&strings(&["border"]), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_select_rejects_invalid_pattern() {
        let catalog = Catalog::from_toml_str(CATALOG).unwrap();
        assert!(matches!(
            catalog.select(&[], &strings(&["Verify[Up"])),
            Err(CatalogError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_empty_fields_rejected() {
        let err = Catalog::from_toml_str("[[tests]]\nmodule = \"system\"\nname = \"\"\n").unwrap_err();
        assert!(matches!(err, CatalogError::EmptyField { index: 0, field: "name" }));
    }

    #[test]
    fn test_unknown_checks() {
        let registry = TestRegistry::with_builtin_checks().unwrap();
        let catalog = Catalog::from_toml_str(
            "[[tests]]\nmodule = \"system\"\nname = \"VerifyUptime\"\n\n[[tests]]\nmodule = \"bgp\"\nname = \"VerifyBGPPeers\"\n",
        )
        .unwrap();

        assert_eq!(catalog.unknown_checks(&registry), vec!["bgp/VerifyBGPPeers"]);
    }

    #[test]
    fn test_load_json_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"{"tests": [{"module": "software", "name": "VerifyEOSVersion", "inputs": {"versions": ["4.31.1F"]}}]}"#,
        )
        .unwrap();

        let catalog = Catalog::load_from_file(&path).unwrap();
        assert_eq!(catalog.tests[0].inputs["versions"][0], "4.31.1F");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = Catalog::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CatalogError::Document(DocumentError::Io { .. })));
    }
}
