//! Bundle catalog declaration and validation.
//!
//! A catalog lists the independently loadable bundles a host ships, one
//! container config per entry, plus loader tunables.
//!
//! # Invariants
//! - A validated catalog has at least one bundle.
//! - Bundle names are unique.
//! - Every entry converts into a valid `ContainerConfig`.

use crate::bundle::loader::LoaderOptions;
use crate::host::config::{ContainerConfig, ContainerConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

/// One bundle entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    /// Stable bundle name, e.g. `sample_a`.
    pub name: String,
    /// Asset id of the bundle file.
    pub asset: String,
    /// Root module the bundle registers.
    pub component: String,
}

impl BundleEntry {
    pub fn container_config(&self) -> ContainerConfig {
        ContainerConfig::new(self.asset.clone(), self.component.clone())
    }
}

/// Declarative list of loadable bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleCatalog {
    /// Host package name, informational.
    #[serde(default)]
    pub package: Option<String>,
    /// Deadline for one privileged load, in ms. `0` disables it; absent uses
    /// the loader default.
    #[serde(default)]
    pub load_timeout_ms: Option<u64>,
    pub bundles: Vec<BundleEntry>,
}

impl BundleCatalog {
    /// Parses and validates a catalog from JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Self =
            serde_json::from_str(raw).map_err(|err| CatalogError::Parse(err.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Reads, parses and validates a catalog file.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|err| CatalogError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.bundles.is_empty() {
            return Err(CatalogError::NoBundles);
        }
        let mut names = BTreeSet::new();
        for entry in &self.bundles {
            let name = entry.name.trim();
            if !is_valid_bundle_name(name) {
                return Err(CatalogError::InvalidName(entry.name.clone()));
            }
            if !names.insert(name.to_string()) {
                return Err(CatalogError::DuplicateName(name.to_string()));
            }
            entry
                .container_config()
                .validate()
                .map_err(|source| CatalogError::InvalidEntry {
                    name: name.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    pub fn entry(&self, name: &str) -> Option<&BundleEntry> {
        let name = name.trim();
        self.bundles.iter().find(|entry| entry.name.trim() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.bundles.iter().map(|entry| entry.name.trim()).collect()
    }

    pub fn loader_options(&self) -> LoaderOptions {
        match self.load_timeout_ms {
            None => LoaderOptions::default(),
            Some(0) => LoaderOptions { load_timeout: None },
            Some(ms) => LoaderOptions {
                load_timeout: Some(Duration::from_millis(ms)),
            },
        }
    }
}

fn is_valid_bundle_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Catalog load/validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    Io { path: String, message: String },
    Parse(String),
    NoBundles,
    InvalidName(String),
    DuplicateName(String),
    InvalidEntry {
        name: String,
        source: ContainerConfigError,
    },
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "failed to read catalog `{path}`: {message}"),
            Self::Parse(message) => write!(f, "catalog is not valid JSON: {message}"),
            Self::NoBundles => write!(f, "catalog must declare at least one bundle"),
            Self::InvalidName(value) => write!(f, "bundle name is invalid: `{value}`"),
            Self::DuplicateName(value) => write!(f, "bundle name declared twice: `{value}`"),
            Self::InvalidEntry { name, source } => write!(f, "bundle `{name}`: {source}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEntry { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BundleCatalog, CatalogError};
    use std::time::Duration;

    const SAMPLE: &str = r#"{
        "package": "com.example",
        "load_timeout_ms": 5000,
        "bundles": [
            { "name": "sample_a", "asset": "packagea/index.bundle", "component": "SampleA" },
            { "name": "sample_b", "asset": "packageb/index.bundle", "component": "SampleB" }
        ]
    }"#;

    #[test]
    fn parses_valid_catalog() {
        let catalog = BundleCatalog::from_json_str(SAMPLE).expect("valid catalog");
        assert_eq!(catalog.names(), vec!["sample_a", "sample_b"]);
        let entry = catalog.entry("sample_b").expect("sample_b entry");
        let config = entry.container_config();
        assert_eq!(config.script_asset_path, "packageb/index.bundle");
        assert_eq!(config.main_component_name, "SampleB");
        assert_eq!(
            catalog.loader_options().load_timeout,
            Some(Duration::from_millis(5000))
        );
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let raw = r#"{ "load_timeout_ms": 0,
            "bundles": [{ "name": "a", "asset": "a.bundle", "component": "A" }] }"#;
        let catalog = BundleCatalog::from_json_str(raw).expect("valid catalog");
        assert_eq!(catalog.loader_options().load_timeout, None);
    }

    #[test]
    fn rejects_empty_bundle_list() {
        let err = BundleCatalog::from_json_str(r#"{ "bundles": [] }"#).expect_err("empty");
        assert_eq!(err, CatalogError::NoBundles);
    }

    #[test]
    fn rejects_duplicate_names() {
        let raw = r#"{ "bundles": [
            { "name": "a", "asset": "a.bundle", "component": "A" },
            { "name": " a ", "asset": "b.bundle", "component": "B" }
        ] }"#;
        let err = BundleCatalog::from_json_str(raw).expect_err("duplicate");
        assert_eq!(err, CatalogError::DuplicateName("a".to_string()));
    }

    #[test]
    fn rejects_invalid_entries_and_unknown_fields() {
        let raw = r#"{ "bundles": [{ "name": "a", "asset": "/abs.bundle", "component": "A" }] }"#;
        assert!(matches!(
            BundleCatalog::from_json_str(raw),
            Err(CatalogError::InvalidEntry { .. })
        ));

        let raw = r#"{ "bundels": [] }"#;
        assert!(matches!(
            BundleCatalog::from_json_str(raw),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn rejects_uppercase_names() {
        let raw = r#"{ "bundles": [{ "name": "SampleA", "asset": "a.bundle", "component": "A" }] }"#;
        assert_eq!(
            BundleCatalog::from_json_str(raw),
            Err(CatalogError::InvalidName("SampleA".to_string()))
        );
    }
}
