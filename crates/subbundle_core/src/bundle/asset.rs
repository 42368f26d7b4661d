//! Script asset identifiers and their source locators.
//!
//! # Invariants
//! - An `AssetId` is always validated; invalid ids cannot be constructed.
//! - `source_url()` is a pure function of the id.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Scheme prefix prepended to an asset id to form its load locator.
pub const ASSET_SOURCE_SCHEME: &str = "assets://";

const MAX_ASSET_ID_BYTES: usize = 256;

static ASSET_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._/\-]*$").expect("valid asset id regex"));

/// Name of one independently loadable script bundle, e.g. `packagea/index.bundle`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId(String);

impl AssetId {
    /// Parses and validates one asset id. Surrounding whitespace is trimmed.
    pub fn parse(value: &str) -> Result<Self, AssetIdError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AssetIdError::Empty);
        }
        if trimmed.len() > MAX_ASSET_ID_BYTES {
            return Err(AssetIdError::TooLong(trimmed.len()));
        }
        if !ASSET_ID_RE.is_match(trimmed) {
            return Err(AssetIdError::InvalidCharacters(trimmed.to_string()));
        }
        if trimmed.split('/').any(|segment| segment == ".." || segment.is_empty()) {
            return Err(AssetIdError::InvalidPath(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Locator handed to the runtime's privileged load call.
    pub fn source_url(&self) -> String {
        format!("{ASSET_SOURCE_SCHEME}{}", self.0)
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Asset id validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetIdError {
    Empty,
    TooLong(usize),
    InvalidCharacters(String),
    InvalidPath(String),
}

impl Display for AssetIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "asset id must not be empty"),
            Self::TooLong(len) => write!(
                f,
                "asset id is {len} bytes; at most {MAX_ASSET_ID_BYTES} are allowed"
            ),
            Self::InvalidCharacters(value) => {
                write!(f, "asset id contains unsupported characters: {value}")
            }
            Self::InvalidPath(value) => {
                write!(f, "asset id has an empty or parent path segment: {value}")
            }
        }
    }
}

impl Error for AssetIdError {}

#[cfg(test)]
mod tests {
    use super::{AssetId, AssetIdError};

    #[test]
    fn builds_source_url_with_fixed_scheme() {
        let asset = AssetId::parse("packagea/index.bundle").expect("valid asset");
        assert_eq!(asset.source_url(), "assets://packagea/index.bundle");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let asset = AssetId::parse("  main.bundle.js ").expect("valid asset");
        assert_eq!(asset.as_str(), "main.bundle.js");
    }

    #[test]
    fn rejects_empty_and_blank_ids() {
        assert_eq!(AssetId::parse("   "), Err(AssetIdError::Empty));
    }

    #[test]
    fn rejects_absolute_and_parent_paths() {
        assert!(matches!(
            AssetId::parse("/etc/passwd"),
            Err(AssetIdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            AssetId::parse("bundles/../secret.js"),
            Err(AssetIdError::InvalidPath(_))
        ));
        assert!(matches!(
            AssetId::parse("bundles//main.js"),
            Err(AssetIdError::InvalidPath(_))
        ));
    }

    #[test]
    fn rejects_schemes_and_spaces() {
        assert!(AssetId::parse("assets://main.js").is_err());
        assert!(AssetId::parse("main bundle.js").is_err());
    }

    #[test]
    fn rejects_overlong_ids() {
        let long = "a".repeat(300);
        assert_eq!(AssetId::parse(&long), Err(AssetIdError::TooLong(300)));
    }
}
