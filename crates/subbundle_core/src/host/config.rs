//! Per-container configuration.

use crate::bundle::asset::{AssetId, AssetIdError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// What one container loads and renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Asset id of the bundle, e.g. `packagea/index.bundle`.
    pub script_asset_path: String,
    /// Root module registered by that bundle, e.g. `SampleA`.
    pub main_component_name: String,
}

impl ContainerConfig {
    pub fn new(
        script_asset_path: impl Into<String>,
        main_component_name: impl Into<String>,
    ) -> Self {
        Self {
            script_asset_path: script_asset_path.into(),
            main_component_name: main_component_name.into(),
        }
    }

    /// Validates the config and returns the parsed asset id.
    pub fn validate(&self) -> Result<AssetId, ContainerConfigError> {
        let asset = AssetId::parse(&self.script_asset_path)
            .map_err(ContainerConfigError::InvalidAsset)?;
        if !is_valid_component_name(self.main_component_name.trim()) {
            return Err(ContainerConfigError::InvalidComponentName(
                self.main_component_name.clone(),
            ));
        }
        Ok(asset)
    }
}

/// Component names are identifiers: a letter or `_`, then alphanumerics,
/// `_` or `$`.
pub(crate) fn is_valid_component_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Container config validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerConfigError {
    InvalidAsset(AssetIdError),
    InvalidComponentName(String),
}

impl Display for ContainerConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAsset(err) => write!(f, "invalid script asset path: {err}"),
            Self::InvalidComponentName(value) => {
                write!(f, "main component name is not a valid identifier: `{value}`")
            }
        }
    }
}

impl Error for ContainerConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidAsset(err) => Some(err),
            Self::InvalidComponentName(_) => None,
        }
    }
}
