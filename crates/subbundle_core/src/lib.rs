//! On-demand script bundle loading for an embedded scripting runtime.
//!
//! Loads independently packaged bundles into an already-running runtime
//! generation, at most once per generation, and attaches each container's
//! display surface once both the runtime and its bundle are ready.

pub mod bundle;
pub mod catalog;
pub mod host;
pub mod logging;
pub mod runtime;
pub mod view;

pub use bundle::asset::{AssetId, AssetIdError, ASSET_SOURCE_SCHEME};
pub use bundle::loader::{
    BundleLoadError, BundleLoader, LoadOutcome, LoadedBundle, LoaderOptions,
    DEFAULT_LOAD_TIMEOUT,
};
pub use bundle::registry::ScriptLoadRegistry;
pub use catalog::{BundleCatalog, BundleEntry, CatalogError};
pub use host::config::{ContainerConfig, ContainerConfigError};
pub use host::container::{reload_runtime, ContainerError, HostContainer};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use runtime::capability::{
    RuntimeAccessError, RuntimeBridge, RuntimeCapabilities, RuntimeOperation,
};
pub use runtime::generation::{GenerationId, RuntimeGeneration};
pub use runtime::host::{EngineError, ScriptEngine, ScriptHost};
pub use runtime::lifecycle::{ContextReady, LifecycleManager, ReadyNotifier, ReadyResult};
pub use runtime::phase::LifecyclePhase;
pub use view::attach::{AttachError, AttachOutcome, ViewAttachmentController};
pub use view::surface::{DisplaySurface, SurfaceBinding, SurfaceId};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
