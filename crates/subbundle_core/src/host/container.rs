//! Host container orchestration.
//!
//! # Responsibility
//! - Own one display surface and the bundle it renders.
//! - Pick the load path from the current lifecycle phase.
//! - Chain background load and primary-context attach under one
//!   cancellation scope.
//!
//! # Invariants
//! - The privileged load runs on the blocking pool; attach runs in the
//!   future returned by `dispatch`, on whichever context polls it.
//! - After `close`, no new dispatch starts and pending ones end as
//!   `Cancelled`.
//! - Repeated or concurrent dispatches share the loader's in-flight guard.

use crate::bundle::asset::AssetId;
use crate::bundle::loader::{BundleLoadError, BundleLoader, LoaderOptions};
use crate::host::config::{ContainerConfig, ContainerConfigError};
use crate::runtime::capability::{RuntimeAccessError, RuntimeBridge};
use crate::runtime::generation::RuntimeGeneration;
use crate::runtime::phase::LifecyclePhase;
use crate::view::attach::{AttachError, AttachOutcome, ViewAttachmentController};
use crate::view::surface::DisplaySurface;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Container-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    InvalidConfig(ContainerConfigError),
    /// Waiting for a usable runtime context failed.
    ContextUnavailable(RuntimeAccessError),
    Load(BundleLoadError),
    Attach(AttachError),
    /// A privileged runtime call made by the container itself failed.
    Access(RuntimeAccessError),
    /// The container was closed while the operation was in flight.
    Cancelled,
    /// The container was already closed.
    Closed,
}

impl Display for ContainerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(err) => write!(f, "invalid container config: {err}"),
            Self::ContextUnavailable(err) => write!(f, "runtime context unavailable: {err}"),
            Self::Load(err) => write!(f, "{err}"),
            Self::Attach(err) => write!(f, "{err}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::Cancelled => write!(f, "container closed while operation was in flight"),
            Self::Closed => write!(f, "container is closed"),
        }
    }
}

impl Error for ContainerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidConfig(err) => Some(err),
            Self::ContextUnavailable(err) | Self::Access(err) => Some(err),
            Self::Load(err) => Some(err),
            Self::Attach(err) => Some(err),
            Self::Cancelled | Self::Closed => None,
        }
    }
}

/// Recreates the runtime context and forces the new one into `Resumed`.
///
/// Resolves with the new generation once it is ready and resumed.
pub async fn reload_runtime(
    bridge: &RuntimeBridge,
) -> Result<Arc<RuntimeGeneration>, RuntimeAccessError> {
    bridge.capabilities().recreate_context()?;
    let generation = bridge.lifecycle().subscribe_context_ready().wait().await?;
    bridge.capabilities().force_resume(true)?;
    info!(
        "event=runtime_reload module=host status=ok generation={}",
        generation.id()
    );
    Ok(generation)
}

/// Hosts one sub-bundle surface against the shared runtime.
pub struct HostContainer {
    asset: AssetId,
    bridge: RuntimeBridge,
    loader: BundleLoader,
    controller: ViewAttachmentController,
    surface: Arc<DisplaySurface>,
    cancel: CancellationToken,
}

impl HostContainer {
    /// Creates the container and names its surface's root module.
    pub fn new(
        config: ContainerConfig,
        bridge: RuntimeBridge,
        options: LoaderOptions,
    ) -> Result<Self, ContainerError> {
        let asset = config.validate().map_err(ContainerError::InvalidConfig)?;
        let surface = Arc::new(DisplaySurface::new(config.main_component_name.trim()));
        bridge
            .capabilities()
            .set_root_module_name(surface.id(), surface.module_name())
            .map_err(ContainerError::Access)?;

        debug!(
            "event=container_open module=host status=ok surface={} asset={} module_name={}",
            surface.id(),
            asset,
            surface.module_name()
        );
        Ok(Self {
            asset,
            loader: BundleLoader::new(Arc::clone(bridge.capabilities()), options),
            controller: ViewAttachmentController::new(Arc::clone(bridge.lifecycle())),
            bridge,
            surface,
            cancel: CancellationToken::new(),
        })
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    /// Surface to place in the host's view tree.
    pub fn surface(&self) -> &Arc<DisplaySurface> {
        &self.surface
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Loads the bundle and attaches the surface, waiting for a usable
    /// context first when the runtime is not resumed yet.
    pub async fn dispatch(&self) -> Result<AttachOutcome, ContainerError> {
        if self.is_closed() {
            return Err(ContainerError::Closed);
        }
        let lifecycle = self.bridge.lifecycle();
        let phase = lifecycle.current_phase();

        let live = match phase {
            LifecyclePhase::Resumed => lifecycle.current_generation(),
            _ => None,
        };
        let generation = match live {
            Some(generation) => {
                debug!(
                    "event=container_dispatch module=host status=immediate surface={} generation={}",
                    self.surface.id(),
                    generation.id()
                );
                generation
            }
            None => {
                if !lifecycle.has_started_initial_context() {
                    lifecycle.create_context_in_background();
                }
                let ready = lifecycle.subscribe_context_ready();
                debug!(
                    "event=container_dispatch module=host status=waiting surface={} phase={}",
                    self.surface.id(),
                    phase
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(ContainerError::Cancelled),
                    result = ready.wait() => result.map_err(ContainerError::ContextUnavailable)?,
                }
            }
        };

        self.load_and_attach(generation).await
    }

    /// Recreates the runtime, forces it resumed, then dispatches again.
    pub async fn reload(&self) -> Result<AttachOutcome, ContainerError> {
        if self.is_closed() {
            return Err(ContainerError::Closed);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(ContainerError::Cancelled),
            result = reload_runtime(&self.bridge) => {
                result.map_err(ContainerError::ContextUnavailable)?;
            }
        }
        self.dispatch().await
    }

    /// Cancels in-flight work, detaches and releases the surface. Idempotent.
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let detached = self.controller.release(&self.surface);
        info!(
            "event=container_close module=host status=ok surface={} detached={}",
            self.surface.id(),
            detached
        );
    }

    async fn load_and_attach(
        &self,
        generation: Arc<RuntimeGeneration>,
    ) -> Result<AttachOutcome, ContainerError> {
        let loaded = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ContainerError::Cancelled),
            result = self.loader.load_bundle(&generation, &self.asset) => result,
        };
        let bundle = match loaded {
            Ok(bundle) => bundle,
            Err(BundleLoadError::StaleGeneration { generation, .. }) => {
                warn!(
                    "event=container_dispatch module=host status=stale surface={} generation={}",
                    self.surface.id(),
                    generation
                );
                return Ok(AttachOutcome::DroppedStale(generation));
            }
            Err(err) => return Err(ContainerError::Load(err)),
        };

        // The container may have closed while the load finished.
        if self.is_closed() {
            return Err(ContainerError::Cancelled);
        }
        let outcome = self
            .controller
            .attach(&self.surface, &bundle)
            .map_err(|err| match err {
                AttachError::SurfaceReleased { .. } if self.is_closed() => ContainerError::Cancelled,
                other => ContainerError::Attach(other),
            })?;
        info!(
            "event=container_dispatch module=host status={} surface={} generation={} load={}",
            outcome.as_str(),
            self.surface.id(),
            outcome.generation(),
            bundle.outcome().as_str()
        );
        Ok(outcome)
    }
}

impl Drop for HostContainer {
    fn drop(&mut self) {
        self.close();
    }
}
