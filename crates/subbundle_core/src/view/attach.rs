//! Binding display surfaces to runtime generations.
//!
//! # Responsibility
//! - Attach a surface once its bundle is loaded into the active generation.
//! - Drop attaches that target a superseded generation.
//! - Detach surfaces safely regardless of prior attach state.
//!
//! # Invariants
//! - `attach` requires a `LoadedBundle`, so it cannot precede the load.
//! - No runtime call is made against a retired generation.
//! - `detach` never fails and is idempotent.

use crate::bundle::loader::LoadedBundle;
use crate::runtime::capability::RuntimeAccessError;
use crate::runtime::generation::GenerationId;
use crate::runtime::lifecycle::LifecycleManager;
use crate::view::surface::{DisplaySurface, SurfaceBinding, SurfaceId};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Non-error attach results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached(GenerationId),
    /// The surface was already bound to this generation.
    AlreadyAttached(GenerationId),
    /// The bundle's generation was superseded; nothing was attached.
    DroppedStale(GenerationId),
}

impl AttachOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attached(_) => "attached",
            Self::AlreadyAttached(_) => "already_attached",
            Self::DroppedStale(_) => "dropped_stale",
        }
    }

    pub fn generation(self) -> GenerationId {
        match self {
            Self::Attached(id) | Self::AlreadyAttached(id) | Self::DroppedStale(id) => id,
        }
    }

    pub fn is_attached(self) -> bool {
        matches!(self, Self::Attached(_) | Self::AlreadyAttached(_))
    }
}

/// Attach failures surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachError {
    /// No live runtime context to attach to.
    AttachWithoutRuntime { surface: SurfaceId },
    /// The surface was released by its container.
    SurfaceReleased { surface: SurfaceId },
    Access {
        surface: SurfaceId,
        source: RuntimeAccessError,
    },
}

impl Display for AttachError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AttachWithoutRuntime { surface } => {
                write!(f, "cannot attach surface {surface}: no live runtime context")
            }
            Self::SurfaceReleased { surface } => {
                write!(f, "cannot attach surface {surface}: surface was released")
            }
            Self::Access { surface, source } => {
                write!(f, "failed to attach surface {surface}: {source}")
            }
        }
    }
}

impl Error for AttachError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Attaches and detaches surfaces against the lifecycle manager.
#[derive(Clone)]
pub struct ViewAttachmentController {
    lifecycle: Arc<dyn LifecycleManager>,
}

impl ViewAttachmentController {
    pub fn new(lifecycle: Arc<dyn LifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Binds `surface` to the generation `bundle` was loaded into.
    pub fn attach(
        &self,
        surface: &DisplaySurface,
        bundle: &LoadedBundle,
    ) -> Result<AttachOutcome, AttachError> {
        let generation = bundle.generation();
        let target = generation.id();

        if !generation.is_live() {
            return Ok(self.drop_stale(surface, target, "retired"));
        }
        let Some(current) = self.lifecycle.current_generation() else {
            warn!(
                "event=surface_attach module=view status=error surface={} generation={} reason=no_runtime",
                surface.id(),
                target
            );
            return Err(AttachError::AttachWithoutRuntime {
                surface: surface.id(),
            });
        };
        if current.id() != target {
            return Ok(self.drop_stale(surface, target, "superseded"));
        }

        // The binding lock is held across the runtime call so a concurrent
        // detach/release cannot interleave with it.
        surface.with_binding(|binding| match *binding {
            SurfaceBinding::Released => Err(AttachError::SurfaceReleased {
                surface: surface.id(),
            }),
            SurfaceBinding::Attached(bound) if bound == target => {
                debug!(
                    "event=surface_attach module=view status=skip surface={} generation={}",
                    surface.id(),
                    target
                );
                Ok(AttachOutcome::AlreadyAttached(target))
            }
            SurfaceBinding::Attached(_) | SurfaceBinding::Unattached => {
                if let Err(source) =
                    self.lifecycle
                        .attach_surface(generation, surface.id(), surface.module_name())
                {
                    // Recreated between the check above and the call.
                    if !generation.is_live() {
                        return Ok(self.drop_stale(surface, target, "retired"));
                    }
                    return Err(AttachError::Access {
                        surface: surface.id(),
                        source,
                    });
                }
                *binding = SurfaceBinding::Attached(target);
                info!(
                    "event=surface_attach module=view status=ok surface={} generation={} asset={} module_name={}",
                    surface.id(),
                    target,
                    bundle.asset(),
                    surface.module_name()
                );
                Ok(AttachOutcome::Attached(target))
            }
        })
    }

    /// Releases the surface's binding, if any.
    ///
    /// Returns `true` when a binding was released. Runtime errors are logged
    /// and do not prevent the local binding from being cleared.
    pub fn detach(&self, surface: &DisplaySurface) -> bool {
        let previous = surface.with_binding(|binding| match *binding {
            SurfaceBinding::Attached(generation) => {
                *binding = SurfaceBinding::Unattached;
                Some(generation)
            }
            SurfaceBinding::Unattached | SurfaceBinding::Released => None,
        });
        match previous {
            Some(generation) => {
                self.detach_from_runtime(surface.id(), generation);
                true
            }
            None => {
                debug!(
                    "event=surface_detach module=view status=skip surface={}",
                    surface.id()
                );
                false
            }
        }
    }

    /// Detaches and permanently releases the surface. Idempotent.
    pub fn release(&self, surface: &DisplaySurface) -> bool {
        match surface.release() {
            Some(generation) => {
                self.detach_from_runtime(surface.id(), generation);
                true
            }
            None => false,
        }
    }

    fn detach_from_runtime(&self, surface: SurfaceId, generation: GenerationId) {
        match self.lifecycle.detach_surface(surface) {
            Ok(()) => info!(
                "event=surface_detach module=view status=ok surface={} generation={}",
                surface, generation
            ),
            Err(err) => warn!(
                "event=surface_detach module=view status=error surface={} generation={} error={}",
                surface, generation, err
            ),
        }
    }

    fn drop_stale(
        &self,
        surface: &DisplaySurface,
        target: GenerationId,
        reason: &str,
    ) -> AttachOutcome {
        warn!(
            "event=surface_attach module=view status=stale surface={} generation={} reason={}",
            surface.id(),
            target,
            reason
        );
        AttachOutcome::DroppedStale(target)
    }
}
