//! Display surfaces hosted by containers.
//!
//! # Invariants
//! - The root module name is fixed at construction.
//! - A surface is bound to at most one generation at a time.
//! - A released surface never binds again.

use crate::runtime::generation::GenerationId;
use parking_lot::Mutex;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(Uuid);

impl SurfaceId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for SurfaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Binding state of one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceBinding {
    Unattached,
    Attached(GenerationId),
    Released,
}

/// UI element rendering one root module of a runtime generation.
#[derive(Debug)]
pub struct DisplaySurface {
    id: SurfaceId,
    module_name: String,
    binding: Mutex<SurfaceBinding>,
}

impl DisplaySurface {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            id: SurfaceId::new_v4(),
            module_name: module_name.into(),
            binding: Mutex::new(SurfaceBinding::Unattached),
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn binding(&self) -> SurfaceBinding {
        *self.binding.lock()
    }

    pub fn attached_generation(&self) -> Option<GenerationId> {
        match self.binding() {
            SurfaceBinding::Attached(generation) => Some(generation),
            _ => None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.binding() == SurfaceBinding::Released
    }

    /// Runs `update` with exclusive access to the binding.
    pub(crate) fn with_binding<T>(&self, update: impl FnOnce(&mut SurfaceBinding) -> T) -> T {
        let mut binding = self.binding.lock();
        update(&mut binding)
    }

    /// Marks the surface as released. Idempotent.
    ///
    /// Returns the generation it was still bound to, if any; callers must
    /// detach that binding first.
    pub(crate) fn release(&self) -> Option<GenerationId> {
        let mut binding = self.binding.lock();
        let previous = *binding;
        *binding = SurfaceBinding::Released;
        match previous {
            SurfaceBinding::Attached(generation) => Some(generation),
            _ => None,
        }
    }
}
