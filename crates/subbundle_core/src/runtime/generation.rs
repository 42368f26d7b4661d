//! Runtime generation handles.
//!
//! # Responsibility
//! - Identify one incarnation of the scripting runtime.
//! - Own the loaded-asset registry scoped to that incarnation.
//!
//! # Invariants
//! - Generation ids increase strictly within one host.
//! - Once retired, a generation never becomes live again.
//! - Recreating the runtime yields a fresh generation with an empty registry.

use crate::bundle::registry::ScriptLoadRegistry;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Monotonic id of one runtime generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationId(u64);

impl GenerationId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for GenerationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// One live (or retired) incarnation of the scripting runtime.
#[derive(Debug)]
pub struct RuntimeGeneration {
    id: GenerationId,
    registry: Arc<ScriptLoadRegistry>,
    retired: AtomicBool,
}

impl RuntimeGeneration {
    pub fn new(id: GenerationId) -> Self {
        Self {
            id,
            registry: Arc::new(ScriptLoadRegistry::new()),
            retired: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> GenerationId {
        self.id
    }

    /// Loaded-asset registry owned by this generation.
    pub fn registry(&self) -> &Arc<ScriptLoadRegistry> {
        &self.registry
    }

    pub fn is_live(&self) -> bool {
        !self.retired.load(Ordering::Acquire)
    }

    /// Marks this generation as superseded.
    ///
    /// Returns `true` on the first call only.
    pub fn retire(&self) -> bool {
        !self.retired.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::{GenerationId, RuntimeGeneration};
    use crate::bundle::asset::AssetId;

    #[test]
    fn retire_is_one_way_and_reports_first_call() {
        let generation = RuntimeGeneration::new(GenerationId::new(1));
        assert!(generation.is_live());
        assert!(generation.retire());
        assert!(!generation.retire());
        assert!(!generation.is_live());
    }

    #[test]
    fn fresh_generation_starts_with_empty_registry() {
        let asset = AssetId::parse("main.bundle.js").expect("valid asset");
        let first = RuntimeGeneration::new(GenerationId::new(1));
        first.registry().mark_loaded(&asset);

        let second = RuntimeGeneration::new(GenerationId::new(1).next());
        assert!(first.registry().is_loaded(&asset));
        assert!(!second.registry().is_loaded(&asset));
        assert_eq!(second.id().to_string(), "g2");
    }
}
