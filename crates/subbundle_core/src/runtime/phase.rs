//! Lifecycle phase of one runtime generation's execution context.

use std::fmt::{Display, Formatter};

/// Readiness stage of the current runtime generation.
///
/// Phases are ordered. Transitions move forward only, except that a context
/// recreate resets the host to `BeforeCreate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecyclePhase {
    /// No usable context yet.
    BeforeCreate,
    /// Context exists but the host has not been resumed.
    BeforeResume,
    /// Context exists and the host is interactive. Reentrant.
    Resumed,
    /// Host is being torn down.
    BeforeDestroy,
}

impl LifecyclePhase {
    /// Stable string id used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeCreate => "before_create",
            Self::BeforeResume => "before_resume",
            Self::Resumed => "resumed",
            Self::BeforeDestroy => "before_destroy",
        }
    }

    /// Returns whether moving from `self` to `next` is a legal forward step.
    ///
    /// Staying in `Resumed` is allowed; every other self-transition and every
    /// backward step is rejected. The recreate reset does not go through this
    /// check.
    pub fn can_advance_to(self, next: LifecyclePhase) -> bool {
        if self == Self::Resumed && next == Self::Resumed {
            return true;
        }
        next > self
    }
}

impl Display for LifecyclePhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
