//! Privileged capability interface of the embedding runtime.
//!
//! # Responsibility
//! - Name the non-public runtime operations the core depends on.
//! - Turn every failure at that boundary into a typed `RuntimeAccessError`.
//!
//! # Invariants
//! - The core reaches the runtime only through `LifecycleManager` and
//!   `RuntimeCapabilities`; there is no other back door.

use crate::runtime::generation::RuntimeGeneration;
use crate::runtime::lifecycle::LifecycleManager;
use crate::view::surface::SurfaceId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Runtime operation reached across the capability boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuntimeOperation {
    CreateContext,
    ContextReady,
    LoadAsset,
    SetRootModuleName,
    RecreateContext,
    ForceResume,
    AttachSurface,
    DetachSurface,
}

impl RuntimeOperation {
    /// Stable string id used in log events and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateContext => "create_context",
            Self::ContextReady => "context_ready",
            Self::LoadAsset => "load_asset",
            Self::SetRootModuleName => "set_root_module_name",
            Self::RecreateContext => "recreate_context",
            Self::ForceResume => "force_resume",
            Self::AttachSurface => "attach_surface",
            Self::DetachSurface => "detach_surface",
        }
    }

    /// Whether the operation belongs to the privileged (non-public) surface.
    pub fn is_privileged(self) -> bool {
        matches!(
            self,
            Self::LoadAsset | Self::SetRootModuleName | Self::RecreateContext | Self::ForceResume
        )
    }
}

impl Display for RuntimeOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reaching the embedding runtime.
///
/// Non-fatal: the failed operation aborts and the caller may retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeAccessError {
    /// The runtime cannot serve the operation right now (no context, shut down).
    Unavailable {
        operation: RuntimeOperation,
        reason: String,
    },
    /// The runtime accepted the call and reported a failure.
    CallFailed {
        operation: RuntimeOperation,
        message: String,
    },
    /// The call did not finish before its deadline.
    TimedOut {
        operation: RuntimeOperation,
        after_ms: u64,
    },
}

impl RuntimeAccessError {
    pub fn unavailable(operation: RuntimeOperation, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.into(),
        }
    }

    pub fn call_failed(operation: RuntimeOperation, message: impl Into<String>) -> Self {
        Self::CallFailed {
            operation,
            message: message.into(),
        }
    }

    pub fn operation(&self) -> RuntimeOperation {
        match self {
            Self::Unavailable { operation, .. }
            | Self::CallFailed { operation, .. }
            | Self::TimedOut { operation, .. } => *operation,
        }
    }
}

impl Display for RuntimeAccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { operation, reason } => {
                write!(f, "runtime operation `{operation}` is unavailable: {reason}")
            }
            Self::CallFailed { operation, message } => {
                write!(f, "runtime operation `{operation}` failed: {message}")
            }
            Self::TimedOut {
                operation,
                after_ms,
            } => write!(
                f,
                "runtime operation `{operation}` timed out after {after_ms}ms"
            ),
        }
    }
}

impl Error for RuntimeAccessError {}

/// Non-public runtime operations required for dynamic bundle loading.
///
/// Implementations must be callable from any thread. `load_asset` may block
/// and is always invoked off the primary execution context.
pub trait RuntimeCapabilities: Send + Sync {
    /// Evaluates the script at `source_url` inside `generation`'s live context.
    fn load_asset(
        &self,
        generation: &RuntimeGeneration,
        source_url: &str,
    ) -> Result<(), RuntimeAccessError>;

    /// Sets the root module rendered by a surface that is not attached yet.
    fn set_root_module_name(
        &self,
        surface: SurfaceId,
        module_name: &str,
    ) -> Result<(), RuntimeAccessError>;

    /// Tears down the current generation and starts building a new one.
    fn recreate_context(&self) -> Result<(), RuntimeAccessError>;

    /// Moves the lifecycle to `Resumed` without waiting for a host resume.
    fn force_resume(&self, force: bool) -> Result<(), RuntimeAccessError>;
}

/// Handles the core holds onto the embedding runtime.
#[derive(Clone)]
pub struct RuntimeBridge {
    lifecycle: Arc<dyn LifecycleManager>,
    capabilities: Arc<dyn RuntimeCapabilities>,
}

impl RuntimeBridge {
    pub fn new(
        lifecycle: Arc<dyn LifecycleManager>,
        capabilities: Arc<dyn RuntimeCapabilities>,
    ) -> Self {
        Self {
            lifecycle,
            capabilities,
        }
    }

    /// Builds a bridge from one object serving both contracts.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: LifecycleManager + RuntimeCapabilities + 'static,
    {
        let lifecycle: Arc<dyn LifecycleManager> = host.clone();
        let capabilities: Arc<dyn RuntimeCapabilities> = host;
        Self::new(lifecycle, capabilities)
    }

    pub fn lifecycle(&self) -> &Arc<dyn LifecycleManager> {
        &self.lifecycle
    }

    pub fn capabilities(&self) -> &Arc<dyn RuntimeCapabilities> {
        &self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::{RuntimeAccessError, RuntimeOperation};

    #[test]
    fn privileged_operations_match_capability_surface() {
        let privileged: Vec<RuntimeOperation> = [
            RuntimeOperation::CreateContext,
            RuntimeOperation::ContextReady,
            RuntimeOperation::LoadAsset,
            RuntimeOperation::SetRootModuleName,
            RuntimeOperation::RecreateContext,
            RuntimeOperation::ForceResume,
            RuntimeOperation::AttachSurface,
            RuntimeOperation::DetachSurface,
        ]
        .into_iter()
        .filter(|op| op.is_privileged())
        .collect();
        assert_eq!(
            privileged,
            vec![
                RuntimeOperation::LoadAsset,
                RuntimeOperation::SetRootModuleName,
                RuntimeOperation::RecreateContext,
                RuntimeOperation::ForceResume,
            ]
        );
    }

    #[test]
    fn error_messages_name_the_operation() {
        let err = RuntimeAccessError::call_failed(RuntimeOperation::LoadAsset, "syntax error");
        assert_eq!(err.operation(), RuntimeOperation::LoadAsset);
        assert_eq!(
            err.to_string(),
            "runtime operation `load_asset` failed: syntax error"
        );

        let err = RuntimeAccessError::TimedOut {
            operation: RuntimeOperation::LoadAsset,
            after_ms: 250,
        };
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn unavailable_keeps_reason() {
        let err = RuntimeAccessError::unavailable(RuntimeOperation::ForceResume, "no context");
        assert!(matches!(
            err,
            RuntimeAccessError::Unavailable { ref reason, .. } if reason == "no context"
        ));
    }
}
