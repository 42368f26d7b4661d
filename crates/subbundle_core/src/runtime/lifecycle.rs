//! Public lifecycle contract of the embedding runtime.
//!
//! # Invariants
//! - A ready subscription fires at most once.
//! - A subscriber never observes a generation that was already retired when
//!   it was published.

use crate::runtime::capability::{RuntimeAccessError, RuntimeOperation};
use crate::runtime::generation::RuntimeGeneration;
use crate::runtime::phase::LifecyclePhase;
use crate::view::surface::SurfaceId;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Outcome delivered to one ready subscriber.
pub type ReadyResult = Result<Arc<RuntimeGeneration>, RuntimeAccessError>;

/// Lifecycle manager owning the current runtime generation.
pub trait LifecycleManager: Send + Sync {
    fn current_phase(&self) -> LifecyclePhase;

    fn has_started_initial_context(&self) -> bool;

    /// Current live generation, if its context is usable.
    fn current_generation(&self) -> Option<Arc<RuntimeGeneration>>;

    /// Starts building the context unless a build already started.
    fn create_context_in_background(&self);

    /// Registers one single-fire subscription for the next usable context.
    fn subscribe_context_ready(&self) -> ContextReady;

    /// Binds a surface to `generation`'s context.
    fn attach_surface(
        &self,
        generation: &RuntimeGeneration,
        surface: SurfaceId,
        module_name: &str,
    ) -> Result<(), RuntimeAccessError>;

    /// Releases a surface binding. Unknown surfaces are a no-op.
    fn detach_surface(&self, surface: SurfaceId) -> Result<(), RuntimeAccessError>;
}

/// Receiving half of one ready subscription.
#[derive(Debug)]
pub struct ContextReady {
    rx: oneshot::Receiver<ReadyResult>,
}

/// Sending half of one ready subscription, held by the lifecycle manager.
#[derive(Debug)]
pub struct ReadyNotifier {
    tx: oneshot::Sender<ReadyResult>,
}

impl ContextReady {
    /// Creates a linked notifier/subscription pair.
    pub fn channel() -> (ReadyNotifier, ContextReady) {
        let (tx, rx) = oneshot::channel();
        (ReadyNotifier { tx }, ContextReady { rx })
    }

    /// Subscription that is already resolved.
    pub fn resolved(result: ReadyResult) -> Self {
        let (notifier, ready) = Self::channel();
        notifier.fire(result);
        ready
    }

    /// Waits for the ready event.
    ///
    /// A manager that drops the subscription without firing it is reported as
    /// `Unavailable`.
    pub async fn wait(self) -> ReadyResult {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(RuntimeAccessError::unavailable(
                RuntimeOperation::ContextReady,
                "lifecycle manager dropped the ready subscription",
            )),
        }
    }
}

impl ReadyNotifier {
    /// Delivers the event. Returns `false` when the subscriber is gone.
    pub fn fire(self, result: ReadyResult) -> bool {
        self.tx.send(result).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::ContextReady;
    use crate::runtime::capability::{RuntimeAccessError, RuntimeOperation};
    use crate::runtime::generation::{GenerationId, RuntimeGeneration};
    use std::sync::Arc;

    #[tokio::test]
    async fn fired_subscription_yields_generation() {
        let (notifier, ready) = ContextReady::channel();
        let generation = Arc::new(RuntimeGeneration::new(GenerationId::new(7)));
        assert!(notifier.fire(Ok(Arc::clone(&generation))));
        let received = ready.wait().await.expect("ready event");
        assert_eq!(received.id(), GenerationId::new(7));
    }

    #[tokio::test]
    async fn dropped_notifier_reports_unavailable() {
        let (notifier, ready) = ContextReady::channel();
        drop(notifier);
        let err = ready.wait().await.expect_err("dropped notifier");
        assert_eq!(err.operation(), RuntimeOperation::ContextReady);
    }

    #[tokio::test]
    async fn resolved_subscription_carries_error() {
        let ready = ContextReady::resolved(Err(RuntimeAccessError::call_failed(
            RuntimeOperation::CreateContext,
            "engine refused",
        )));
        assert!(ready.wait().await.is_err());
    }

    #[test]
    fn notifier_sees_dropped_subscriber() {
        let (notifier, ready) = ContextReady::channel();
        drop(ready);
        assert!(notifier.is_closed());
        assert!(!notifier.fire(Err(RuntimeAccessError::unavailable(
            RuntimeOperation::ContextReady,
            "gone",
        ))));
    }
}
