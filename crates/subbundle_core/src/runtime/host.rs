//! In-process lifecycle manager over a pluggable script engine.
//!
//! # Responsibility
//! - Own the current runtime generation and its lifecycle phase.
//! - Build contexts in the background and fan out ready events.
//! - Expose the privileged capabilities by delegating to a `ScriptEngine`.
//!
//! # Invariants
//! - Only the most recently requested build may be published.
//! - Every pending ready subscriber is resolved exactly once per build result.
//! - The previous generation is retired before its replacement is built.

use crate::runtime::capability::{RuntimeAccessError, RuntimeCapabilities, RuntimeOperation};
use crate::runtime::generation::{GenerationId, RuntimeGeneration};
use crate::runtime::lifecycle::{ContextReady, LifecycleManager, ReadyNotifier};
use crate::runtime::phase::LifecyclePhase;
use crate::view::surface::SurfaceId;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Failure reported by a `ScriptEngine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for EngineError {}

/// Scripting engine driven by `ScriptHost`.
///
/// Every method may block; `ScriptHost` calls `create_context` and
/// `evaluate_script` from the blocking pool.
pub trait ScriptEngine: Send + Sync + 'static {
    fn create_context(&self, generation: GenerationId) -> Result<(), EngineError>;

    fn evaluate_script(&self, generation: GenerationId, source_url: &str)
        -> Result<(), EngineError>;

    fn destroy_context(&self, _generation: GenerationId) {}

    fn set_root_module_name(
        &self,
        _surface: SurfaceId,
        _module_name: &str,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn attach_surface(
        &self,
        _generation: GenerationId,
        _surface: SurfaceId,
        _module_name: &str,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn detach_surface(&self, _surface: SurfaceId) -> Result<(), EngineError> {
        Ok(())
    }
}

struct HostState {
    phase: LifecyclePhase,
    started: bool,
    host_resumed: bool,
    current: Option<Arc<RuntimeGeneration>>,
    building: Option<GenerationId>,
    last_id: GenerationId,
    waiters: Vec<ReadyNotifier>,
}

impl HostState {
    fn begin_build(&mut self) -> GenerationId {
        let id = self.last_id.next();
        self.last_id = id;
        self.building = Some(id);
        id
    }

    fn live_generation(&self) -> Option<&Arc<RuntimeGeneration>> {
        self.current.as_ref().filter(|generation| generation.is_live())
    }

    fn ready_phase(&self) -> LifecyclePhase {
        if self.host_resumed {
            LifecyclePhase::Resumed
        } else {
            LifecyclePhase::BeforeResume
        }
    }
}

struct HostInner {
    engine: Arc<dyn ScriptEngine>,
    runtime: Handle,
    state: Mutex<HostState>,
}

/// Reference `LifecycleManager` + `RuntimeCapabilities` implementation.
#[derive(Clone)]
pub struct ScriptHost {
    inner: Arc<HostInner>,
}

impl ScriptHost {
    /// Creates a host bound to the tokio runtime of the calling context.
    pub fn new(engine: Arc<dyn ScriptEngine>) -> Result<Self, RuntimeAccessError> {
        let runtime = Handle::try_current().map_err(|err| {
            RuntimeAccessError::unavailable(
                RuntimeOperation::CreateContext,
                format!("no tokio runtime available: {err}"),
            )
        })?;
        Ok(Self::with_handle(engine, runtime))
    }

    /// Creates a host that spawns background work on `runtime`.
    pub fn with_handle(engine: Arc<dyn ScriptEngine>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(HostInner {
                engine,
                runtime,
                state: Mutex::new(HostState {
                    phase: LifecyclePhase::BeforeCreate,
                    started: false,
                    host_resumed: false,
                    current: None,
                    building: None,
                    last_id: GenerationId::new(0),
                    waiters: Vec::new(),
                }),
            }),
        }
    }

    /// Natural resume trigger from the host application.
    pub fn on_host_resume(&self) {
        let mut state = self.inner.state.lock();
        state.host_resumed = true;
        if state.live_generation().is_some() && state.phase.can_advance_to(LifecyclePhase::Resumed)
        {
            state.phase = LifecyclePhase::Resumed;
        }
        debug!(
            "event=host_resume module=lifecycle status=ok phase={}",
            state.phase
        );
    }

    /// Host application teardown trigger.
    pub fn on_host_destroy(&self) {
        let mut state = self.inner.state.lock();
        state.host_resumed = false;
        if state.phase.can_advance_to(LifecyclePhase::BeforeDestroy) {
            state.phase = LifecyclePhase::BeforeDestroy;
        }
        debug!(
            "event=host_destroy module=lifecycle status=ok phase={}",
            state.phase
        );
    }

    /// Number of ready subscriptions still waiting for a build.
    pub fn pending_subscribers(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.waiters.retain(|waiter| !waiter.is_closed());
        state.waiters.len()
    }

    /// Id of the most recently requested generation, if any.
    pub fn last_generation_id(&self) -> Option<GenerationId> {
        let state = self.inner.state.lock();
        (state.last_id.value() > 0).then_some(state.last_id)
    }

    fn spawn_build(&self, id: GenerationId) {
        info!(
            "event=context_create module=lifecycle status=start generation={}",
            id
        );
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let engine = Arc::clone(&inner.engine);
            let joined = tokio::task::spawn_blocking(move || engine.create_context(id)).await;
            let outcome = match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(err.to_string()),
                Err(join_err) => Err(format!("context build did not complete: {join_err}")),
            };
            inner.finish_build(id, outcome);
        });
    }
}

impl HostInner {
    fn finish_build(&self, id: GenerationId, outcome: Result<(), String>) {
        let mut state = self.state.lock();
        if state.building != Some(id) {
            drop(state);
            if outcome.is_ok() {
                self.engine.destroy_context(id);
            }
            info!(
                "event=context_ready module=lifecycle status=discarded generation={}",
                id
            );
            return;
        }
        state.building = None;

        match outcome {
            Ok(()) => {
                let generation = Arc::new(RuntimeGeneration::new(id));
                state.current = Some(Arc::clone(&generation));
                if state.phase != LifecyclePhase::BeforeDestroy {
                    state.phase = state.ready_phase();
                }
                let phase = state.phase;
                let waiters = std::mem::take(&mut state.waiters);
                drop(state);

                info!(
                    "event=context_ready module=lifecycle status=ok generation={} phase={} subscribers={}",
                    id,
                    phase,
                    waiters.len()
                );
                for waiter in waiters {
                    waiter.fire(Ok(Arc::clone(&generation)));
                }
            }
            Err(message) => {
                state.started = false;
                let waiters = std::mem::take(&mut state.waiters);
                drop(state);

                error!(
                    "event=context_ready module=lifecycle status=error generation={} subscribers={} error={}",
                    id,
                    waiters.len(),
                    message
                );
                for waiter in waiters {
                    waiter.fire(Err(RuntimeAccessError::call_failed(
                        RuntimeOperation::CreateContext,
                        message.clone(),
                    )));
                }
            }
        }
    }
}

impl LifecycleManager for ScriptHost {
    fn current_phase(&self) -> LifecyclePhase {
        self.inner.state.lock().phase
    }

    fn has_started_initial_context(&self) -> bool {
        self.inner.state.lock().started
    }

    fn current_generation(&self) -> Option<Arc<RuntimeGeneration>> {
        self.inner.state.lock().live_generation().cloned()
    }

    fn create_context_in_background(&self) {
        let id = {
            let mut state = self.inner.state.lock();
            if state.started {
                debug!("event=context_create module=lifecycle status=skip reason=already_started");
                return;
            }
            state.started = true;
            state.begin_build()
        };
        self.spawn_build(id);
    }

    fn subscribe_context_ready(&self) -> ContextReady {
        let mut state = self.inner.state.lock();
        if let Some(generation) = state.live_generation() {
            return ContextReady::resolved(Ok(Arc::clone(generation)));
        }
        state.waiters.retain(|waiter| !waiter.is_closed());
        let (notifier, ready) = ContextReady::channel();
        state.waiters.push(notifier);
        ready
    }

    fn attach_surface(
        &self,
        generation: &RuntimeGeneration,
        surface: SurfaceId,
        module_name: &str,
    ) -> Result<(), RuntimeAccessError> {
        let is_current = self
            .inner
            .state
            .lock()
            .live_generation()
            .is_some_and(|current| current.id() == generation.id());
        if !is_current {
            return Err(RuntimeAccessError::unavailable(
                RuntimeOperation::AttachSurface,
                format!("generation {} is not the live context", generation.id()),
            ));
        }
        self.inner
            .engine
            .attach_surface(generation.id(), surface, module_name)
            .map_err(|err| {
                RuntimeAccessError::call_failed(RuntimeOperation::AttachSurface, err.to_string())
            })
    }

    fn detach_surface(&self, surface: SurfaceId) -> Result<(), RuntimeAccessError> {
        self.inner.engine.detach_surface(surface).map_err(|err| {
            RuntimeAccessError::call_failed(RuntimeOperation::DetachSurface, err.to_string())
        })
    }
}

impl RuntimeCapabilities for ScriptHost {
    fn load_asset(
        &self,
        generation: &RuntimeGeneration,
        source_url: &str,
    ) -> Result<(), RuntimeAccessError> {
        if !generation.is_live() {
            return Err(RuntimeAccessError::unavailable(
                RuntimeOperation::LoadAsset,
                format!("generation {} was retired", generation.id()),
            ));
        }
        self.inner
            .engine
            .evaluate_script(generation.id(), source_url)
            .map_err(|err| {
                RuntimeAccessError::call_failed(RuntimeOperation::LoadAsset, err.to_string())
            })
    }

    fn set_root_module_name(
        &self,
        surface: SurfaceId,
        module_name: &str,
    ) -> Result<(), RuntimeAccessError> {
        self.inner
            .engine
            .set_root_module_name(surface, module_name)
            .map_err(|err| {
                RuntimeAccessError::call_failed(
                    RuntimeOperation::SetRootModuleName,
                    err.to_string(),
                )
            })
    }

    fn recreate_context(&self) -> Result<(), RuntimeAccessError> {
        let (retired, id) = {
            let mut state = self.inner.state.lock();
            let retired = state.current.take();
            if let Some(generation) = retired.as_ref() {
                generation.retire();
            }
            state.phase = LifecyclePhase::BeforeCreate;
            state.started = true;
            (retired, state.begin_build())
        };
        if let Some(generation) = retired {
            self.inner.engine.destroy_context(generation.id());
            info!(
                "event=context_recreate module=lifecycle status=ok retired={} next={}",
                generation.id(),
                id
            );
        } else {
            info!(
                "event=context_recreate module=lifecycle status=ok retired=none next={}",
                id
            );
        }
        self.spawn_build(id);
        Ok(())
    }

    fn force_resume(&self, force: bool) -> Result<(), RuntimeAccessError> {
        let mut state = self.inner.state.lock();
        if state.phase == LifecyclePhase::BeforeDestroy {
            warn!(
                "event=force_resume module=lifecycle status=skip force={} phase={}",
                force, state.phase
            );
            return Ok(());
        }
        let natural = state.live_generation().is_some()
            && state.phase.can_advance_to(LifecyclePhase::Resumed);
        if !force && !natural {
            warn!(
                "event=force_resume module=lifecycle status=skip phase={}",
                state.phase
            );
            return Ok(());
        }
        state.host_resumed = true;
        state.phase = LifecyclePhase::Resumed;
        info!(
            "event=force_resume module=lifecycle status=ok force={} live_context={}",
            force,
            state.live_generation().is_some()
        );
        Ok(())
    }
}
