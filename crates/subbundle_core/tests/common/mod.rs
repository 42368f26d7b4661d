#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use subbundle_core::{
    AssetId, ContextReady, EngineError, GenerationId, LifecycleManager, LifecyclePhase,
    RuntimeAccessError, RuntimeBridge, RuntimeGeneration, ScriptEngine, ScriptHost, SurfaceId,
};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    CreateContext(GenerationId),
    DestroyContext(GenerationId),
    Evaluate(GenerationId, String),
    SetRootModuleName(SurfaceId, String),
    Attach(GenerationId, SurfaceId, String),
    Detach(SurfaceId),
}

/// Blocks engine calls until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cvar: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock() = true;
        self.cvar.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cvar.wait(&mut open);
        }
    }
}

/// Engine that records every call and can be told to block or fail.
#[derive(Default)]
pub struct RecordingEngine {
    events: Mutex<Vec<EngineEvent>>,
    evaluate_calls: AtomicUsize,
    failing_loads: AtomicUsize,
    fail_create: AtomicBool,
    load_gate: Mutex<Option<Arc<Gate>>>,
    create_gate: Mutex<Option<Arc<Gate>>>,
    load_started: Notify,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    /// Number of privileged load calls that reached the engine.
    pub fn evaluate_count(&self) -> usize {
        self.evaluate_calls.load(Ordering::SeqCst)
    }

    pub fn evaluations_for(&self, generation: GenerationId) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Evaluate(id, url) if *id == generation => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn attach_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, EngineEvent::Attach(..)))
            .count()
    }

    pub fn fail_next_loads(&self, count: usize) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Blocks every subsequent load until the returned gate opens.
    pub fn hold_loads(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.load_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Blocks every subsequent context build until the returned gate opens.
    pub fn hold_creates(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.create_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Resolves once a load call has entered the engine.
    pub async fn load_started(&self) {
        self.load_started.notified().await;
    }

    fn record(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}

impl ScriptEngine for RecordingEngine {
    fn create_context(&self, generation: GenerationId) -> Result<(), EngineError> {
        let gate = self.create_gate.lock().clone();
        if let Some(gate) = gate {
            gate.wait();
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(EngineError::new("context build refused"));
        }
        self.record(EngineEvent::CreateContext(generation));
        Ok(())
    }

    fn evaluate_script(&self, generation: GenerationId, source_url: &str) -> Result<(), EngineError> {
        self.evaluate_calls.fetch_add(1, Ordering::SeqCst);
        self.record(EngineEvent::Evaluate(generation, source_url.to_string()));
        self.load_started.notify_one();

        let gate = self.load_gate.lock().clone();
        if let Some(gate) = gate {
            gate.wait();
        }
        let fail = self
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if fail {
            return Err(EngineError::new("script evaluation failed"));
        }
        Ok(())
    }

    fn destroy_context(&self, generation: GenerationId) {
        self.record(EngineEvent::DestroyContext(generation));
    }

    fn set_root_module_name(&self, surface: SurfaceId, module_name: &str) -> Result<(), EngineError> {
        self.record(EngineEvent::SetRootModuleName(surface, module_name.to_string()));
        Ok(())
    }

    fn attach_surface(
        &self,
        generation: GenerationId,
        surface: SurfaceId,
        module_name: &str,
    ) -> Result<(), EngineError> {
        self.record(EngineEvent::Attach(generation, surface, module_name.to_string()));
        Ok(())
    }

    fn detach_surface(&self, surface: SurfaceId) -> Result<(), EngineError> {
        self.record(EngineEvent::Detach(surface));
        Ok(())
    }
}

/// Lifecycle wrapper counting how the core drives the lifecycle manager.
pub struct CountingLifecycle {
    inner: ScriptHost,
    subscriptions: AtomicUsize,
    creates: AtomicUsize,
}

impl CountingLifecycle {
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

impl LifecycleManager for CountingLifecycle {
    fn current_phase(&self) -> LifecyclePhase {
        self.inner.current_phase()
    }

    fn has_started_initial_context(&self) -> bool {
        self.inner.has_started_initial_context()
    }

    fn current_generation(&self) -> Option<Arc<RuntimeGeneration>> {
        self.inner.current_generation()
    }

    fn create_context_in_background(&self) {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_context_in_background();
    }

    fn subscribe_context_ready(&self) -> ContextReady {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribe_context_ready()
    }

    fn attach_surface(
        &self,
        generation: &RuntimeGeneration,
        surface: SurfaceId,
        module_name: &str,
    ) -> Result<(), RuntimeAccessError> {
        self.inner.attach_surface(generation, surface, module_name)
    }

    fn detach_surface(&self, surface: SurfaceId) -> Result<(), RuntimeAccessError> {
        self.inner.detach_surface(surface)
    }
}

pub fn asset(value: &str) -> AssetId {
    AssetId::parse(value).expect("valid asset id")
}

pub fn new_host(engine: &Arc<RecordingEngine>) -> ScriptHost {
    ScriptHost::new(engine.clone()).expect("host inside tokio runtime")
}

pub fn bridge(host: &ScriptHost) -> RuntimeBridge {
    RuntimeBridge::from_host(Arc::new(host.clone()))
}

/// Bridge whose lifecycle side counts subscriptions and create calls.
pub fn counting_bridge(host: &ScriptHost) -> (Arc<CountingLifecycle>, RuntimeBridge) {
    let lifecycle = Arc::new(CountingLifecycle {
        inner: host.clone(),
        subscriptions: AtomicUsize::new(0),
        creates: AtomicUsize::new(0),
    });
    let bridge = RuntimeBridge::new(lifecycle.clone(), Arc::new(host.clone()));
    (lifecycle, bridge)
}

/// Host with a ready context, resumed by the host application.
pub async fn resumed_host(engine: &Arc<RecordingEngine>) -> (ScriptHost, Arc<RuntimeGeneration>) {
    let host = new_host(engine);
    host.create_context_in_background();
    let generation = host
        .subscribe_context_ready()
        .wait()
        .await
        .expect("context ready");
    host.on_host_resume();
    (host, generation)
}

/// Polls `condition` until it holds, failing the test after ~2s.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition was not reached in time");
}
