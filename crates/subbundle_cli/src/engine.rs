//! Directory-backed script engine for local simulation.
//!
//! Contexts are bookkeeping only. Evaluating a bundle reads its file from the
//! assets directory when one is configured, so missing bundles fail the way
//! a packaging mistake would on a device.

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use subbundle_core::{EngineError, GenerationId, ScriptEngine, SurfaceId, ASSET_SOURCE_SCHEME};

#[derive(Default)]
struct EngineState {
    live: BTreeSet<GenerationId>,
    evaluated: Vec<(GenerationId, String, usize)>,
    surfaces: BTreeMap<SurfaceId, GenerationId>,
}

pub struct DirectoryEngine {
    assets_dir: Option<PathBuf>,
    state: Mutex<EngineState>,
}

impl DirectoryEngine {
    pub fn new(assets_dir: Option<PathBuf>) -> Self {
        Self {
            assets_dir,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// `(generation, source_url, bytes)` for every evaluated bundle.
    pub fn evaluated(&self) -> Vec<(GenerationId, String, usize)> {
        self.state.lock().evaluated.clone()
    }

    pub fn attached_surfaces(&self) -> usize {
        self.state.lock().surfaces.len()
    }

    fn read_source(&self, source_url: &str) -> Result<usize, EngineError> {
        let Some(dir) = self.assets_dir.as_ref() else {
            return Ok(0);
        };
        let relative = source_url
            .strip_prefix(ASSET_SOURCE_SCHEME)
            .ok_or_else(|| EngineError::new(format!("unsupported source url `{source_url}`")))?;
        let path = dir.join(relative);
        std::fs::read(&path)
            .map(|bytes| bytes.len())
            .map_err(|err| EngineError::new(format!("cannot read {}: {err}", path.display())))
    }
}

impl ScriptEngine for DirectoryEngine {
    fn create_context(&self, generation: GenerationId) -> Result<(), EngineError> {
        self.state.lock().live.insert(generation);
        debug!("event=engine_context module=cli status=created generation={generation}");
        Ok(())
    }

    fn evaluate_script(&self, generation: GenerationId, source_url: &str) -> Result<(), EngineError> {
        let bytes = self.read_source(source_url).inspect_err(|err| {
            warn!("event=engine_evaluate module=cli status=error source={source_url} error={err}");
        })?;
        let mut state = self.state.lock();
        if !state.live.contains(&generation) {
            return Err(EngineError::new(format!("context {generation} is gone")));
        }
        info!(
            "event=engine_evaluate module=cli status=ok generation={generation} source={source_url} bytes={bytes}"
        );
        state
            .evaluated
            .push((generation, source_url.to_string(), bytes));
        Ok(())
    }

    fn destroy_context(&self, generation: GenerationId) {
        let mut state = self.state.lock();
        state.live.remove(&generation);
        state.surfaces.retain(|_, bound| *bound != generation);
    }

    fn attach_surface(
        &self,
        generation: GenerationId,
        surface: SurfaceId,
        _module_name: &str,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if !state.live.contains(&generation) {
            return Err(EngineError::new(format!("context {generation} is gone")));
        }
        state.surfaces.insert(surface, generation);
        Ok(())
    }

    fn detach_surface(&self, surface: SurfaceId) -> Result<(), EngineError> {
        self.state.lock().surfaces.remove(&surface);
        Ok(())
    }
}
