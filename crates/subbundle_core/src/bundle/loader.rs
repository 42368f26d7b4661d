//! Background bundle loading.
//!
//! # Responsibility
//! - Load one script asset into one runtime generation, at most once.
//! - Keep the privileged load call off the primary execution context.
//!
//! # Invariants
//! - For one `(generation, asset)` pair at most one privileged call is in
//!   flight, and none is made once the asset is recorded as loaded.
//! - A failed load leaves the asset unrecorded so a later retry can run.
//! - A caller that stops waiting does not release the in-flight guard; the
//!   background task finishes the call and records a late success.

use crate::bundle::asset::AssetId;
use crate::runtime::capability::{RuntimeAccessError, RuntimeCapabilities, RuntimeOperation};
use crate::runtime::generation::{GenerationId, RuntimeGeneration};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Default deadline for one privileged load call.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for `BundleLoader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Deadline for the privileged call. `None` waits indefinitely.
    pub load_timeout: Option<Duration>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            load_timeout: Some(DEFAULT_LOAD_TIMEOUT),
        }
    }
}

/// Successful load result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// This call performed the privileged load.
    Loaded,
    /// The asset was already present in the generation; nothing was called.
    AlreadyLoaded,
}

impl LoadOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::AlreadyLoaded => "already_loaded",
        }
    }
}

/// Proof that `asset` is present in `generation`.
///
/// Only `BundleLoader` creates these; attaching a surface requires one.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    generation: Arc<RuntimeGeneration>,
    asset: AssetId,
    outcome: LoadOutcome,
}

impl LoadedBundle {
    pub fn generation(&self) -> &Arc<RuntimeGeneration> {
        &self.generation
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub fn outcome(&self) -> LoadOutcome {
        self.outcome
    }
}

/// Bundle load failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleLoadError {
    /// The privileged call failed, timed out, or was unavailable.
    Access {
        asset: AssetId,
        source: RuntimeAccessError,
    },
    /// The generation was superseded before the privileged call was made.
    StaleGeneration {
        asset: AssetId,
        generation: GenerationId,
    },
    /// The background task ended without reporting.
    Aborted { asset: AssetId },
}

impl Display for BundleLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access { asset, source } => write!(f, "failed to load `{asset}`: {source}"),
            Self::StaleGeneration { asset, generation } => write!(
                f,
                "refused to load `{asset}` into superseded generation {generation}"
            ),
            Self::Aborted { asset } => write!(f, "load task for `{asset}` ended unexpectedly"),
        }
    }
}

impl Error for BundleLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Loads script bundles through the privileged capability interface.
#[derive(Clone)]
pub struct BundleLoader {
    capabilities: Arc<dyn RuntimeCapabilities>,
    options: LoaderOptions,
}

impl BundleLoader {
    pub fn new(capabilities: Arc<dyn RuntimeCapabilities>, options: LoaderOptions) -> Self {
        Self {
            capabilities,
            options,
        }
    }

    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    /// Ensures `asset` is loaded into `generation`.
    ///
    /// Must be called inside a tokio runtime. Dropping the returned future
    /// abandons the wait, not the load.
    pub async fn load_bundle(
        &self,
        generation: &Arc<RuntimeGeneration>,
        asset: &AssetId,
    ) -> Result<LoadedBundle, BundleLoadError> {
        let outcome = if generation.registry().is_loaded(asset) {
            debug!(
                "event=bundle_load module=loader status=skip generation={} asset={}",
                generation.id(),
                asset
            );
            LoadOutcome::AlreadyLoaded
        } else {
            let (reply_tx, reply_rx) = oneshot::channel();
            let task = LoadTask {
                capabilities: Arc::clone(&self.capabilities),
                generation: Arc::clone(generation),
                asset: asset.clone(),
                timeout: self.options.load_timeout,
            };
            tokio::spawn(task.run(reply_tx));
            match reply_rx.await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(BundleLoadError::Aborted {
                        asset: asset.clone(),
                    })
                }
            }
        };

        Ok(LoadedBundle {
            generation: Arc::clone(generation),
            asset: asset.clone(),
            outcome,
        })
    }
}

struct LoadTask {
    capabilities: Arc<dyn RuntimeCapabilities>,
    generation: Arc<RuntimeGeneration>,
    asset: AssetId,
    timeout: Option<Duration>,
}

type LoadReply = oneshot::Sender<Result<LoadOutcome, BundleLoadError>>;

impl LoadTask {
    async fn run(self, reply: LoadReply) {
        let registry = Arc::clone(self.generation.registry());
        let _guard = registry.acquire(&self.asset).await;

        if registry.is_loaded(&self.asset) {
            debug!(
                "event=bundle_load module=loader status=skip generation={} asset={} reason=coalesced",
                self.generation.id(),
                self.asset
            );
            let _ = reply.send(Ok(LoadOutcome::AlreadyLoaded));
            return;
        }
        if !self.generation.is_live() {
            warn!(
                "event=bundle_load module=loader status=stale generation={} asset={}",
                self.generation.id(),
                self.asset
            );
            let _ = reply.send(Err(BundleLoadError::StaleGeneration {
                asset: self.asset.clone(),
                generation: self.generation.id(),
            }));
            return;
        }

        let started = Instant::now();
        let mut call = {
            let capabilities = Arc::clone(&self.capabilities);
            let generation = Arc::clone(&self.generation);
            let source_url = self.asset.source_url();
            tokio::task::spawn_blocking(move || capabilities.load_asset(&generation, &source_url))
        };

        let mut reply = Some(reply);
        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut call).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        "event=bundle_load module=loader status=timeout generation={} asset={} after_ms={}",
                        self.generation.id(),
                        self.asset,
                        limit.as_millis()
                    );
                    if let Some(reply) = reply.take() {
                        let _ = reply.send(Err(self.access_error(RuntimeAccessError::TimedOut {
                            operation: RuntimeOperation::LoadAsset,
                            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        })));
                    }
                    // Keep the guard until the call returns.
                    call.await
                }
            },
            None => call.await,
        };

        let elapsed_ms = started.elapsed().as_millis();
        let result = match joined {
            Ok(Ok(())) => {
                registry.mark_loaded(&self.asset);
                info!(
                    "event=bundle_load module=loader status=ok generation={} asset={} elapsed_ms={}",
                    self.generation.id(),
                    self.asset,
                    elapsed_ms
                );
                Ok(LoadOutcome::Loaded)
            }
            Ok(Err(err)) => {
                warn!(
                    "event=bundle_load module=loader status=error generation={} asset={} elapsed_ms={} error={}",
                    self.generation.id(),
                    self.asset,
                    elapsed_ms,
                    err
                );
                Err(self.access_error(err))
            }
            Err(join_err) => {
                error!(
                    "event=bundle_load module=loader status=error generation={} asset={} reason=task_failed",
                    self.generation.id(),
                    self.asset
                );
                Err(self.access_error(RuntimeAccessError::call_failed(
                    RuntimeOperation::LoadAsset,
                    format!("load call did not complete: {join_err}"),
                )))
            }
        };

        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }

    fn access_error(&self, source: RuntimeAccessError) -> BundleLoadError {
        BundleLoadError::Access {
            asset: self.asset.clone(),
            source,
        }
    }
}
