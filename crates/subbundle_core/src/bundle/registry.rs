//! Per-generation record of loaded script assets.
//!
//! # Responsibility
//! - Remember which assets have been loaded into one runtime generation.
//! - Provide the per-asset in-flight guard that serializes load attempts.
//!
//! # Invariants
//! - One registry belongs to exactly one `RuntimeGeneration` and dies with it.
//! - An asset id is recorded at most once.
//! - At most one caller holds the in-flight guard for a given asset.

use crate::bundle::asset::AssetId;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Loaded-asset set plus in-flight guards for one runtime generation.
#[derive(Debug, Default)]
pub struct ScriptLoadRegistry {
    loaded: Mutex<BTreeSet<AssetId>>,
    in_flight: Mutex<HashMap<AssetId, InFlightSlot>>,
}

/// Per-asset lock plus the number of callers holding or awaiting it.
#[derive(Debug, Default)]
struct InFlightSlot {
    lock: Arc<AsyncMutex<()>>,
    users: usize,
}

impl ScriptLoadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, asset: &AssetId) -> bool {
        self.loaded.lock().contains(asset)
    }

    /// Records `asset` as loaded.
    ///
    /// Returns `true` when the asset was not recorded before.
    pub fn mark_loaded(&self, asset: &AssetId) -> bool {
        self.loaded.lock().insert(asset.clone())
    }

    /// Returns loaded asset ids in sorted order.
    pub fn loaded_assets(&self) -> Vec<AssetId> {
        self.loaded.lock().iter().cloned().collect()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.lock().len()
    }

    /// Number of assets that currently have a holder or waiter on their guard.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Waits until this caller is the only one working on `asset`.
    ///
    /// The returned guard releases the slot when dropped.
    pub async fn acquire(self: &Arc<Self>, asset: &AssetId) -> InFlightGuard {
        let lock = {
            let mut in_flight = self.in_flight.lock();
            let slot = in_flight.entry(asset.clone()).or_default();
            slot.users += 1;
            Arc::clone(&slot.lock)
        };
        // Registered before waiting so an abandoned acquire still releases.
        let user = SlotUser {
            registry: Arc::clone(self),
            asset: asset.clone(),
        };
        let guard = lock.lock_owned().await;
        InFlightGuard {
            guard: Some(guard),
            user,
        }
    }

    fn release(&self, asset: &AssetId) {
        let mut in_flight = self.in_flight.lock();
        let idle = match in_flight.get_mut(asset) {
            Some(slot) => {
                slot.users = slot.users.saturating_sub(1);
                slot.users == 0
            }
            None => false,
        };
        if idle {
            in_flight.remove(asset);
        }
    }
}

#[derive(Debug)]
struct SlotUser {
    registry: Arc<ScriptLoadRegistry>,
    asset: AssetId,
}

impl Drop for SlotUser {
    fn drop(&mut self) {
        self.registry.release(&self.asset);
    }
}

/// Exclusive right to run the privileged load for one asset.
#[derive(Debug)]
pub struct InFlightGuard {
    guard: Option<OwnedMutexGuard<()>>,
    user: SlotUser,
}

impl InFlightGuard {
    pub fn asset(&self) -> &AssetId {
        &self.user.asset
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        // Unlock before `user` deregisters.
        drop(self.guard.take());
    }
}
