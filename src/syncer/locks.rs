//! Per-pair serialization
//!
//! The controller and the host sweep both reach the reconciler. Every pass
//! over an identity pair holds that pair's lock from the first read to the
//! last write, keyed by the virtual volume name.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Keyed async locks, one per identity pair
#[derive(Clone, Default)]
pub struct PairLocks {
    slots: Slots,
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> PairGuard {
        let slot = self
            .slots
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        let guard = slot.clone().lock_owned().await;
        PairGuard {
            slots: self.slots.clone(),
            key: key.to_string(),
            slot,
            guard: Some(guard),
        }
    }

    /// Number of pairs currently locked or waited on
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held for the duration of one reconciliation
pub struct PairGuard {
    slots: Slots,
    key: String,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PairGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.slots.lock();
        // The map and this guard hold the only references: nobody is waiting
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
