// ── Monitor store ──
//
// Lock-free keyed storage of per-device telemetry with push-based
// change notification via `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::DeviceMonitor;

/// Reactive collection of [`DeviceMonitor`] entities, keyed by device id.
///
/// Upserts are full-snapshot replacements — the wire contract is that
/// every monitor frame carries the device's complete state, so a stored
/// entity is never field-merged, only swapped. Every mutation bumps a
/// version counter and rebuilds the snapshot that subscribers receive.
pub struct MonitorStore {
    by_id: DashMap<String, Arc<DeviceMonitor>>,

    /// Version counter, bumped on every mutation. The metrics layer keys
    /// its memoization on this.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<DeviceMonitor>>>>,
}

impl MonitorStore {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace one entity. Returns `true` if the id was new.
    pub fn upsert(&self, entity: DeviceMonitor) -> bool {
        let is_new = !self.by_id.contains_key(&entity.id);
        self.by_id.insert(entity.id.clone(), Arc::new(entity));
        self.rebuild_snapshot();
        self.bump_version();
        is_new
    }

    /// Insert or replace a batch in one notification cycle.
    pub fn upsert_many(&self, entities: Vec<DeviceMonitor>) {
        if entities.is_empty() {
            return;
        }
        for entity in entities {
            self.by_id.insert(entity.id.clone(), Arc::new(entity));
        }
        self.rebuild_snapshot();
        self.bump_version();
    }

    /// Remove an entity by id. Returns the removed entity if it existed.
    pub fn remove(&self, id: &str) -> Option<Arc<DeviceMonitor>> {
        let removed = self.by_id.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
            self.bump_version();
        }
        removed
    }

    /// Remove all entities.
    pub fn clear(&self) {
        self.by_id.clear();
        self.rebuild_snapshot();
        self.bump_version();
    }

    /// Look up one entity by device id.
    pub fn get(&self, id: &str) -> Option<Arc<DeviceMonitor>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone, order undefined).
    pub fn snapshot(&self) -> Arc<Vec<Arc<DeviceMonitor>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<DeviceMonitor>>>> {
        self.snapshot.subscribe()
    }

    /// Current mutation version.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let values: Vec<Arc<DeviceMonitor>> =
            self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

// ── Tests ────────────────────────────────────────────────────────────
