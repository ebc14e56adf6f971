// ── Central reactive data store ──
//
// Thread-safe storage for the reconciliation core's three collections.
// Mutations are broadcast to subscribers via `watch` channels.

mod monitor;
mod timeseries;
mod topology;

pub use monitor::MonitorStore;
pub use timeseries::{SeriesKey, SeriesPoint, TimeSeriesStore};
pub use topology::TopologyStore;

use crate::model::NetworkKey;

/// The application's state container, constructed once per [`Session`]
/// and shared by reference.
///
/// Single-writer policy: only the dispatch loop and the seed adapter
/// mutate; the metrics layer and UI consumers only read. All three
/// collections are individually thread-safe, so no outer lock is needed.
///
/// [`Session`]: crate::Session
pub struct DataStore {
    /// Per-device live telemetry.
    pub monitors: MonitorStore,
    /// Bounded metric history for trend displays.
    pub series: TimeSeriesStore,
    /// Per-network discovery graphs.
    pub topology: TopologyStore,
}

impl DataStore {
    pub fn new(series_max_points: usize) -> Self {
        Self {
            monitors: MonitorStore::new(),
            series: TimeSeriesStore::new(series_max_points),
            topology: TopologyStore::new(),
        }
    }

    /// Evict one device from every collection.
    ///
    /// The topology merge deliberately never removes adopted devices, so
    /// the CRUD layer must call this when a device is deleted.
    pub fn remove_device(&self, key: &NetworkKey, device_id: &str) -> bool {
        let existed = self.topology.remove_device(key, device_id);
        self.monitors.remove(device_id);
        self.series.clear_device(device_id);
        existed
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceMonitor, GraphPatch, NodeKind, TopologyNode};
    use chrono::Utc;
    use std::collections::HashMap;

    #[test]
    fn remove_device_clears_every_collection() {
        let store = DataStore::new(16);
        let key = NetworkKey::new("org1", "net1");

        store.topology.merge(vec![(
            key.clone(),
            GraphPatch {
                nodes: vec![TopologyNode {
                    id: "d1".into(),
                    kind: NodeKind::AdoptedDevice,
                    name: None,
                    mac: None,
                    ip: None,
                    model: None,
                    fw_version: None,
                    location: None,
                    online: None,
                    latency_ms: None,
                    uptime_secs: None,
                    throughput_rx_bps: None,
                    throughput_tx_bps: None,
                    extra: serde_json::Map::new(),
                }],
                links: vec![],
            },
        )]);
        store.monitors.upsert(DeviceMonitor {
            id: "d1".into(),
            online: true,
            latency_ms: Some(3.0),
            stats: HashMap::new(),
            actions: HashMap::new(),
            timestamp: Utc::now(),
        });
        store.series.push_point(
            "d1",
            "latency",
            crate::store::SeriesPoint {
                timestamp: Utc::now(),
                value: 3.0,
            },
        );

        assert!(store.remove_device(&key, "d1"));

        assert!(store.topology.graph("org1", "net1").unwrap().node("d1").is_none());
        assert!(store.monitors.get("d1").is_none());
        assert!(store.series.points("d1", "latency").is_empty());
    }
}
