// ── Metrics derivation layer ──
//
// Pure, memoized views over (topology store, monitor store) for one
// network at a time. Nothing in here writes back into the stores: the
// merged topology view enriches adopted-device nodes at read time only.
//
// Memoization is keyed on the two stores' version counters, so repeated
// reads between mutations return the *same* `Arc` — downstream consumers
// can use pointer identity to skip recomputation of their own.

use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{DeviceMonitor, NetworkGraph, NetworkKey, NodeKind};
use crate::store::DataStore;

/// Latency ceiling used to normalize the health score's latency factor.
const HEALTH_LATENCY_CEILING_MS: f64 = 200.0;

/// Online/offline device counts for one network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStatus {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

/// Aggregate station throughput for one network, bits per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkThroughput {
    pub download_bps: f64,
    pub upload_bps: f64,
}

/// Per-station throughput, for trend and edge-label consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct StationThroughput {
    pub id: String,
    pub download_bps: f64,
    pub upload_bps: f64,
}

/// Everything derived for one network, computed in a single pass.
#[derive(Debug, Clone, Default)]
pub struct NetworkReport {
    /// Ids of adopted-device nodes in the network's graph.
    pub device_ids: Vec<String>,
    /// Monitor entities for those ids (only the ones with telemetry).
    pub devices: Vec<Arc<DeviceMonitor>>,
    pub status: NetworkStatus,
    /// Count of `wifiStation` nodes.
    pub stations: usize,
    /// Arithmetic mean of known latencies, 0 when none are known.
    pub average_latency_ms: f64,
    /// Composite 0–100 health score.
    pub health: u8,
    pub throughput: NetworkThroughput,
    pub station_throughput: Vec<StationThroughput>,
}

struct Cached<T> {
    monitor_version: u64,
    topology_version: u64,
    value: Arc<T>,
}

/// Memoized read-only view over a [`DataStore`].
pub struct MetricsView {
    store: Arc<DataStore>,
    reports: DashMap<NetworkKey, Cached<NetworkReport>>,
    merged: DashMap<NetworkKey, Cached<NetworkGraph>>,
}

impl MetricsView {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self {
            store,
            reports: DashMap::new(),
            merged: DashMap::new(),
        }
    }

    /// The derived report for one network.
    ///
    /// Referentially stable: while neither store has mutated, the same
    /// `Arc` is returned. Unknown networks yield an all-zero report.
    pub fn report(&self, organization_id: &str, network_id: &str) -> Arc<NetworkReport> {
        let key = NetworkKey::new(organization_id, network_id);
        let monitor_version = self.store.monitors.version();
        let topology_version = self.store.topology.version();

        if let Some(cached) = self.reports.get(&key) {
            if cached.monitor_version == monitor_version
                && cached.topology_version == topology_version
            {
                return Arc::clone(&cached.value);
            }
        }

        let value = Arc::new(self.compute_report(&key));
        self.reports.insert(
            key,
            Cached {
                monitor_version,
                topology_version,
                value: Arc::clone(&value),
            },
        );
        value
    }

    // ── Individual selectors (thin views over the report) ────────────

    /// Adopted-device node ids in the network's graph.
    pub fn device_ids_for_network(&self, organization_id: &str, network_id: &str) -> Vec<String> {
        self.report(organization_id, network_id).device_ids.clone()
    }

    /// Monitor entities whose id belongs to the network's graph.
    pub fn devices_for_network(
        &self,
        organization_id: &str,
        network_id: &str,
    ) -> Vec<Arc<DeviceMonitor>> {
        self.report(organization_id, network_id).devices.clone()
    }

    pub fn online_offline(&self, organization_id: &str, network_id: &str) -> NetworkStatus {
        self.report(organization_id, network_id).status
    }

    pub fn stations_count(&self, organization_id: &str, network_id: &str) -> usize {
        self.report(organization_id, network_id).stations
    }

    pub fn average_latency(&self, organization_id: &str, network_id: &str) -> f64 {
        self.report(organization_id, network_id).average_latency_ms
    }

    pub fn network_health(&self, organization_id: &str, network_id: &str) -> u8 {
        self.report(organization_id, network_id).health
    }

    pub fn network_throughput(
        &self,
        organization_id: &str,
        network_id: &str,
    ) -> NetworkThroughput {
        self.report(organization_id, network_id).throughput
    }

    /// The network's graph with adopted-device nodes enriched from the
    /// monitor store (`online`, `latency_ms`, `uptime_secs`).
    ///
    /// Presentation-only: the topology store is never written. `None`
    /// when the network has no graph yet.
    pub fn merged_topology(
        &self,
        organization_id: &str,
        network_id: &str,
    ) -> Option<Arc<NetworkGraph>> {
        let key = NetworkKey::new(organization_id, network_id);
        let monitor_version = self.store.monitors.version();
        let topology_version = self.store.topology.version();

        if let Some(cached) = self.merged.get(&key) {
            if cached.monitor_version == monitor_version
                && cached.topology_version == topology_version
            {
                return Some(Arc::clone(&cached.value));
            }
        }

        let graph = self.store.topology.graph(organization_id, network_id)?;
        let value = Arc::new(self.compute_merged(&graph));
        self.merged.insert(
            key,
            Cached {
                monitor_version,
                topology_version,
                value: Arc::clone(&value),
            },
        );
        Some(value)
    }

    // ── Computation ──────────────────────────────────────────────────

    fn compute_report(&self, key: &NetworkKey) -> NetworkReport {
        let Some(graph) = self
            .store
            .topology
            .graph(&key.organization_id, &key.network_id)
        else {
            return NetworkReport::default();
        };

        let device_ids: Vec<String> = graph
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::AdoptedDevice)
            .map(|n| n.id.clone())
            .collect();

        let devices: Vec<Arc<DeviceMonitor>> = device_ids
            .iter()
            .filter_map(|id| self.store.monitors.get(id))
            .collect();

        let online = devices.iter().filter(|d| d.online).count();
        let status = NetworkStatus {
            total: devices.len(),
            online,
            offline: devices.len() - online,
        };

        let latencies: Vec<f64> = devices.iter().filter_map(|d| d.latency_ms).collect();
        let average_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };

        let stations = graph.count_kind(NodeKind::WifiStation);

        let mut throughput = NetworkThroughput::default();
        let mut station_throughput = Vec::new();
        for node in graph.nodes.iter().filter(|n| n.kind == NodeKind::WifiStation) {
            let download_bps = node.throughput_rx_bps.unwrap_or(0.0);
            let upload_bps = node.throughput_tx_bps.unwrap_or(0.0);
            throughput.download_bps += download_bps;
            throughput.upload_bps += upload_bps;
            station_throughput.push(StationThroughput {
                id: node.id.clone(),
                download_bps,
                upload_bps,
            });
        }
        throughput.download_bps = throughput.download_bps.round();
        throughput.upload_bps = throughput.upload_bps.round();

        NetworkReport {
            health: health_score(status.online, status.total, average_latency_ms),
            device_ids,
            devices,
            status,
            stations,
            average_latency_ms,
            throughput,
            station_throughput,
        }
    }

    fn compute_merged(&self, graph: &NetworkGraph) -> NetworkGraph {
        let mut merged = graph.clone();
        for node in &mut merged.nodes {
            if node.kind != NodeKind::AdoptedDevice {
                continue;
            }
            let monitor = self.store.monitors.get(&node.id);
            node.online = Some(monitor.as_ref().is_some_and(|m| m.online));
            node.latency_ms = monitor.as_ref().and_then(|m| m.latency_ms);
            node.uptime_secs = monitor.as_ref().and_then(|m| m.uptime_secs());
        }
        merged
    }
}

/// Composite health score for one network.
///
/// Fixed policy: 70% availability, 30% latency, with latency normalized
/// against a 200 ms ceiling. 0 when the network has no monitored devices.
pub fn health_score(online: usize, total: usize, average_latency_ms: f64) -> u8 {
    if total == 0 {
        return 0;
    }
    let availability = online as f64 / total as f64;
    let latency_factor = (1.0 - average_latency_ms / HEALTH_LATENCY_CEILING_MS).clamp(0.0, 1.0);
    let health = 100.0 * (0.7 * availability + 0.3 * latency_factor);
    health.round() as u8
}

// ── Tests ────────────────────────────────────────────────────────────
