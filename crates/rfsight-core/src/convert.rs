// ── Wire → domain conversion ──
//
// Normalizes the transport layer's validated wire shapes into the
// canonical domain types the stores hold. All conversions are total:
// missing optional data degrades to neutral values, never to an error.

use chrono::{DateTime, Utc};

use rfsight_api::wire::{
    DeviceReading, DeviceRecord, GraphUpdate, LinkUpdate, MonitorData, NodeKind, NodeUpdate,
};

use crate::model::{
    ActionStatus, DeviceMonitor, GraphPatch, NetworkKey, TopologyLink, TopologyNode,
};

/// Flatten a hierarchical monitor payload into one entity per leaf device.
///
/// The organization/network grouping only matters for topology; monitor
/// entities are keyed globally by device id.
pub(crate) fn flatten_monitor(data: MonitorData) -> Vec<DeviceMonitor> {
    let mut entities = Vec::new();
    for org in data.organizations.into_values() {
        for network in org.networks.into_values() {
            for (device_id, reading) in network.devices {
                entities.push(monitor_from_reading(device_id, reading));
            }
        }
    }
    entities
}

/// One device's wire snapshot → domain entity.
pub(crate) fn monitor_from_reading(id: String, reading: DeviceReading) -> DeviceMonitor {
    DeviceMonitor {
        id,
        online: reading.online,
        latency_ms: reading.latency,
        stats: reading.stats.into_iter().collect(),
        actions: reading
            .actions_statuses
            .into_iter()
            .map(|(name, status)| {
                (
                    name,
                    ActionStatus {
                        status: status.status,
                        message: status.message,
                    },
                )
            })
            .collect(),
        timestamp: parse_timestamp(reading.timestamp.as_deref()),
    }
}

/// RFC-3339 parse with a now() fallback — a missing or mangled stamp
/// must not discard the reading.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(Utc::now, |t| t.with_timezone(&Utc))
}

/// One network's wire graph → domain patch for the topology merge.
pub(crate) fn patch_from_graph(update: GraphUpdate) -> GraphPatch {
    GraphPatch {
        nodes: update.nodes.into_iter().map(node_from_update).collect(),
        links: update.links.into_iter().map(link_from_update).collect(),
    }
}

pub(crate) fn node_from_update(update: NodeUpdate) -> TopologyNode {
    TopologyNode {
        id: update.id,
        kind: update.kind,
        name: update.name,
        mac: update.mac,
        ip: update.ip,
        model: update.model,
        fw_version: update.fw_version,
        location: update.location,
        online: update.online,
        latency_ms: update.latency,
        uptime_secs: None,
        throughput_rx_bps: update.throughput_rx_bps,
        throughput_tx_bps: update.throughput_tx_bps,
        extra: update.extra,
    }
}

pub(crate) fn link_from_update(update: LinkUpdate) -> TopologyLink {
    let id = update
        .id
        .unwrap_or_else(|| format!("{}-{}", update.source, update.target));
    TopologyLink {
        id,
        source: update.source,
        target: update.target,
        animated: update.animated,
    }
}

/// Synthesize a baseline adopted-device node from a REST device record.
///
/// Seeded nodes start offline with no latency; the live stream fills
/// those in once it connects.
pub(crate) fn node_from_record(record: DeviceRecord) -> TopologyNode {
    TopologyNode {
        name: record.name.or_else(|| Some(record.id.clone())),
        id: record.id,
        kind: NodeKind::AdoptedDevice,
        mac: record.mac_address,
        ip: record.ip_address,
        model: record.model,
        fw_version: record.fw_version,
        location: record.location,
        online: Some(false),
        latency_ms: None,
        uptime_secs: None,
        throughput_rx_bps: None,
        throughput_tx_bps: None,
        extra: serde_json::Map::new(),
    }
}

/// Expand a hierarchical topology payload into per-network patches.
pub(crate) fn topology_updates(
    data: rfsight_api::wire::TopologyData,
) -> Vec<(NetworkKey, GraphPatch)> {
    let mut updates = Vec::new();
    for (org_id, org) in data.organizations {
        for (network_id, graph) in org.networks {
            updates.push((
                NetworkKey::new(org_id.clone(), network_id),
                patch_from_graph(graph),
            ));
        }
    }
    updates
}

// ── Tests ────────────────────────────────────────────────────────────
