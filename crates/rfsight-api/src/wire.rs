//! Wire shapes for the management server's stream and REST surfaces.
//!
//! Every stream frame is a JSON object with a `messageType` discriminant.
//! [`decode_frame`] validates a raw text frame into the [`StreamMessage`]
//! sum type; anything that fails validation is reported as an error and
//! the connector drops the frame. Unrecognized message types decode into
//! [`StreamMessage::Unknown`] so they can be surfaced for observability
//! without ever failing the stream.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── Stream envelope ──────────────────────────────────────────────────

/// A decoded frame from the management server's stream.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// Per-device live telemetry, grouped organization → network → device.
    DeviceMonitor(MonitorData),
    /// Discovered network graphs, grouped organization → network.
    Topology(TopologyData),
    /// Any other `messageType` — accepted, surfaced, otherwise ignored.
    Unknown {
        message_type: String,
        data: serde_json::Value,
    },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "messageType")]
    message_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode one text frame into a [`StreamMessage`].
///
/// A frame that is not valid JSON, lacks `messageType`, or carries a
/// recognized type with a malformed payload yields `Err` — the caller
/// drops it. Unknown message types are never an error.
pub fn decode_frame(text: &str) -> Result<StreamMessage, Error> {
    let envelope: RawEnvelope =
        serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: truncate_body(text),
        })?;

    match envelope.message_type.as_str() {
        "deviceMonitor" => {
            let data: MonitorData =
                serde_json::from_value(envelope.data).map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body: truncate_body(text),
                })?;
            Ok(StreamMessage::DeviceMonitor(data))
        }
        "topology" => {
            let data: TopologyData =
                serde_json::from_value(envelope.data).map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body: truncate_body(text),
                })?;
            Ok(StreamMessage::Topology(data))
        }
        _ => Ok(StreamMessage::Unknown {
            message_type: envelope.message_type,
            data: envelope.data,
        }),
    }
}

/// Keep error bodies bounded — frames can be large.
fn truncate_body(text: &str) -> String {
    const MAX: usize = 512;
    if text.len() <= MAX {
        text.to_owned()
    } else {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i <= MAX)
            .last()
            .map_or(0, |(i, _)| i);
        format!("{}…", &text[..cut])
    }
}

// ── Device-monitor payload ───────────────────────────────────────────

/// `deviceMonitor` payload: organizations → networks → devices.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorData {
    #[serde(default)]
    pub organizations: HashMap<String, MonitorOrg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorOrg {
    #[serde(default)]
    pub networks: HashMap<String, MonitorNetwork>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorNetwork {
    #[serde(default)]
    pub devices: HashMap<String, DeviceReading>,
}

/// One device's telemetry snapshot as sent on the wire.
///
/// Each frame carries a *complete* snapshot for the device — the store
/// layer replaces, never field-merges, monitor entities.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceReading {
    #[serde(default)]
    pub online: bool,
    /// Round-trip latency in milliseconds, absent while offline.
    #[serde(default)]
    pub latency: Option<f64>,
    /// Open-ended metric map; only numeric entries feed the time series.
    #[serde(default)]
    pub stats: serde_json::Map<String, serde_json::Value>,
    /// Per-action execution outcome from the server's monitor cycle.
    #[serde(default, rename = "actionsStatuses")]
    pub actions_statuses: HashMap<String, ActionStatusWire>,
    /// RFC-3339 timestamp stamped by the server.
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionStatusWire {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

// ── Topology payload ─────────────────────────────────────────────────

/// `topology` payload: organizations → networks → graph updates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyData {
    #[serde(default)]
    pub organizations: HashMap<String, TopologyOrg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyOrg {
    #[serde(default)]
    pub networks: HashMap<String, GraphUpdate>,
}

/// One network's discovery result.
///
/// `nodes`/`links` default to empty so a malformed or error-carrying
/// network entry degrades to a no-op instead of failing the sibling
/// networks in the same payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphUpdate {
    #[serde(default)]
    pub nodes: Vec<NodeUpdate>,
    #[serde(default)]
    pub links: Vec<LinkUpdate>,
}

/// Topology node classification.
///
/// `AdoptedDevice` nodes are authoritative (CRUD-owned) and survive
/// merges; every other kind is ephemeral discovery state. Unrecognized
/// type strings map to [`NodeKind::Unknown`] and are treated as
/// ephemeral, so a newer server cannot wedge permanent entries into the
/// graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
pub enum NodeKind {
    #[serde(rename = "adoptedDevice")]
    #[strum(serialize = "adoptedDevice")]
    AdoptedDevice,
    #[serde(rename = "wifiStation")]
    #[strum(serialize = "wifiStation")]
    WifiStation,
    #[serde(rename = "lldp")]
    #[strum(serialize = "lldp")]
    Lldp,
    #[default]
    #[serde(other, rename = "unknown")]
    #[strum(serialize = "unknown")]
    Unknown,
}

/// A node as reported by one discovery pass.
///
/// Known fields are typed; everything else the server sends is captured
/// in `extra` so the merge never silently discards data (stations carry
/// driver-specific attributes like signal and band).
#[derive(Debug, Clone, Deserialize)]
pub struct NodeUpdate {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub fw_version: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default)]
    pub latency: Option<f64>,
    #[serde(default)]
    pub throughput_rx_bps: Option<f64>,
    #[serde(default)]
    pub throughput_tx_bps: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A directed edge between two node ids.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkUpdate {
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub animated: bool,
}

// ── REST device listing ──────────────────────────────────────────────

/// A device record from `GET /devices/list`.
///
/// Only the fields the topology seed needs; the CRUD layer owns the rest.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub fw_version: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceCollection {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn decode_device_monitor_frame() {
        let raw = serde_json::json!({
            "messageType": "deviceMonitor",
            "data": { "organizations": { "org1": { "networks": { "net1": { "devices": {
                "dev1": {
                    "online": true,
                    "latency": 12.5,
                    "stats": { "uptime": 3600, "fw": "1.2.0" },
                    "actionsStatuses": { "getStats": { "status": "success" } },
                    "timestamp": "2026-03-01T12:00:00Z"
                }
            } } } } } }
        });

        let msg = decode_frame(&raw.to_string()).unwrap();
        let StreamMessage::DeviceMonitor(data) = msg else {
            panic!("expected deviceMonitor");
        };
        let reading = &data.organizations["org1"].networks["net1"].devices["dev1"];
        assert!(reading.online);
        assert_eq!(reading.latency, Some(12.5));
        assert_eq!(reading.stats["uptime"], 3600);
        assert_eq!(reading.actions_statuses["getStats"].status, "success");
    }

    #[test]
    fn decode_topology_frame() {
        let raw = serde_json::json!({
            "messageType": "topology",
            "data": { "organizations": { "org1": { "networks": { "net1": {
                "nodes": [
                    { "id": "dev1", "type": "adoptedDevice", "name": "core-sw" },
                    { "id": "sta1", "type": "wifiStation", "throughput_rx_bps": 1.5e6,
                      "signal_dbm": -52 }
                ],
                "links": [ { "source": "dev1", "target": "sta1", "animated": true } ]
            } } } } }
        });

        let msg = decode_frame(&raw.to_string()).unwrap();
        let StreamMessage::Topology(data) = msg else {
            panic!("expected topology");
        };
        let graph = &data.organizations["org1"].networks["net1"];
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].kind, NodeKind::AdoptedDevice);
        assert_eq!(graph.nodes[1].kind, NodeKind::WifiStation);
        // Unmodeled fields land in `extra`, not the floor.
        assert_eq!(graph.nodes[1].extra["signal_dbm"], -52);
        assert_eq!(graph.links.len(), 1);
        assert!(graph.links[0].animated);
        assert!(graph.links[0].id.is_none());
    }

    #[test]
    fn unknown_message_type_is_not_an_error() {
        let msg = decode_frame(r#"{"messageType":"firmwareNotice","data":{"v":"2.0"}}"#).unwrap();
        let StreamMessage::Unknown { message_type, data } = msg else {
            panic!("expected unknown");
        };
        assert_eq!(message_type, "firmwareNotice");
        assert_eq!(data["v"], "2.0");
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(decode_frame("not json at all").is_err());
        assert!(decode_frame(r#"{"no":"discriminant"}"#).is_err());
        // Recognized type with a payload of the wrong shape
        assert!(decode_frame(r#"{"messageType":"topology","data":{"organizations":42}}"#).is_err());
    }

    #[test]
    fn missing_nodes_and_links_default_to_empty() {
        let raw = serde_json::json!({
            "messageType": "topology",
            "data": { "organizations": { "org1": { "networks": {
                "bad": { "error": "discovery timed out" },
                "good": { "nodes": [ { "id": "d1", "type": "adoptedDevice" } ] }
            } } } }
        });

        let StreamMessage::Topology(data) = decode_frame(&raw.to_string()).unwrap() else {
            panic!("expected topology");
        };
        let networks = &data.organizations["org1"].networks;
        assert!(networks["bad"].nodes.is_empty());
        assert!(networks["bad"].links.is_empty());
        assert_eq!(networks["good"].nodes.len(), 1);
    }

    #[test]
    fn unrecognized_node_type_maps_to_unknown() {
        let node: NodeUpdate =
            serde_json::from_value(serde_json::json!({ "id": "x", "type": "mysteryKind" }))
                .unwrap();
        assert_eq!(node.kind, NodeKind::Unknown);

        // Absent type behaves the same way.
        let node: NodeUpdate = serde_json::from_value(serde_json::json!({ "id": "y" })).unwrap();
        assert_eq!(node.kind, NodeKind::Unknown);
    }

    #[test]
    fn device_reading_defaults() {
        let reading: DeviceReading = serde_json::from_value(serde_json::json!({
            "online": false
        }))
        .unwrap();
        assert!(!reading.online);
        assert!(reading.latency.is_none());
        assert!(reading.stats.is_empty());
        assert!(reading.timestamp.is_none());
    }
}
