// ── Topology domain types ──

use serde::Serialize;

use rfsight_api::NodeKind;

/// Addresses one network's graph within the topology store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkKey {
    pub organization_id: String,
    pub network_id: String,
}

impl NetworkKey {
    pub fn new(organization_id: impl Into<String>, network_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            network_id: network_id.into(),
        }
    }
}

impl std::fmt::Display for NetworkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.organization_id, self.network_id)
    }
}

/// One node of a network graph.
///
/// `AdoptedDevice` nodes are owned by the CRUD layer and survive stream
/// merges; every other kind lives only as long as discovery keeps
/// reporting it. Known fields are typed, the rest of what the server
/// sends rides along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: Option<String>,
    pub mac: Option<String>,
    pub ip: Option<String>,
    pub model: Option<String>,
    pub fw_version: Option<String>,
    pub location: Option<String>,
    /// Live flags, populated for adopted devices by the merged read-time
    /// view (`MetricsView::merged_topology`) -- the store itself keeps
    /// whatever discovery last reported.
    pub online: Option<bool>,
    pub latency_ms: Option<f64>,
    pub uptime_secs: Option<f64>,
    /// Station throughput as reported by discovery (rx = download).
    pub throughput_rx_bps: Option<f64>,
    pub throughput_tx_bps: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TopologyNode {
    /// Display label: name when known, id otherwise.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Field-union merge: fields the incoming node carries win, fields it
    /// omits keep their existing values. `extra` entries are unioned the
    /// same way. A missing/unrecognized incoming `type` keeps the
    /// existing classification.
    pub(crate) fn absorb(&mut self, incoming: TopologyNode) {
        if incoming.kind != NodeKind::Unknown {
            self.kind = incoming.kind;
        }
        merge_field(&mut self.name, incoming.name);
        merge_field(&mut self.mac, incoming.mac);
        merge_field(&mut self.ip, incoming.ip);
        merge_field(&mut self.model, incoming.model);
        merge_field(&mut self.fw_version, incoming.fw_version);
        merge_field(&mut self.location, incoming.location);
        merge_field(&mut self.online, incoming.online);
        merge_field(&mut self.latency_ms, incoming.latency_ms);
        merge_field(&mut self.uptime_secs, incoming.uptime_secs);
        merge_field(&mut self.throughput_rx_bps, incoming.throughput_rx_bps);
        merge_field(&mut self.throughput_tx_bps, incoming.throughput_tx_bps);
        for (key, value) in incoming.extra {
            self.extra.insert(key, value);
        }
    }
}

fn merge_field<T>(existing: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *existing = incoming;
    }
}

/// An edge between two node ids within one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyLink {
    pub id: String,
    pub source: String,
    pub target: String,
    pub animated: bool,
}

/// One network's graph: nodes unique by id plus the links between them.
///
/// Owned exclusively by the topology store; mutated only through its
/// merge/seed/removal operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkGraph {
    pub nodes: Vec<TopologyNode>,
    pub links: Vec<TopologyLink>,
}

impl NetworkGraph {
    /// Node lookup by id.
    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Count of nodes of the given kind.
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }
}

/// One network's slice of an incoming topology update, already converted
/// to domain types.
#[derive(Debug, Clone, Default)]
pub struct GraphPatch {
    pub nodes: Vec<TopologyNode>,
    pub links: Vec<TopologyLink>,
}

// ── Tests ────────────────────────────────────────────────────────────
