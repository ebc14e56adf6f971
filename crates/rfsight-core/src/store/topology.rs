// ── Topology store ──
//
// Hierarchical network graphs keyed by (organization, network), fed by
// the discovery stream and the one-shot device seed. The merge is
// non-destructive: adopted-device nodes are CRUD-owned and survive every
// stream update; discovery-owned nodes (stations, LLDP neighbors) live
// only as long as the latest update still reports them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{GraphPatch, NetworkGraph, NetworkKey, NodeKind, TopologyNode};

/// Reactive store of per-network topology graphs.
///
/// Graph values are copy-on-write (`Arc`-wrapped, replaced wholesale per
/// mutation) so readers always observe a consistent graph. Networks are
/// fully independent: an update touching one network never perturbs the
/// others.
pub struct TopologyStore {
    graphs: DashMap<NetworkKey, Arc<NetworkGraph>>,

    /// Version counter, bumped on every mutation. The metrics layer keys
    /// its memoization on this.
    version: watch::Sender<u64>,

    /// Stamped after every stream merge (not by seeding).
    last_updated: watch::Sender<Option<DateTime<Utc>>>,
}

impl TopologyStore {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (last_updated, _) = watch::channel(None);

        Self {
            graphs: DashMap::new(),
            version,
            last_updated,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// The current graph of one network (cheap `Arc` clone).
    pub fn graph(&self, organization_id: &str, network_id: &str) -> Option<Arc<NetworkGraph>> {
        self.graphs
            .get(&NetworkKey::new(organization_id, network_id))
            .map(|r| Arc::clone(r.value()))
    }

    /// Every network currently known to the store.
    pub fn networks(&self) -> Vec<NetworkKey> {
        self.graphs.iter().map(|r| r.key().clone()).collect()
    }

    /// Current mutation version.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// When the last stream merge was applied, if any.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.last_updated.borrow()
    }

    /// Subscribe to merge timestamps (fires once per applied stream update).
    pub fn subscribe_last_updated(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_updated.subscribe()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Apply one stream update, network by network.
    ///
    /// Per network: adopted-device nodes are always retained (updated in
    /// place via field-union when the update mentions them); other nodes
    /// are retained only while present in the update; new nodes are
    /// appended; the link set is recomputed from the update and pruned
    /// against the final node set. Networks absent from the update are
    /// left untouched.
    pub fn merge(&self, updates: Vec<(NetworkKey, GraphPatch)>) {
        if updates.is_empty() {
            return;
        }

        for (key, patch) in updates {
            let merged = {
                let existing = self.graphs.get(&key).map(|r| Arc::clone(r.value()));
                merge_graph(existing.as_deref(), patch)
            };
            self.graphs.insert(key, Arc::new(merged));
        }

        self.bump_version();
        let _ = self.last_updated.send(Some(Utc::now()));
    }

    /// Seed baseline adopted-device nodes before any stream data arrives.
    ///
    /// Existing entries win: a node whose id is already present is left
    /// exactly as it is, so re-seeding on every listing re-fetch cannot
    /// perturb live data. Idempotent.
    pub fn seed_initial_devices(&self, key: NetworkKey, nodes: Vec<TopologyNode>) {
        let mut entry = self.graphs.entry(key).or_default();
        let graph = Arc::make_mut(&mut entry);

        let known: HashSet<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        let mut seen = known;
        for node in nodes {
            if seen.insert(node.id.clone()) {
                graph.nodes.push(node);
            }
        }
        drop(entry);

        self.bump_version();
    }

    /// Adoption-time variant of seeding: new device nodes take priority
    /// over stale entries with the same id and are prepended; existing
    /// nodes of other ids (including non-device nodes) are kept.
    pub fn set_initial_network_devices(&self, key: NetworkKey, nodes: Vec<TopologyNode>) {
        let mut entry = self.graphs.entry(key).or_default();
        let graph = Arc::make_mut(&mut entry);

        let mut fresh: Vec<TopologyNode> = Vec::with_capacity(nodes.len());
        let mut fresh_ids: HashSet<String> = HashSet::new();
        for node in nodes {
            if fresh_ids.insert(node.id.clone()) {
                fresh.push(node);
            }
        }

        let kept = graph
            .nodes
            .drain(..)
            .filter(|n| !fresh_ids.contains(&n.id));
        fresh.extend(kept);
        graph.nodes = fresh;

        let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        graph
            .links
            .retain(|l| ids.contains(l.source.as_str()) && ids.contains(l.target.as_str()));
        drop(entry);

        self.bump_version();
    }

    /// Explicitly remove a device node and its links.
    ///
    /// The merge never evicts adopted devices, so CRUD-layer deletion
    /// must call this hook. Returns `true` if the node existed.
    pub fn remove_device(&self, key: &NetworkKey, device_id: &str) -> bool {
        let Some(mut entry) = self.graphs.get_mut(key) else {
            return false;
        };
        let graph = Arc::make_mut(entry.value_mut());

        let before = graph.nodes.len();
        graph.nodes.retain(|n| n.id != device_id);
        if graph.nodes.len() == before {
            return false;
        }
        graph
            .links
            .retain(|l| l.source != device_id && l.target != device_id);
        drop(entry);

        self.bump_version();
        true
    }

    /// Drop every graph.
    pub fn clear(&self) {
        self.graphs.clear();
        self.bump_version();
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

/// Merge one incoming discovery result over one network's current graph.
///
/// Pure so the retention rules are testable in isolation:
/// 1. adopted-device nodes are retained regardless of the incoming set;
/// 2. other existing nodes survive only if the update still reports them;
/// 3. retained nodes mentioned by the update absorb its fields
///    (field-union, incoming wins);
/// 4. genuinely new nodes are appended;
/// 5. the link set is the incoming one, pruned to ids present in the
///    final node set — no dangling edges.
fn merge_graph(existing: Option<&NetworkGraph>, patch: GraphPatch) -> NetworkGraph {
    let mut incoming_index: std::collections::HashMap<String, usize> =
        std::collections::HashMap::with_capacity(patch.nodes.len());
    for (i, node) in patch.nodes.iter().enumerate() {
        incoming_index.entry(node.id.clone()).or_insert(i);
    }

    let mut nodes: Vec<TopologyNode> = Vec::new();
    let mut result_ids: HashSet<String> = HashSet::new();
    let mut consumed = vec![false; patch.nodes.len()];

    if let Some(existing) = existing {
        for node in &existing.nodes {
            let mentioned = incoming_index.get(&node.id).copied();
            let retained = node.kind == NodeKind::AdoptedDevice || mentioned.is_some();
            if !retained {
                continue;
            }

            let mut node = node.clone();
            if let Some(i) = mentioned {
                node.absorb(patch.nodes[i].clone());
                consumed[i] = true;
            }
            result_ids.insert(node.id.clone());
            nodes.push(node);
        }
    }

    for (i, node) in patch.nodes.into_iter().enumerate() {
        if consumed[i] || result_ids.contains(&node.id) {
            continue;
        }
        result_ids.insert(node.id.clone());
        nodes.push(node);
    }

    let links = patch
        .links
        .into_iter()
        .filter(|l| result_ids.contains(&l.source) && result_ids.contains(&l.target))
        .collect();

    NetworkGraph { nodes, links }
}

// ── Tests ────────────────────────────────────────────────────────────
