// ── Initial-seed adapter ──
//
// Bridges the REST device listing into baseline topology nodes so the
// graph is populated before (or without) any live stream data.

use tracing::debug;

use rfsight_api::RestClient;
use rfsight_api::wire::DeviceRecord;

use crate::convert;
use crate::error::CoreError;
use crate::model::NetworkKey;
use crate::store::DataStore;

/// Fetch the network's device listing and seed baseline adopted-device
/// nodes. Safe to call on every listing re-fetch: already-present nodes
/// are left untouched.
///
/// Returns the number of records fetched.
pub async fn seed_network_devices(
    rest: &RestClient,
    store: &DataStore,
    organization_id: &str,
    network_id: &str,
) -> Result<usize, CoreError> {
    let records = rest
        .list_network_devices(organization_id, network_id)
        .await?;
    let count = records.len();
    apply_seed_records(store, organization_id, network_id, records);
    debug!(organization_id, network_id, count, "seeded baseline devices");
    Ok(count)
}

/// Seed a pre-fetched listing (the REST round-trip already done).
pub fn apply_seed_records(
    store: &DataStore,
    organization_id: &str,
    network_id: &str,
    records: Vec<DeviceRecord>,
) {
    let nodes = records.into_iter().map(convert::node_from_record).collect();
    store
        .topology
        .seed_initial_devices(NetworkKey::new(organization_id, network_id), nodes);
}

/// Adoption-time refresh: replace stale device entries with the records
/// just adopted, keeping discovery-owned nodes.
pub fn apply_adopted_devices(
    store: &DataStore,
    organization_id: &str,
    network_id: &str,
    records: Vec<DeviceRecord>,
) {
    let nodes = records.into_iter().map(convert::node_from_record).collect();
    store
        .topology
        .set_initial_network_devices(NetworkKey::new(organization_id, network_id), nodes);
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    fn record(id: &str, name: &str) -> DeviceRecord {
        serde_json::from_value(serde_json::json!({ "id": id, "name": name })).unwrap()
    }

    #[test]
    fn seeding_populates_offline_device_nodes() {
        let store = DataStore::new(120);
        apply_seed_records(
            &store,
            "org1",
            "net1",
            vec![record("d1", "core-sw"), record("d2", "ap-1")],
        );

        let graph = store.topology.graph("org1", "net1").unwrap();
        assert_eq!(graph.count_kind(NodeKind::AdoptedDevice), 2);
        assert_eq!(graph.node("d1").unwrap().online, Some(false));
        assert_eq!(graph.node("d2").unwrap().label(), "ap-1");
    }
}
