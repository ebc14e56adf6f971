// ── Domain model ──
//
// Canonical types for the reconciliation core, normalized from the wire
// shapes in `rfsight-api`. Conversion lives in `crate::convert`.

mod monitor;
mod topology;

pub use monitor::{ActionStatus, DeviceMonitor};
pub use topology::{GraphPatch, NetworkGraph, NetworkKey, TopologyLink, TopologyNode};

// The node classification is shared verbatim with the wire layer.
pub use rfsight_api::NodeKind;
