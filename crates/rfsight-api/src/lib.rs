//! Async transport layer for an RFSight management server.
//!
//! Two surfaces:
//!
//! - **[`stream`]** — the persistent WebSocket connection carrying live
//!   device-monitor and topology updates. [`StreamHandle`] owns the
//!   connection lifecycle (heartbeat, fixed-delay reconnect, teardown) and
//!   feeds decoded [`StreamMessage`]s to a single consumer.
//! - **[`rest`]** — a thin REST client for the one-shot device listing the
//!   topology seed uses before any stream data arrives.
//!
//! Wire shapes live in [`wire`]; every frame is schema-validated at this
//! boundary so nothing loosely typed leaks into the store layer.
//! `rfsight-core` maps [`Error`] into its own user-facing diagnostics.

pub mod error;
pub mod rest;
pub mod stream;
pub mod transport;
pub mod wire;

pub use error::Error;
pub use rest::RestClient;
pub use stream::{LinkState, ReconnectPolicy, StreamHandle};
pub use transport::{TlsMode, TransportConfig};
pub use wire::{
    DeviceCollection, DeviceReading, DeviceRecord, GraphUpdate, LinkUpdate, MonitorData,
    NodeKind, NodeUpdate, StreamMessage, TopologyData,
};
