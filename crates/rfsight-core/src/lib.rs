//! Reactive reconciliation core between `rfsight-api` and UI consumers.
//!
//! This crate owns the domain model, the state container, and the merge
//! logic that keeps a live network dashboard consistent while partial
//! updates stream in:
//!
//! - **[`Session`]** — Central facade managing the full lifecycle:
//!   [`connect()`](Session::connect) opens the stream and starts the
//!   single dispatch task; [`disconnect()`](Session::disconnect) cancels
//!   the heartbeat and reconnect timers. Also hosts the seed and
//!   CRUD-deletion hooks.
//!
//! - **[`DataStore`]** — The explicit application-state object:
//!   [`MonitorStore`] (full-snapshot device telemetry),
//!   [`TimeSeriesStore`] (bounded metric history), and [`TopologyStore`]
//!   (per-network graphs with the non-destructive merge — adopted
//!   devices persist across updates, discovery-owned nodes do not).
//!
//! - **[`Dispatcher`]** — Exhaustive routing of decoded stream messages
//!   into store operations; unknown message types land in an
//!   observability sink instead of failing.
//!
//! - **[`MetricsView`]** — Memoized derived metrics per network: device
//!   membership, online/offline counts, station count, average latency,
//!   the composite health score, throughput aggregates, and the
//!   read-time merged topology for rendering.
//!
//! - **[`EntityStream`]** — Subscription handle for reactive consumers.

pub mod config;
mod convert;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod model;
pub mod seed;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_SERIES_MAX_POINTS, SessionConfig};
pub use dispatch::{Dispatcher, UnhandledMessage};
pub use error::CoreError;
pub use metrics::{
    MetricsView, NetworkReport, NetworkStatus, NetworkThroughput, StationThroughput,
};
pub use session::Session;
pub use store::{DataStore, MonitorStore, SeriesKey, SeriesPoint, TimeSeriesStore, TopologyStore};
pub use stream::EntityStream;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ActionStatus, DeviceMonitor, GraphPatch, NetworkGraph, NetworkKey, NodeKind, TopologyLink,
    TopologyNode,
};

// The connector types consumers need to tune a session.
pub use rfsight_api::{LinkState, ReconnectPolicy, TlsMode};
