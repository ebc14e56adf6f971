// ── Message dispatcher ──
//
// Routes decoded stream messages to the stores. Stateless beyond the
// observability sink: every mutation happens synchronously inside
// `dispatch`, so messages consumed by a single task can never interleave
// mid-mutation.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace};

use rfsight_api::wire::{MonitorData, StreamMessage, TopologyData};

use crate::convert;
use crate::store::{DataStore, SeriesPoint};

const UNHANDLED_CHANNEL_SIZE: usize = 64;

/// A stream message nobody recognizes — surfaced, never fatal.
#[derive(Debug, Clone)]
pub struct UnhandledMessage {
    pub message_type: String,
    pub data: serde_json::Value,
}

/// Routes each [`StreamMessage`] to the store operation it feeds.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<DataStore>,
    unhandled: broadcast::Sender<Arc<UnhandledMessage>>,
}

impl Dispatcher {
    pub fn new(store: Arc<DataStore>) -> Self {
        let (unhandled, _) = broadcast::channel(UNHANDLED_CHANNEL_SIZE);
        Self { store, unhandled }
    }

    /// Observability sink for unrecognized message types.
    pub fn subscribe_unhandled(&self) -> broadcast::Receiver<Arc<UnhandledMessage>> {
        self.unhandled.subscribe()
    }

    /// Apply one message to the stores. Synchronous and infallible:
    /// the worst case for bad input is a dropped or partial update.
    pub fn dispatch(&self, message: StreamMessage) {
        match message {
            StreamMessage::DeviceMonitor(data) => self.apply_monitor(data),
            StreamMessage::Topology(data) => self.apply_topology(data),
            StreamMessage::Unknown { message_type, data } => {
                debug!(message_type, "unhandled stream message");
                // Send errors just mean nobody is watching the sink.
                let _ = self
                    .unhandled
                    .send(Arc::new(UnhandledMessage { message_type, data }));
            }
        }
    }

    /// Flatten the hierarchy, append time-series samples for every
    /// numeric stat (plus latency), then bulk-upsert the snapshots.
    fn apply_monitor(&self, data: MonitorData) {
        let entities = convert::flatten_monitor(data);
        trace!(devices = entities.len(), "applying monitor update");

        for entity in &entities {
            for (metric, value) in &entity.stats {
                if let Some(value) = value.as_f64() {
                    self.store.series.push_point(
                        &entity.id,
                        metric,
                        SeriesPoint {
                            timestamp: entity.timestamp,
                            value,
                        },
                    );
                }
            }
            if let Some(latency) = entity.latency_ms {
                self.store.series.push_point(
                    &entity.id,
                    "latency",
                    SeriesPoint {
                        timestamp: entity.timestamp,
                        value: latency,
                    },
                );
            }
        }

        self.store.monitors.upsert_many(entities);
    }

    fn apply_topology(&self, data: TopologyData) {
        let updates = convert::topology_updates(data);
        trace!(networks = updates.len(), "applying topology update");
        self.store.topology.merge(updates);
    }
}

// ── Tests ────────────────────────────────────────────────────────────
