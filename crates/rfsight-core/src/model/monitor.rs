// ── Device-monitor domain types ──

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one profile action during the server's monitor cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionStatus {
    pub status: String,
    pub message: Option<String>,
}

/// Live telemetry for one device, keyed by device id.
///
/// Each stream frame carries a *complete* snapshot: the Monitor Store
/// replaces the whole entity on upsert, never field-merges. Staleness is
/// the consumer's call, inferred from `timestamp` -- entities never
/// expire on their own.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceMonitor {
    pub id: String,
    pub online: bool,
    /// Round-trip latency in milliseconds; absent while offline.
    pub latency_ms: Option<f64>,
    /// Open-ended metric map straight from the device profile's monitor
    /// actions. Only numeric entries feed the time-series store.
    pub stats: HashMap<String, serde_json::Value>,
    /// Per-action execution outcome.
    pub actions: HashMap<String, ActionStatus>,
    /// Server-stamped time of this snapshot.
    pub timestamp: DateTime<Utc>,
}

impl DeviceMonitor {
    /// Device uptime in seconds, when the profile reports one.
    pub fn uptime_secs(&self) -> Option<f64> {
        self.stats.get("uptime").and_then(serde_json::Value::as_f64)
    }
}
