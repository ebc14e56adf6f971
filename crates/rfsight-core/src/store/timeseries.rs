// ── Time-series store ──
//
// Bounded per-(device, metric) sample buffers backing trend displays.
// A sliding window, not a summarization: oldest points are dropped
// first once a series reaches the cap.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// One timestamped sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Composite series address. A struct key (not a joined string) so two
/// distinct (device, metric) pairs can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub device_id: String,
    pub metric: String,
}

/// Bounded time-series buffers for every (device, metric) pair.
pub struct TimeSeriesStore {
    series: DashMap<SeriesKey, VecDeque<SeriesPoint>>,

    /// Retention cap. Changing it applies prospectively: existing series
    /// are trimmed on their next push, not immediately.
    max_points: AtomicUsize,
}

impl TimeSeriesStore {
    pub(crate) fn new(max_points: usize) -> Self {
        Self {
            series: DashMap::new(),
            max_points: AtomicUsize::new(max_points),
        }
    }

    /// Append a point, then trim from the front until the series fits
    /// the cap.
    pub fn push_point(&self, device_id: &str, metric: &str, point: SeriesPoint) {
        let key = SeriesKey {
            device_id: device_id.to_owned(),
            metric: metric.to_owned(),
        };
        let max = self.max_points.load(Ordering::Relaxed);
        let mut entry = self.series.entry(key).or_default();
        entry.push_back(point);
        while entry.len() > max {
            entry.pop_front();
        }
    }

    /// Change the retention cap for subsequent pushes.
    pub fn set_max_points(&self, max_points: usize) {
        self.max_points.store(max_points, Ordering::Relaxed);
    }

    pub fn max_points(&self) -> usize {
        self.max_points.load(Ordering::Relaxed)
    }

    /// The retained points of one series, oldest first.
    pub fn points(&self, device_id: &str, metric: &str) -> Vec<SeriesPoint> {
        let key = SeriesKey {
            device_id: device_id.to_owned(),
            metric: metric.to_owned(),
        };
        self.series
            .get(&key)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drop every series.
    pub fn clear(&self) {
        self.series.clear();
    }

    /// Drop all series belonging to one device.
    pub fn clear_device(&self, device_id: &str) {
        self.series.retain(|key, _| key.device_id != device_id);
    }

    /// Drop exactly one (device, metric) series.
    pub fn clear_series(&self, device_id: &str, metric: &str) {
        let key = SeriesKey {
            device_id: device_id.to_owned(),
            metric: metric.to_owned(),
        };
        self.series.remove(&key);
    }

    /// Number of live series (for diagnostics).
    pub fn series_count(&self) -> usize {
        self.series.len()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn point(value: f64) -> SeriesPoint {
        SeriesPoint {
            timestamp: Utc::now(),
            value,
        }
    }

    #[test]
    fn series_is_bounded_fifo() {
        let store = TimeSeriesStore::new(5);
        for i in 0..12 {
            store.push_point("d1", "cpu", point(f64::from(i)));
        }

        let points = store.points("d1", "cpu");
        assert_eq!(points.len(), 5);
        // The most recent 5 pushes, in push order.
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn max_points_change_applies_on_next_push() {
        let store = TimeSeriesStore::new(10);
        for i in 0..10 {
            store.push_point("d1", "cpu", point(f64::from(i)));
        }

        store.set_max_points(3);
        // Not retrimmed yet.
        assert_eq!(store.points("d1", "cpu").len(), 10);

        store.push_point("d1", "cpu", point(99.0));
        let points = store.points("d1", "cpu");
        assert_eq!(points.len(), 3);
        assert_eq!(points.last().unwrap().value, 99.0);
    }

    #[test]
    fn composite_keys_do_not_collide() {
        // A joined-string key would conflate these two addresses.
        let store = TimeSeriesStore::new(10);
        store.push_point("a", "b::c", point(1.0));
        store.push_point("a::b", "c", point(2.0));

        assert_eq!(store.points("a", "b::c").len(), 1);
        assert_eq!(store.points("a::b", "c").len(), 1);
        assert_eq!(store.points("a", "b::c")[0].value, 1.0);
        assert_eq!(store.points("a::b", "c")[0].value, 2.0);
    }

    #[test]
    fn clear_filters() {
        let store = TimeSeriesStore::new(10);
        store.push_point("d1", "cpu", point(1.0));
        store.push_point("d1", "mem", point(2.0));
        store.push_point("d2", "cpu", point(3.0));

        store.clear_series("d1", "cpu");
        assert!(store.points("d1", "cpu").is_empty());
        assert_eq!(store.points("d1", "mem").len(), 1);

        store.clear_device("d1");
        assert!(store.points("d1", "mem").is_empty());
        assert_eq!(store.points("d2", "cpu").len(), 1);

        store.clear();
        assert_eq!(store.series_count(), 0);
    }
}
