// src/analysis/track_history.rs
//
// Sliding window of ground-plane longitudinal positions per vehicle.
// Capacity equals the frame rate, so a full window spans about one second.

use crate::types::VehicleKey;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TrackHistoryBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
    last_seen_secs: f64,
}

impl TrackHistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            last_seen_secs: 0.0,
        }
    }

    /// Push the newest longitudinal coordinate, evicting the oldest once full.
    pub fn append(&mut self, y: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(y);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// At least half a window of samples. Shorter windows give estimates
    /// too noisy to use.
    pub fn is_warmed_up(&self) -> bool {
        !self.samples.is_empty() && self.samples.len() as f64 >= self.capacity as f64 / 2.0
    }

    pub fn oldest(&self) -> Option<f64> {
        self.samples.front().copied()
    }

    pub fn newest(&self) -> Option<f64> {
        self.samples.back().copied()
    }
}

/// Owns one `TrackHistoryBuffer` per vehicle for the duration of a run.
pub struct TrackHistoryStore {
    buffers: HashMap<VehicleKey, TrackHistoryBuffer>,
    capacity: usize,
}

impl TrackHistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            capacity,
        }
    }

    /// Append a sample for `key`, creating its buffer on first sighting.
    pub fn append(&mut self, key: &VehicleKey, y: f64, timestamp_secs: f64) -> &TrackHistoryBuffer {
        let capacity = self.capacity;
        let buffer = self
            .buffers
            .entry(key.clone())
            .or_insert_with(|| TrackHistoryBuffer::new(capacity));
        buffer.append(y);
        buffer.last_seen_secs = timestamp_secs;
        buffer
    }

    pub fn get(&self, key: &VehicleKey) -> Option<&TrackHistoryBuffer> {
        self.buffers.get(key)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Drop buffers not fed for longer than `max_absence_secs`. Returns the
    /// number of buffers removed.
    pub fn evict_stale(&mut self, now_secs: f64, max_absence_secs: f64) -> usize {
        let before = self.buffers.len();
        self.buffers.retain(|key, buffer| {
            let keep = now_secs - buffer.last_seen_secs <= max_absence_secs;
            if !keep {
                debug!(
                    "Evicting history for {} - absent {:.1}s",
                    key,
                    now_secs - buffer.last_seen_secs
                );
            }
            keep
        });
        before - self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut buf = TrackHistoryBuffer::new(3);
        for y in [1.0, 2.0, 3.0, 4.0] {
            buf.append(y);
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.oldest(), Some(2.0));
        assert_eq!(buf.newest(), Some(4.0));
    }

    #[test]
    fn test_warm_up_needs_half_capacity() {
        let mut buf = TrackHistoryBuffer::new(30);
        for i in 0..14 {
            buf.append(i as f64);
        }
        assert!(!buf.is_warmed_up());
        buf.append(14.0);
        assert!(buf.is_warmed_up());
    }

    #[test]
    fn test_odd_capacity_rounds_up() {
        // 25 fps: 12 samples is below 12.5
        let mut buf = TrackHistoryBuffer::new(25);
        for i in 0..12 {
            buf.append(i as f64);
        }
        assert!(!buf.is_warmed_up());
        buf.append(12.0);
        assert!(buf.is_warmed_up());
    }

    #[test]
    fn test_store_creates_buffer_per_key() {
        let mut store = TrackHistoryStore::new(10);
        let car = VehicleKey::new(1, "car");
        let truck = VehicleKey::new(1, "truck");
        store.append(&car, 5.0, 0.0);
        store.append(&car, 6.0, 0.1);
        store.append(&truck, 9.0, 0.1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&car).map(|b| b.len()), Some(2));
        assert_eq!(store.get(&truck).and_then(|b| b.newest()), Some(9.0));
    }

    #[test]
    fn test_evict_stale_keeps_recent() {
        let mut store = TrackHistoryStore::new(10);
        let old = VehicleKey::new(1, "car");
        let recent = VehicleKey::new(2, "car");
        store.append(&old, 1.0, 0.0);
        store.append(&recent, 1.0, 9.0);

        let removed = store.evict_stale(10.0, 5.0);
        assert_eq!(removed, 1);
        assert!(store.get(&old).is_none());
        assert!(store.get(&recent).is_some());
    }
}
