// src/analysis/vehicle_ledger.rs
//
// Run-wide record of which vehicles have been seen, which entered the
// monitoring zone, and how many of each class. Grows only.

use crate::types::VehicleKey;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

#[derive(Debug, Default)]
pub struct VehicleLedger {
    all_seen: HashSet<VehicleKey>,
    zone_seen: HashSet<VehicleKey>,
    class_counts: BTreeMap<String, u64>,
}

impl VehicleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting. The class counter moves only on the first sighting
    /// of `key`, zone membership or not. Returns true on that first sighting.
    pub fn record_sighting(&mut self, key: &VehicleKey, in_zone: bool) -> bool {
        let first = !self.all_seen.contains(key);
        if first {
            self.all_seen.insert(key.clone());
            *self.class_counts.entry(key.class_label.clone()).or_insert(0) += 1;
            debug!("🆕 New vehicle {}", key);
        }
        if in_zone && !self.zone_seen.contains(key) {
            self.zone_seen.insert(key.clone());
        }
        first
    }

    pub fn has_seen(&self, key: &VehicleKey) -> bool {
        self.all_seen.contains(key)
    }

    pub fn was_in_zone(&self, key: &VehicleKey) -> bool {
        self.zone_seen.contains(key)
    }

    pub fn total_count(&self) -> usize {
        self.all_seen.len()
    }

    pub fn zone_count(&self) -> usize {
        self.zone_seen.len()
    }

    pub fn class_distribution(&self) -> &BTreeMap<String, u64> {
        &self.class_counts
    }
}
