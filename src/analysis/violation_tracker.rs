// src/analysis/violation_tracker.rs
//
// Per-vehicle debounce state machine over speed estimates.
//
//   Unseen ──(first measurement ≥ floor)──▶ Tracked
//   Tracked ──(|Δspeed| > delta  OR  Δt > interval)──▶ Tracked (+1 record)
//
// Measurements below the noise floor never touch state. A measurement that
// triggers neither condition is absorbed without mutation. There is no
// terminal state; tracked vehicles persist until the run ends.
//
// Alert delivery is not done here: every emitted record comes back as a
// `ViolationEvent` carrying an `over_limit` flag for the notifier.

use crate::types::{SpeedConfig, VehicleKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ViolationThresholds {
    pub limit_kmh: f64,
    pub noise_floor_kmh: f64,
    pub speed_delta_kmh: f64,
    pub interval_secs: f64,
}

impl Default for ViolationThresholds {
    fn default() -> Self {
        Self::from(&SpeedConfig::default())
    }
}

impl From<&SpeedConfig> for ViolationThresholds {
    fn from(cfg: &SpeedConfig) -> Self {
        Self {
            limit_kmh: cfg.limit_kmh,
            noise_floor_kmh: cfg.noise_floor_kmh,
            speed_delta_kmh: cfg.debounce_speed_delta_kmh,
            interval_secs: cfg.debounce_interval_secs,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleViolationState {
    pub last_speed_kmh: f64,
    pub last_time_secs: f64,
    pub violation_count: u32,
    pub max_speed_kmh: f64,
}

/// One emitted violation. Sequence numbers start at 1 per vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub track_id: i64,
    pub class_label: String,
    pub speed_kmh: u32,
    pub timestamp_secs: f64,
    pub sequence: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationTrigger {
    /// First accepted measurement for the vehicle
    FirstMeasurement,
    SpeedChange,
    IntervalElapsed,
}

impl ViolationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstMeasurement => "FIRST",
            Self::SpeedChange => "SPEED_CHANGE",
            Self::IntervalElapsed => "INTERVAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViolationEvent {
    pub record: ViolationRecord,
    pub trigger: ViolationTrigger,
    /// Measured speed exceeded the configured limit
    pub over_limit: bool,
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct ViolationTracker {
    thresholds: ViolationThresholds,
    states: HashMap<VehicleKey, VehicleViolationState>,
    records: HashMap<VehicleKey, Vec<ViolationRecord>>,
}

impl ViolationTracker {
    pub fn new(thresholds: ViolationThresholds) -> Self {
        Self {
            thresholds,
            states: HashMap::new(),
            records: HashMap::new(),
        }
    }

    pub fn thresholds(&self) -> &ViolationThresholds {
        &self.thresholds
    }

    /// Feed one speed measurement. Either commits a new record and state
    /// update together, or changes nothing.
    pub fn evaluate(
        &mut self,
        key: &VehicleKey,
        speed_kmh: f64,
        timestamp_secs: f64,
    ) -> Option<ViolationEvent> {
        if !speed_kmh.is_finite() || speed_kmh < self.thresholds.noise_floor_kmh {
            return None;
        }

        let (trigger, sequence) = match self.states.get_mut(key) {
            None => {
                self.states.insert(
                    key.clone(),
                    VehicleViolationState {
                        last_speed_kmh: speed_kmh,
                        last_time_secs: timestamp_secs,
                        violation_count: 1,
                        max_speed_kmh: speed_kmh,
                    },
                );
                (ViolationTrigger::FirstMeasurement, 1)
            }
            Some(state) => {
                let speed_diff = (speed_kmh - state.last_speed_kmh).abs();
                let time_diff = timestamp_secs - state.last_time_secs;

                let trigger = if speed_diff > self.thresholds.speed_delta_kmh {
                    ViolationTrigger::SpeedChange
                } else if time_diff > self.thresholds.interval_secs {
                    ViolationTrigger::IntervalElapsed
                } else {
                    return None;
                };

                state.violation_count += 1;
                state.last_speed_kmh = speed_kmh;
                state.last_time_secs = timestamp_secs;
                state.max_speed_kmh = state.max_speed_kmh.max(speed_kmh);
                (trigger, state.violation_count)
            }
        };

        let record = ViolationRecord {
            track_id: key.track_id,
            class_label: key.class_label.clone(),
            speed_kmh: speed_kmh as u32,
            timestamp_secs,
            sequence,
        };
        self.records
            .entry(key.clone())
            .or_default()
            .push(record.clone());

        debug!(
            "Violation #{} for {} at {} km/h ({})",
            record.sequence,
            key,
            record.speed_kmh,
            trigger.as_str()
        );

        Some(ViolationEvent {
            record,
            trigger,
            over_limit: speed_kmh > self.thresholds.limit_kmh,
        })
    }

    pub fn state(&self, key: &VehicleKey) -> Option<&VehicleViolationState> {
        self.states.get(key)
    }

    pub fn records(&self, key: &VehicleKey) -> &[ViolationRecord] {
        self.records.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Per-vehicle record lists ordered by vehicle key.
    pub fn records_by_vehicle(&self) -> Vec<(&VehicleKey, &[ViolationRecord])> {
        let mut out: Vec<_> = self
            .records
            .iter()
            .map(|(k, v)| (k, v.as_slice()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    pub fn all_records(&self) -> impl Iterator<Item = &ViolationRecord> {
        self.records.values().flatten()
    }

    pub fn total_records(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn vehicles_with_violations(&self) -> usize {
        self.records.values().filter(|v| !v.is_empty()).count()
    }
}
