// src/analysis/statistics.rs

use super::vehicle_ledger::VehicleLedger;
use super::violation_tracker::ViolationTracker;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Point-in-time summary of a run. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub analysis_id: String,
    pub total_vehicles: usize,
    pub vehicles_in_zone: usize,
    pub total_violations: usize,
    pub class_distribution: BTreeMap<String, u64>,
    pub max_speed_kmh: u32,
    pub avg_speed_kmh: f64,
    pub vehicles_with_violations: usize,
    pub processing_duration_secs: f64,
}

pub struct StatisticsAggregator;

impl StatisticsAggregator {
    /// Speed figures are taken over recorded violations, not raw per-frame
    /// estimates. Both are 0 when nothing has been recorded.
    pub fn snapshot(
        analysis_id: &str,
        ledger: &VehicleLedger,
        violations: &ViolationTracker,
        elapsed: Duration,
    ) -> StatisticsSnapshot {
        let (count, sum, max) = violations
            .all_records()
            .fold((0usize, 0u64, 0u32), |(n, sum, max), r| {
                (n + 1, sum + r.speed_kmh as u64, max.max(r.speed_kmh))
            });

        let avg_speed_kmh = if count > 0 {
            sum as f64 / count as f64
        } else {
            0.0
        };

        StatisticsSnapshot {
            analysis_id: analysis_id.to_string(),
            total_vehicles: ledger.total_count(),
            vehicles_in_zone: ledger.zone_count(),
            total_violations: count,
            class_distribution: ledger.class_distribution().clone(),
            max_speed_kmh: max,
            avg_speed_kmh,
            vehicles_with_violations: violations.vehicles_with_violations(),
            processing_duration_secs: elapsed.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::violation_tracker::ViolationThresholds;
    use crate::types::VehicleKey;

    #[test]
    fn test_empty_run_defaults_to_zero() {
        let ledger = VehicleLedger::new();
        let tracker = ViolationTracker::new(ViolationThresholds::default());
        let snap = StatisticsAggregator::snapshot("a", &ledger, &tracker, Duration::ZERO);
        assert_eq!(snap.total_violations, 0);
        assert_eq!(snap.max_speed_kmh, 0);
        assert_eq!(snap.avg_speed_kmh, 0.0);
        assert_eq!(snap.vehicles_with_violations, 0);
    }

    #[test]
    fn test_snapshot_over_recorded_violations() {
        let mut ledger = VehicleLedger::new();
        let mut tracker = ViolationTracker::new(ViolationThresholds::default());
        let car = VehicleKey::new(1, "car");
        let bus = VehicleKey::new(2, "bus");
        let idle = VehicleKey::new(3, "car");

        ledger.record_sighting(&car, true);
        ledger.record_sighting(&bus, true);
        ledger.record_sighting(&idle, false);

        tracker.evaluate(&car, 60.4, 0.0);
        tracker.evaluate(&car, 65.0, 1.0); // absorbed
        tracker.evaluate(&car, 112.9, 2.0);
        tracker.evaluate(&bus, 47.0, 0.0);

        let snap = StatisticsAggregator::snapshot(
            "analysis_x",
            &ledger,
            &tracker,
            Duration::from_millis(1500),
        );
        assert_eq!(snap.total_vehicles, 3);
        assert_eq!(snap.vehicles_in_zone, 2);
        assert_eq!(snap.total_violations, 3);
        assert_eq!(snap.vehicles_with_violations, 2);
        assert_eq!(snap.max_speed_kmh, 112);
        assert_eq!(snap.class_distribution.get("car"), Some(&2));
        assert!((snap.processing_duration_secs - 1.5).abs() < 1e-9);

        // avg * count == sum of recorded speeds
        let sum: u32 = tracker.all_records().map(|r| r.speed_kmh).sum();
        assert_eq!(sum, 60 + 112 + 47);
        assert!((snap.avg_speed_kmh * snap.total_violations as f64 - sum as f64).abs() < 1e-9);
    }
}
