// src/analysis/mod.rs
//
// Speed analysis core.
//
// Signal flow per in-zone detection:
//   pixel anchor → rectifier → track_history → speed_estimator ─┐
//                                               vehicle_ledger ◀┤
//                                            violation_tracker ◀┘
//   statistics reads ledger + violation records on demand.

pub mod rectifier;
pub mod speed_estimator;
pub mod statistics;
pub mod track_history;
pub mod vehicle_ledger;
pub mod violation_tracker;
pub mod zone;

pub use rectifier::PlanarRectifier;
pub use speed_estimator::{SpeedEstimate, SpeedEstimator, MPS_TO_KMH};
pub use statistics::{StatisticsAggregator, StatisticsSnapshot};
pub use track_history::{TrackHistoryBuffer, TrackHistoryStore};
pub use vehicle_ledger::VehicleLedger;
pub use violation_tracker::{
    VehicleViolationState, ViolationEvent, ViolationRecord, ViolationThresholds, ViolationTracker,
    ViolationTrigger,
};
pub use zone::MonitoringZone;
