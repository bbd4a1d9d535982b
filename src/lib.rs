// src/lib.rs
//
// Vehicle speed estimation and speed-violation tracking over per-frame
// tracker detections. The binary in main.rs drives one `SpeedPipeline`
// per detection log.

pub mod analysis;
pub mod config;
pub mod input;
pub mod notifier;
pub mod pipeline;
pub mod report;
pub mod types;

pub use analysis::{
    MonitoringZone, PlanarRectifier, SpeedEstimate, SpeedEstimator, StatisticsAggregator,
    StatisticsSnapshot, TrackHistoryBuffer, VehicleLedger, ViolationRecord, ViolationTracker,
};
pub use notifier::AlertNotifier;
pub use pipeline::{FrameContext, PipelineEvent, SpeedAlert, SpeedPipeline};
pub use report::{RunReport, ViolationSink};
pub use types::{Config, Detection, FrameInput, Point2, VehicleKey};
