// src/pipeline/frame_context.rs
//
// Everything the pipeline concluded about one frame. Rendering and
// persistence read from this instead of reaching into analysis state.

use crate::analysis::{SpeedEstimate, ViolationRecord};
use crate::types::{Point2, VehicleKey};

/// Speed reading for one in-zone vehicle on this frame.
#[derive(Debug, Clone)]
pub struct VehicleReading {
    pub key: VehicleKey,
    pub anchor: Point2,
    pub ground_position: Point2,
    pub speed: SpeedEstimate,
    pub over_limit: bool,
    /// Record emitted by this measurement, if any
    pub violation: Option<ViolationRecord>,
}

impl VehicleReading {
    /// Display label `#<id> <class> <speed> km/h`, marked when over the limit.
    pub fn label(&self) -> String {
        let mut label = format!(
            "#{} {} {} km/h",
            self.key.track_id,
            self.key.class_label,
            self.speed.display_kmh()
        );
        if self.over_limit {
            label.push_str(" ⚠️");
        }
        label
    }
}

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub frame_index: u64,
    pub timestamp_secs: f64,
    pub detections_total: usize,
    pub zone_detections_total: usize,
    pub readings: Vec<VehicleReading>,
}

impl FrameContext {
    pub fn new(frame_index: u64, timestamp_secs: f64) -> Self {
        Self {
            frame_index,
            timestamp_secs,
            detections_total: 0,
            zone_detections_total: 0,
            readings: Vec::new(),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.readings.iter().map(VehicleReading::label).collect()
    }
}
