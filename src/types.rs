// src/types.rs

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub calibration: CalibrationConfig,
    pub video: VideoConfig,
    pub zone: ZoneConfig,
    pub speed: SpeedConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub notifier: NotifierConfig,
    pub logging: LoggingConfig,
}

/// Four-point correspondence between the road segment in pixels and the
/// ground-plane rectangle in metres.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Pixel-space quadrilateral, ordered top-left, top-right, bottom-right, bottom-left
    pub source: [Point2; 4],
    /// Ground-plane width in metres
    pub target_width: f64,
    /// Ground-plane length in metres
    pub target_height: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            source: [
                Point2::new(1252.0, 787.0),
                Point2::new(2298.0, 803.0),
                Point2::new(5039.0, 2159.0),
                Point2::new(-550.0, 2159.0),
            ],
            target_width: 25.0,
            target_height: 250.0,
        }
    }
}

impl CalibrationConfig {
    /// Rectangle corners in the same order as `source`. The far edge sits at
    /// `dimension - 1`, matching the calibration convention the quadrilaterals
    /// were measured with.
    pub fn target(&self) -> [Point2; 4] {
        let w = self.target_width - 1.0;
        let h = self.target_height - 1.0;
        [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Nominal frames per second of the detection stream
    pub frame_rate: u32,
    /// Directory scanned for detection logs when no input path is given
    pub input_dir: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            input_dir: "detections".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Monitoring polygon in pixels. None = the calibration source quadrilateral.
    pub polygon: Option<Vec<Point2>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub limit_kmh: f64,
    /// Measurements below this are noise and never evaluated
    pub noise_floor_kmh: f64,
    /// A speed change larger than this emits a new violation record
    pub debounce_speed_delta_kmh: f64,
    /// Time since the last record after which a new record is emitted
    pub debounce_interval_secs: f64,
    pub high_severity_kmh: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            limit_kmh: 100.0,
            noise_floor_kmh: 5.0,
            debounce_speed_delta_kmh: 10.0,
            debounce_interval_secs: 5.0,
            high_severity_kmh: 120.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_pending_events: usize,
    pub checkpoint_interval_frames: u64,
    pub progress_interval_frames: u64,
    /// Drop a vehicle's position history after this many seconds without
    /// an in-zone sighting. None = keep for the whole run.
    pub history_eviction_secs: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pending_events: 1024,
            checkpoint_interval_frames: 50,
            progress_interval_frames: 100,
            history_eviction_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub write_violations_jsonl: bool,
    pub write_summary_json: bool,
    pub write_text_report: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "output".to_string(),
            write_violations_jsonl: true,
            write_summary_json: true,
            write_text_report: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// 2D point. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point2 {
    fn from(p: [f64; 2]) -> Self {
        Self { x: p[0], y: p[1] }
    }
}

impl From<Point2> for [f64; 2] {
    fn from(p: Point2) -> Self {
        [p.x, p.y]
    }
}

// ============================================================================
// VEHICLES & DETECTIONS
// ============================================================================

/// Identity of one tracked vehicle. The same track id under a different
/// class label is a different vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleKey {
    pub track_id: i64,
    pub class_label: String,
}

impl VehicleKey {
    pub fn new(track_id: i64, class_label: impl Into<String>) -> Self {
        Self {
            track_id,
            class_label: class_label.into(),
        }
    }
}

impl fmt::Display for VehicleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.track_id, self.class_label)
    }
}

/// One detector/tracker output for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Tracker-assigned id; None when the tracker has not claimed the box
    pub track_id: Option<i64>,
    pub class_label: String,
    /// Bottom-center anchor in pixels
    pub anchor: Point2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Detection {
    pub fn key(&self) -> Option<VehicleKey> {
        self.track_id
            .map(|id| VehicleKey::new(id, self.class_label.clone()))
    }
}

/// All detections for one frame, as delivered by the detector+tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameInput {
    pub frame_index: u64,
    /// Video clock. Derived from `frame_index` when absent.
    #[serde(default)]
    pub timestamp_ms: Option<f64>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Detections inside the monitoring zone. When absent the pipeline
    /// derives them from `detections` using the configured zone polygon.
    #[serde(default)]
    pub zone_detections: Option<Vec<Detection>>,
}

impl FrameInput {
    pub fn timestamp_secs(&self, frame_rate: u32) -> f64 {
        match self.timestamp_ms {
            Some(ms) => ms / 1000.0,
            None => self.frame_index as f64 / frame_rate.max(1) as f64,
        }
    }
}
