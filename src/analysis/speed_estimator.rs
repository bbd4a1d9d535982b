// src/analysis/speed_estimator.rs
//
// Finite-difference speed over a vehicle's history window:
//   distance = |newest - oldest|      (ground-plane metres)
//   elapsed  = samples / frame_rate   (seconds)
//   speed    = distance / elapsed * 3.6
//
// The 3.6 factor assumes the ground plane is calibrated in metres.

use super::track_history::TrackHistoryBuffer;

/// m/s to km/h
pub const MPS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedEstimate {
    /// Not enough history yet
    Unknown,
    Kmh(f64),
}

impl SpeedEstimate {
    pub fn kmh(&self) -> Option<f64> {
        match self {
            Self::Unknown => None,
            Self::Kmh(v) => Some(*v),
        }
    }

    /// Whole km/h for display; unknown reads as 0.
    pub fn display_kmh(&self) -> u32 {
        self.kmh().map(|v| v.max(0.0) as u32).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpeedEstimator {
    frame_rate: f64,
}

impl SpeedEstimator {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1) as f64,
        }
    }

    pub fn estimate(&self, buffer: &TrackHistoryBuffer) -> SpeedEstimate {
        if !buffer.is_warmed_up() {
            return SpeedEstimate::Unknown;
        }
        let (oldest, newest) = match (buffer.oldest(), buffer.newest()) {
            (Some(o), Some(n)) => (o, n),
            _ => return SpeedEstimate::Unknown,
        };

        let distance = (newest - oldest).abs();
        let elapsed = buffer.len() as f64 / self.frame_rate;
        SpeedEstimate::Kmh(distance / elapsed * MPS_TO_KMH)
    }
}
