// src/pipeline/metrics.rs
//
// Run counters and timings. Cloning shares the counters, so the notifier
// side can report delivery outcomes into the same summary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub total_detections: Arc<AtomicU64>,
    pub zone_detections: Arc<AtomicU64>,
    pub untracked_detections: Arc<AtomicU64>,
    pub unmappable_anchors: Arc<AtomicU64>,
    pub speed_estimates: Arc<AtomicU64>,
    pub unknown_speeds: Arc<AtomicU64>,
    pub violations_recorded: Arc<AtomicU64>,
    pub over_limit_alerts: Arc<AtomicU64>,
    pub alerts_delivered: Arc<AtomicU64>,
    pub alert_failures: Arc<AtomicU64>,
    pub histories_evicted: Arc<AtomicU64>,
    pub frame_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            total_detections: Arc::new(AtomicU64::new(0)),
            zone_detections: Arc::new(AtomicU64::new(0)),
            untracked_detections: Arc::new(AtomicU64::new(0)),
            unmappable_anchors: Arc::new(AtomicU64::new(0)),
            speed_estimates: Arc::new(AtomicU64::new(0)),
            unknown_speeds: Arc::new(AtomicU64::new(0)),
            violations_recorded: Arc::new(AtomicU64::new(0)),
            over_limit_alerts: Arc::new(AtomicU64::new(0)),
            alerts_delivered: Arc::new(AtomicU64::new(0)),
            alert_failures: Arc::new(AtomicU64::new(0)),
            histories_evicted: Arc::new(AtomicU64::new(0)),
            frame_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            total_detections: self.total_detections.load(Ordering::Relaxed),
            zone_detections: self.zone_detections.load(Ordering::Relaxed),
            untracked_detections: self.untracked_detections.load(Ordering::Relaxed),
            unmappable_anchors: self.unmappable_anchors.load(Ordering::Relaxed),
            speed_estimates: self.speed_estimates.load(Ordering::Relaxed),
            unknown_speeds: self.unknown_speeds.load(Ordering::Relaxed),
            violations_recorded: self.violations_recorded.load(Ordering::Relaxed),
            over_limit_alerts: self.over_limit_alerts.load(Ordering::Relaxed),
            alerts_delivered: self.alerts_delivered.load(Ordering::Relaxed),
            alert_failures: self.alert_failures.load(Ordering::Relaxed),
            histories_evicted: self.histories_evicted.load(Ordering::Relaxed),
            last_frame_us: self.frame_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub total_detections: u64,
    pub zone_detections: u64,
    pub untracked_detections: u64,
    pub unmappable_anchors: u64,
    pub speed_estimates: u64,
    pub unknown_speeds: u64,
    pub violations_recorded: u64,
    pub over_limit_alerts: u64,
    pub alerts_delivered: u64,
    pub alert_failures: u64,
    pub histories_evicted: u64,
    pub last_frame_us: u64,
    pub elapsed_secs: f64,
}
