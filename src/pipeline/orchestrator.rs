// src/pipeline/orchestrator.rs
//
// One `SpeedPipeline` per analysis run. It owns every piece of run state
// (ledger, history buffers, violation tracker, event bus, metrics) and is
// driven one frame at a time, strictly in order.
//
// Per frame:
//   1. Every tracked detection is recorded in the ledger (out of zone).
//   2. In-zone detections are rectified in one batch.
//   3. Each in-zone vehicle: history append → ledger (in zone) → speed →
//      violation evaluation → events.
//   4. Checkpoint / progress / eviction housekeeping.

use super::event_bus::{AnalyticsCheckpoint, EventBus, PipelineEvent, SpeedAlert};
use super::frame_context::{FrameContext, VehicleReading};
use super::metrics::PipelineMetrics;
use crate::analysis::{
    MonitoringZone, PlanarRectifier, SpeedEstimate, SpeedEstimator, StatisticsAggregator,
    StatisticsSnapshot, TrackHistoryStore, VehicleLedger, ViolationThresholds, ViolationTracker,
};
use crate::types::{Config, Detection, FrameInput, PipelineConfig};
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct SpeedPipeline {
    analysis_id: String,
    frame_rate: u32,
    limit_kmh: f64,
    settings: PipelineConfig,
    rectifier: PlanarRectifier,
    zone: MonitoringZone,
    estimator: SpeedEstimator,
    history: TrackHistoryStore,
    ledger: VehicleLedger,
    violations: ViolationTracker,
    events: EventBus,
    metrics: PipelineMetrics,
    started_at: Instant,
    frames_processed: u64,
}

impl SpeedPipeline {
    pub fn new(config: &Config, analysis_id: impl Into<String>) -> Result<Self> {
        let rectifier =
            PlanarRectifier::new(&config.calibration.source, &config.calibration.target())
                .context("Invalid calibration quadrilaterals")?;

        let zone = MonitoringZone::new(
            config
                .zone
                .polygon
                .clone()
                .unwrap_or_else(|| config.calibration.source.to_vec()),
        );

        let frame_rate = config.video.frame_rate.max(1);

        Ok(Self {
            analysis_id: analysis_id.into(),
            frame_rate,
            limit_kmh: config.speed.limit_kmh,
            settings: config.pipeline.clone(),
            rectifier,
            zone,
            estimator: SpeedEstimator::new(frame_rate),
            history: TrackHistoryStore::new(frame_rate as usize),
            ledger: VehicleLedger::new(),
            violations: ViolationTracker::new(ViolationThresholds::from(&config.speed)),
            events: EventBus::new(config.pipeline.max_pending_events),
            metrics: PipelineMetrics::new(),
            started_at: Instant::now(),
            frames_processed: 0,
        })
    }

    pub fn process_frame(&mut self, frame: &FrameInput) -> FrameContext {
        let frame_start = Instant::now();
        let timestamp_secs = frame.timestamp_secs(self.frame_rate);
        let mut ctx = FrameContext::new(frame.frame_index, timestamp_secs);

        self.metrics.inc(&self.metrics.total_frames);
        self.metrics
            .add(&self.metrics.total_detections, frame.detections.len() as u64);
        ctx.detections_total = frame.detections.len();

        // 1. Count every tracked vehicle, in zone or not
        for det in &frame.detections {
            match det.key() {
                Some(key) => {
                    self.ledger.record_sighting(&key, false);
                }
                None => self.metrics.inc(&self.metrics.untracked_detections),
            }
        }

        // 2. Zone subset, supplied or derived from the polygon
        let derived;
        let zone_dets: &[Detection] = match &frame.zone_detections {
            Some(dets) => dets,
            None => {
                derived = frame
                    .detections
                    .iter()
                    .filter(|d| self.zone.contains(d.anchor))
                    .cloned()
                    .collect::<Vec<_>>();
                &derived
            }
        };
        ctx.zone_detections_total = zone_dets.len();
        self.metrics
            .add(&self.metrics.zone_detections, zone_dets.len() as u64);

        let anchors: Vec<_> = zone_dets.iter().map(|d| d.anchor).collect();
        let ground = self.rectifier.rectify(&anchors);

        // 3. Speed + violation per in-zone vehicle
        let mut evaluated = false;
        for (det, ground_position) in zone_dets.iter().zip(ground) {
            // Untracked boxes were already counted in step 1
            let Some(key) = det.key() else {
                continue;
            };
            let Some(ground_position) = ground_position else {
                debug!("{} anchor on the horizon line, no speed sample", key);
                self.metrics.inc(&self.metrics.unmappable_anchors);
                self.ledger.record_sighting(&key, true);
                continue;
            };

            let buffer = self.history.append(&key, ground_position.y, timestamp_secs);
            let speed = self.estimator.estimate(buffer);
            self.ledger.record_sighting(&key, true);

            let mut violation = None;
            match speed {
                SpeedEstimate::Unknown => self.metrics.inc(&self.metrics.unknown_speeds),
                SpeedEstimate::Kmh(kmh) => {
                    self.metrics.inc(&self.metrics.speed_estimates);
                    if kmh >= self.violations.thresholds().noise_floor_kmh {
                        evaluated = true;
                    }
                    if let Some(event) = self.violations.evaluate(&key, kmh, timestamp_secs) {
                        self.metrics.inc(&self.metrics.violations_recorded);
                        self.events.publish(PipelineEvent::ViolationRecorded {
                            key: key.clone(),
                            record: event.record.clone(),
                            trigger: event.trigger,
                            over_limit: event.over_limit,
                        });
                        if event.over_limit {
                            self.metrics.inc(&self.metrics.over_limit_alerts);
                            warn!(
                                "🚨 {} at {} km/h (limit {:.0})",
                                key, event.record.speed_kmh, self.limit_kmh
                            );
                            self.events.publish(PipelineEvent::SpeedLimitExceeded(SpeedAlert {
                                record: event.record.clone(),
                                limit_kmh: self.limit_kmh,
                            }));
                        }
                        violation = Some(event.record);
                    }
                }
            }

            ctx.readings.push(VehicleReading {
                over_limit: speed.kmh().is_some_and(|v| v > self.limit_kmh),
                key,
                anchor: det.anchor,
                ground_position,
                speed,
                violation,
            });
        }

        // 4. Housekeeping
        self.frames_processed += 1;

        let checkpoint_every = self.settings.checkpoint_interval_frames;
        if evaluated && checkpoint_every > 0 && frame.frame_index % checkpoint_every == 0 {
            self.events
                .publish(PipelineEvent::AnalyticsCheckpoint(AnalyticsCheckpoint {
                    frame_index: frame.frame_index,
                    timestamp_secs,
                    vehicles_detected: self.ledger.total_count(),
                    violations_count: self.violations.total_records(),
                }));
        }

        let progress_every = self.settings.progress_interval_frames;
        if progress_every > 0 && frame.frame_index % progress_every == 0 {
            info!(
                "📊 Frame {}: {} vehicles, {} violations",
                frame.frame_index,
                self.ledger.total_count(),
                self.violations.total_records()
            );
        }

        if let Some(max_absence) = self.settings.history_eviction_secs {
            let evicted = self.history.evict_stale(timestamp_secs, max_absence);
            if evicted > 0 {
                debug!("Evicted {} stale track histories", evicted);
                self.metrics
                    .add(&self.metrics.histories_evicted, evicted as u64);
            }
        }

        self.metrics.set_timing(
            &self.metrics.frame_time_us,
            frame_start.elapsed().as_micros() as u64,
        );
        ctx
    }

    pub fn drain_events(&mut self) -> Vec<PipelineEvent> {
        self.events.drain()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        StatisticsAggregator::snapshot(
            &self.analysis_id,
            &self.ledger,
            &self.violations,
            self.started_at.elapsed(),
        )
    }

    pub fn analysis_id(&self) -> &str {
        &self.analysis_id
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn ledger(&self) -> &VehicleLedger {
        &self.ledger
    }

    pub fn violations(&self) -> &ViolationTracker {
        &self.violations
    }

    pub fn history(&self) -> &TrackHistoryStore {
        &self.history
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }
}
