// src/pipeline/event_bus.rs
//
// Decoupled event system. The analysis core publishes what happened; the
// run loop drains and hands events to persistence and the notifier, so no
// I/O ever runs inside a state transition.

use crate::analysis::{ViolationRecord, ViolationTrigger};
use crate::types::VehicleKey;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

/// Over-limit notification, one per over-limit violation record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedAlert {
    pub record: ViolationRecord,
    pub limit_kmh: f64,
}

impl SpeedAlert {
    pub fn message(&self) -> String {
        format!(
            "ALERT! {} #{} at {} km/h",
            self.record.class_label, self.record.track_id, self.record.speed_kmh
        )
    }
}

/// Periodic progress snapshot for live dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsCheckpoint {
    pub frame_index: u64,
    pub timestamp_secs: f64,
    pub vehicles_detected: usize,
    pub violations_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    ViolationRecorded {
        key: VehicleKey,
        record: ViolationRecord,
        trigger: ViolationTrigger,
        over_limit: bool,
    },

    SpeedLimitExceeded(SpeedAlert),

    AnalyticsCheckpoint(AnalyticsCheckpoint),
}

pub struct EventBus {
    events: VecDeque<PipelineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending.min(4096)),
            max_pending,
        }
    }

    /// When full, the oldest checkpoint is dropped. Violation records and
    /// alerts are never dropped; without a checkpoint to drop the bus grows
    /// past `max_pending` until the next drain.
    pub fn publish(&mut self, event: PipelineEvent) {
        if self.events.len() >= self.max_pending {
            let oldest_checkpoint = self
                .events
                .iter()
                .position(|e| matches!(e, PipelineEvent::AnalyticsCheckpoint(_)));
            match oldest_checkpoint {
                Some(idx) => {
                    warn!(
                        "Event bus full ({} events), dropping oldest checkpoint",
                        self.max_pending
                    );
                    self.events.remove(idx);
                }
                None => warn!(
                    "Event bus over capacity ({} events), keeping violation events",
                    self.events.len() + 1
                ),
            }
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}
