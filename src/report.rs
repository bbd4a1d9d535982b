// src/report.rs
//
// Run exports: the streaming violation log, the end-of-run JSON dump and
// the human-readable text report.

use crate::analysis::{StatisticsSnapshot, ViolationRecord, ViolationTracker};
use crate::types::SpeedConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ============================================================================
// SEVERITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn classify(speed_kmh: u32, config: &SpeedConfig) -> Self {
        let speed = speed_kmh as f64;
        if speed > config.high_severity_kmh {
            Severity::High
        } else if speed > config.limit_kmh {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

// ============================================================================
// EXPORT TYPES
// ============================================================================

/// A violation record as exported, annotated against the configured limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEntry {
    #[serde(flatten)]
    pub record: ViolationRecord,
    pub is_speeding: bool,
    pub severity: Severity,
}

impl ViolationEntry {
    pub fn new(record: ViolationRecord, config: &SpeedConfig) -> Self {
        Self {
            is_speeding: record.speed_kmh as f64 > config.limit_kmh,
            severity: Severity::classify(record.speed_kmh, config),
            record,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleViolations {
    pub track_id: i64,
    pub class_label: String,
    pub records: Vec<ViolationEntry>,
}

/// End-of-run dump: statistics plus every vehicle's violation sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub statistics: StatisticsSnapshot,
    pub violations: Vec<VehicleViolations>,
}

impl RunReport {
    pub fn build(
        statistics: StatisticsSnapshot,
        tracker: &ViolationTracker,
        config: &SpeedConfig,
    ) -> Self {
        let violations = tracker
            .records_by_vehicle()
            .into_iter()
            .map(|(key, records)| VehicleViolations {
                track_id: key.track_id,
                class_label: key.class_label.clone(),
                records: records
                    .iter()
                    .cloned()
                    .map(|r| ViolationEntry::new(r, config))
                    .collect(),
            })
            .collect();

        Self {
            statistics,
            violations,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ViolationEntry> {
        self.violations.iter().flat_map(|v| v.records.iter())
    }

    pub fn speeding_count(&self) -> usize {
        self.entries().filter(|e| e.is_speeding).count()
    }

    pub fn high_severity_count(&self) -> usize {
        self.entries()
            .filter(|e| e.severity == Severity::High)
            .count()
    }
}

// ============================================================================
// SCORES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportScores {
    /// Violation records per detected vehicle, as a percentage
    pub violation_rate: f64,
    pub safety: f64,
    pub efficiency: f64,
    pub compliance: f64,
    pub overall: f64,
}

/// Average speed that scores 100% efficiency.
const EFFICIENCY_REFERENCE_KMH: f64 = 80.0;

impl ReportScores {
    pub fn from_statistics(stats: &StatisticsSnapshot, config: &SpeedConfig) -> Self {
        let total_vehicles = stats.total_vehicles.max(1) as f64;
        let violation_rate = stats.total_violations as f64 / total_vehicles * 100.0;

        let safety = (100.0 - violation_rate * 2.0).max(0.0);

        let efficiency = if stats.avg_speed_kmh > 0.0 {
            (stats.avg_speed_kmh / EFFICIENCY_REFERENCE_KMH * 100.0).min(100.0)
        } else {
            0.0
        };

        let max_speed = stats.max_speed_kmh as f64;
        let compliance = if max_speed <= config.limit_kmh {
            100.0
        } else {
            (100.0 - (max_speed - config.limit_kmh)).max(0.0)
        };

        Self {
            violation_rate,
            safety,
            efficiency,
            compliance,
            overall: (safety + efficiency + compliance) / 3.0,
        }
    }

    pub fn safety_label(&self) -> &'static str {
        match self.safety {
            s if s >= 90.0 => "Excellent",
            s if s >= 70.0 => "Good",
            _ => "Needs Improvement",
        }
    }

    pub fn efficiency_label(&self) -> &'static str {
        match self.efficiency {
            s if s >= 80.0 => "Optimal",
            s if s >= 60.0 => "Good",
            _ => "Low",
        }
    }

    pub fn compliance_label(&self) -> &'static str {
        match self.compliance {
            s if s >= 90.0 => "High",
            s if s >= 70.0 => "Medium",
            _ => "Low",
        }
    }

    pub fn overall_label(&self) -> &'static str {
        match self.overall {
            s if s >= 85.0 => "Excellent",
            s if s >= 70.0 => "Good",
            _ => "Needs Attention",
        }
    }
}

pub fn recommendations(
    stats: &StatisticsSnapshot,
    scores: &ReportScores,
    config: &SpeedConfig,
) -> Vec<&'static str> {
    let mut recs = Vec::new();
    if scores.violation_rate > 20.0 {
        recs.push("Implement stricter speed enforcement measures");
    }
    if stats.max_speed_kmh as f64 > config.high_severity_kmh {
        recs.push("Consider speed calming infrastructure");
    }
    if stats.avg_speed_kmh < 40.0 {
        recs.push("Review traffic flow optimization");
    }
    if stats.vehicles_with_violations > 10 {
        recs.push("Enhance driver awareness campaigns");
    }
    if recs.is_empty() {
        recs.push("Current traffic management appears effective");
        recs.push("Continue monitoring and maintenance");
    }
    recs
}

// ============================================================================
// WRITERS
// ============================================================================

pub fn violations_log_path(dir: &Path, analysis_id: &str) -> PathBuf {
    dir.join(format!("{}_violations.jsonl", analysis_id))
}

pub fn summary_json_path(dir: &Path, analysis_id: &str) -> PathBuf {
    dir.join(format!("{}_data.json", analysis_id))
}

pub fn text_report_path(dir: &Path, analysis_id: &str) -> PathBuf {
    dir.join(format!("{}_report.txt", analysis_id))
}

/// JSONL log of violation records, one line per record, flushed as each
/// record arrives. Creating a sink replaces any earlier log for the same run id.
pub struct ViolationSink {
    file: File,
    path: PathBuf,
    config: SpeedConfig,
    written: usize,
}

impl ViolationSink {
    pub fn create(dir: &Path, analysis_id: &str, config: &SpeedConfig) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output dir {}", dir.display()))?;
        let path = violations_log_path(dir, analysis_id);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        info!("💾 Violation log: {}", path.display());
        Ok(Self {
            file,
            path,
            config: config.clone(),
            written: 0,
        })
    }

    pub fn append(&mut self, record: &ViolationRecord) -> Result<()> {
        let entry = ViolationEntry::new(record.clone(), &self.config);
        let json_line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", json_line)?;
        self.file.flush()?;
        self.written += 1;
        debug!("💾 Violation #{} saved to JSONL", self.written);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

pub fn write_summary_json(dir: &Path, report: &RunReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output dir {}", dir.display()))?;
    let path = summary_json_path(dir, &report.statistics.analysis_id);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("✅ JSON data saved: {}", path.display());
    Ok(path)
}

const RULE_WIDTH: usize = 70;
const SECTION_WIDTH: usize = 50;

pub fn render_text_report(report: &RunReport, config: &SpeedConfig) -> String {
    let stats = &report.statistics;
    let scores = ReportScores::from_statistics(stats, config);
    let rule = "=".repeat(RULE_WIDTH);
    let section = "-".repeat(SECTION_WIDTH);

    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "🚗 TRAFFIC ANALYSIS REPORT - {}", stats.analysis_id);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "Generated on: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let _ = writeln!(out, "📊 EXECUTIVE SUMMARY\n{}", section);
    let _ = writeln!(out, "Total Vehicles Detected: {}", stats.total_vehicles);
    let _ = writeln!(out, "Vehicles in Monitoring Zone: {}", stats.vehicles_in_zone);
    let _ = writeln!(out, "Total Violations Recorded: {}", stats.total_violations);
    let _ = writeln!(out, "Vehicles with Violations: {}", stats.vehicles_with_violations);
    let _ = writeln!(out, "Maximum Speed Detected: {} km/h", stats.max_speed_kmh);
    let _ = writeln!(out, "Average Speed: {:.2} km/h", stats.avg_speed_kmh);
    let _ = writeln!(
        out,
        "Processing Duration: {:.2} seconds\n",
        stats.processing_duration_secs
    );

    let _ = writeln!(out, "🚦 VEHICLE DISTRIBUTION ANALYSIS\n{}", section);
    if stats.class_distribution.is_empty() {
        let _ = writeln!(out, "No vehicle distribution data available");
    } else {
        let total = stats.total_vehicles.max(1) as f64;
        for (class_label, count) in &stats.class_distribution {
            let _ = writeln!(
                out,
                "• {}: {} vehicles ({:.1}%)",
                class_label,
                count,
                *count as f64 / total * 100.0
            );
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "⚠️ TRAFFIC VIOLATIONS ANALYSIS\n{}", section);
    let _ = writeln!(out, "Total Violations: {}", stats.total_violations);
    let _ = writeln!(
        out,
        "Speeding Violations (>{:.0} km/h): {}",
        config.limit_kmh,
        report.speeding_count()
    );
    let _ = writeln!(
        out,
        "High Severity Violations (>{:.0} km/h): {}",
        config.high_severity_kmh,
        report.high_severity_count()
    );
    let _ = writeln!(
        out,
        "Vehicles with Violations: {}\n",
        stats.vehicles_with_violations
    );

    let _ = writeln!(out, "📈 PERFORMANCE METRICS\n{}", section);
    let _ = writeln!(
        out,
        "Safety Score: {:.1}% - {}",
        scores.safety,
        scores.safety_label()
    );
    let _ = writeln!(
        out,
        "Efficiency Score: {:.1}% - {}",
        scores.efficiency,
        scores.efficiency_label()
    );
    let _ = writeln!(
        out,
        "Compliance Score: {:.1}% - {}",
        scores.compliance,
        scores.compliance_label()
    );
    let _ = writeln!(
        out,
        "Overall Score: {:.1}% - {}\n",
        scores.overall,
        scores.overall_label()
    );

    let _ = writeln!(out, "💡 RECOMMENDATIONS\n{}", section);
    for rec in recommendations(stats, &scores, config) {
        let _ = writeln!(out, "• {}", rec);
    }

    let _ = writeln!(out, "\n{}", rule);
    out
}

pub fn write_text_report(dir: &Path, report: &RunReport, config: &SpeedConfig) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output dir {}", dir.display()))?;
    let path = text_report_path(dir, &report.statistics.analysis_id);
    std::fs::write(&path, render_text_report(report, config))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("✅ Text report generated: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ViolationThresholds;
    use crate::types::VehicleKey;
    use std::collections::BTreeMap;

    fn stats(total: usize, violations: usize, max: u32, avg: f64, with: usize) -> StatisticsSnapshot {
        StatisticsSnapshot {
            analysis_id: "analysis_test".into(),
            total_vehicles: total,
            vehicles_in_zone: total,
            total_violations: violations,
            class_distribution: BTreeMap::new(),
            max_speed_kmh: max,
            avg_speed_kmh: avg,
            vehicles_with_violations: with,
            processing_duration_secs: 1.0,
        }
    }

    fn record(id: i64, speed: u32, seq: u32) -> ViolationRecord {
        ViolationRecord {
            track_id: id,
            class_label: "car".into(),
            speed_kmh: speed,
            timestamp_secs: seq as f64,
            sequence: seq,
        }
    }

    #[test]
    fn test_severity_bands() {
        let config = SpeedConfig::default();
        assert_eq!(Severity::classify(80, &config), Severity::Low);
        assert_eq!(Severity::classify(100, &config), Severity::Low);
        assert_eq!(Severity::classify(101, &config), Severity::Medium);
        assert_eq!(Severity::classify(120, &config), Severity::Medium);
        assert_eq!(Severity::classify(121, &config), Severity::High);
    }

    #[test]
    fn test_scores() {
        let config = SpeedConfig::default();
        // 2 violations over 20 vehicles = 10%, max 110, avg 60
        let scores = ReportScores::from_statistics(&stats(20, 2, 110, 60.0, 2), &config);
        assert!((scores.violation_rate - 10.0).abs() < 1e-9);
        assert!((scores.safety - 80.0).abs() < 1e-9);
        assert!((scores.efficiency - 75.0).abs() < 1e-9);
        assert!((scores.compliance - 90.0).abs() < 1e-9);
        assert!((scores.overall - 245.0 / 3.0).abs() < 1e-9);
        assert_eq!(scores.safety_label(), "Good");
        assert_eq!(scores.efficiency_label(), "Good");
        assert_eq!(scores.compliance_label(), "High");
        assert_eq!(scores.overall_label(), "Good");
    }

    #[test]
    fn test_scores_empty_run() {
        let scores =
            ReportScores::from_statistics(&stats(0, 0, 0, 0.0, 0), &SpeedConfig::default());
        assert_eq!(scores.violation_rate, 0.0);
        assert_eq!(scores.safety, 100.0);
        assert_eq!(scores.efficiency, 0.0);
        assert_eq!(scores.compliance, 100.0);
    }

    #[test]
    fn test_recommendations() {
        let config = SpeedConfig::default();
        let busy = stats(10, 5, 130, 30.0, 11);
        let scores = ReportScores::from_statistics(&busy, &config);
        assert_eq!(
            recommendations(&busy, &scores, &config),
            vec![
                "Implement stricter speed enforcement measures",
                "Consider speed calming infrastructure",
                "Review traffic flow optimization",
                "Enhance driver awareness campaigns",
            ]
        );

        let calm = stats(100, 1, 90, 70.0, 1);
        let scores = ReportScores::from_statistics(&calm, &config);
        assert_eq!(
            recommendations(&calm, &scores, &config),
            vec![
                "Current traffic management appears effective",
                "Continue monitoring and maintenance",
            ]
        );
    }

    #[test]
    fn test_run_report_groups_by_vehicle() {
        let config = SpeedConfig::default();
        let mut tracker = ViolationTracker::new(ViolationThresholds::from(&config));
        let a = VehicleKey::new(1, "car");
        let b = VehicleKey::new(2, "truck");
        tracker.evaluate(&a, 90.0, 0.0);
        tracker.evaluate(&b, 125.0, 0.0);
        tracker.evaluate(&a, 105.0, 1.0);

        let report = RunReport::build(stats(2, 3, 125, 106.0, 2), &tracker, &config);
        assert_eq!(report.violations.len(), 2);
        assert_eq!(report.violations[0].track_id, 1);
        assert_eq!(report.violations[0].records.len(), 2);
        assert_eq!(report.speeding_count(), 2);
        assert_eq!(report.high_severity_count(), 1);
    }

    #[test]
    fn test_entry_serializes_flat() {
        let entry = ViolationEntry::new(record(7, 121, 1), &SpeedConfig::default());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["track_id"], 7);
        assert_eq!(json["speed_kmh"], 121);
        assert_eq!(json["is_speeding"], true);
        assert_eq!(json["severity"], "high");
    }

    #[test]
    fn test_text_report_sections() {
        let config = SpeedConfig::default();
        let mut s = stats(4, 0, 0, 0.0, 0);
        s.class_distribution.insert("car".into(), 3);
        s.class_distribution.insert("bus".into(), 1);
        let report = RunReport {
            statistics: s,
            violations: Vec::new(),
        };
        let text = render_text_report(&report, &config);
        assert!(text.contains("TRAFFIC ANALYSIS REPORT - analysis_test"));
        assert!(text.contains("• car: 3 vehicles (75.0%)"));
        assert!(text.contains("• bus: 1 vehicles (25.0%)"));
        assert!(text.contains("Speeding Violations (>100 km/h): 0"));
        assert!(text.contains("Compliance Score: 100.0% - High"));
        assert!(text.contains("• Review traffic flow optimization"));
    }

    #[test]
    fn test_sink_appends_lines() {
        let dir = std::env::temp_dir().join(format!("speed_watch_sink_{}", std::process::id()));
        let config = SpeedConfig::default();
        let mut sink = ViolationSink::create(&dir, "analysis_sink", &config).unwrap();
        sink.append(&record(1, 90, 1)).unwrap();
        sink.append(&record(1, 105, 2)).unwrap();
        assert_eq!(sink.written(), 2);

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: ViolationEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.record.sequence, 2);
        assert_eq!(second.severity, Severity::Medium);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sink_replaces_previous_run_log() {
        let dir = std::env::temp_dir().join(format!("speed_watch_rerun_{}", std::process::id()));
        let config = SpeedConfig::default();

        let mut first = ViolationSink::create(&dir, "analysis_rerun", &config).unwrap();
        first.append(&record(1, 90, 1)).unwrap();
        first.append(&record(1, 105, 2)).unwrap();
        drop(first);

        let mut second = ViolationSink::create(&dir, "analysis_rerun", &config).unwrap();
        second.append(&record(4, 130, 1)).unwrap();

        let contents = std::fs::read_to_string(second.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let only: ViolationEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(only.record.track_id, 4);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
