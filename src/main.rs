// src/main.rs

use anyhow::Result;
use clap::Parser;
use speed_watch::input::{self, new_analysis_id};
use speed_watch::notifier::AlertNotifier;
use speed_watch::pipeline::{PipelineEvent, SpeedPipeline};
use speed_watch::report::{self, RunReport, ViolationSink};
use speed_watch::types::Config;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "speed-watch", version, about = "Vehicle speed estimation and violation tracking")]
struct Cli {
    /// Path to the YAML configuration
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Detection log (.jsonl) or directory of logs; defaults to video.input_dir
    input: Option<PathBuf>,

    /// Override output.dir
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::from_env()?
    };
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.to_string_lossy().to_string();
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("speed_watch={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚗 Speed Watch Starting");
    if cli.config.exists() {
        info!("✓ Configuration loaded from {}", cli.config.display());
    } else {
        warn!(
            "Config {} not found, using defaults",
            cli.config.display()
        );
    }
    info!(
        "Speed limit: {:.0} km/h, debounce: Δ{:.0} km/h / {:.0}s, fps: {}",
        config.speed.limit_kmh,
        config.speed.debounce_speed_delta_kmh,
        config.speed.debounce_interval_secs,
        config.video.frame_rate
    );
    if let Some(url) = &config.notifier.webhook_url {
        info!("📡 Alert webhook: {}", url);
    }

    let input_path = cli
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.video.input_dir));
    let logs = input::resolve_inputs(&input_path)?;

    if logs.is_empty() {
        error!("No detection logs found in {}", input_path.display());
        return Ok(());
    }

    info!("Found {} detection log(s) to process", logs.len());

    let batch_id = new_analysis_id();
    for (idx, log_path) in logs.iter().enumerate() {
        let analysis_id = if logs.len() > 1 {
            format!("{}_{:02}", batch_id, idx + 1)
        } else {
            batch_id.clone()
        };

        info!("========================================");
        info!(
            "Processing log {}/{}: {} ({})",
            idx + 1,
            logs.len(),
            log_path.display(),
            analysis_id
        );
        info!("========================================");

        match process_log(log_path, &config, &analysis_id).await {
            Ok(run) => log_run_summary(&run),
            Err(e) => error!("Failed to process {}: {:#}", log_path.display(), e),
        }
    }

    Ok(())
}

struct RunOutcome {
    report: RunReport,
    frames: u64,
    fps: f64,
    alerts_delivered: u64,
    alert_failures: u64,
    outputs: Vec<PathBuf>,
}

async fn process_log(log_path: &Path, config: &Config, analysis_id: &str) -> Result<RunOutcome> {
    let frames = input::read_frames(log_path)?;
    info!("Loaded {} frames", frames.len());

    let mut pipeline = SpeedPipeline::new(config, analysis_id)?;
    let notifier = AlertNotifier::new(&config.notifier, analysis_id, pipeline.metrics().clone())?;

    let output_dir = PathBuf::from(&config.output.dir);
    let mut sink = if config.output.write_violations_jsonl {
        Some(ViolationSink::create(&output_dir, analysis_id, &config.speed)?)
    } else {
        None
    };

    for frame in &frames {
        let ctx = pipeline.process_frame(frame);
        if !ctx.readings.is_empty() {
            debug!("Frame {}: {}", ctx.frame_index, ctx.labels().join(", "));
        }

        // Side effects run only after the frame's state is committed
        for event in pipeline.drain_events() {
            match event {
                PipelineEvent::ViolationRecorded { record, .. } => {
                    if let Some(sink) = sink.as_mut() {
                        if let Err(e) = sink.append(&record) {
                            error!("Failed to persist violation: {:#}", e);
                        }
                    }
                }
                PipelineEvent::SpeedLimitExceeded(alert) => {
                    notifier.notify(&alert).await;
                }
                PipelineEvent::AnalyticsCheckpoint(checkpoint) => {
                    debug!(
                        "📈 Checkpoint @ frame {} ({:.1}s): {} vehicles, {} violations",
                        checkpoint.frame_index,
                        checkpoint.timestamp_secs,
                        checkpoint.vehicles_detected,
                        checkpoint.violations_count
                    );
                }
            }
        }
    }

    let report = RunReport::build(pipeline.statistics(), pipeline.violations(), &config.speed);

    let mut outputs = Vec::new();
    if let Some(sink) = &sink {
        outputs.push(sink.path().to_path_buf());
    }
    if config.output.write_summary_json {
        outputs.push(report::write_summary_json(&output_dir, &report)?);
    }
    if config.output.write_text_report {
        outputs.push(report::write_text_report(
            &output_dir,
            &report,
            &config.speed,
        )?);
    }

    let metrics = pipeline.metrics().summary();
    Ok(RunOutcome {
        report,
        frames: pipeline.frames_processed(),
        fps: metrics.fps,
        alerts_delivered: metrics.alerts_delivered,
        alert_failures: metrics.alert_failures,
        outputs,
    })
}

fn log_run_summary(run: &RunOutcome) {
    let stats = &run.report.statistics;
    info!("✓ Log processed successfully!");
    info!("  Total frames: {}", run.frames);
    info!("  🚙 Vehicles detected: {}", stats.total_vehicles);
    info!("  🎯 Vehicles in zone: {}", stats.vehicles_in_zone);
    for (class_label, count) in &stats.class_distribution {
        info!("     {}: {}", class_label, count);
    }
    info!("  📝 Violation records: {}", stats.total_violations);
    info!("  Vehicles with violations: {}", stats.vehicles_with_violations);
    info!(
        "  Speed over records: max {} km/h, avg {:.1} km/h",
        stats.max_speed_kmh, stats.avg_speed_kmh
    );

    let speeding = run.report.speeding_count();
    if speeding > 0 {
        warn!(
            "  🚨 SPEEDING: {} records ({} high severity)",
            speeding,
            run.report.high_severity_count()
        );
    } else {
        info!("  🚨 Speeding records: 0");
    }
    if run.alert_failures > 0 {
        warn!(
            "  📡 Alerts: {} delivered, {} failed",
            run.alerts_delivered, run.alert_failures
        );
    } else {
        info!("  📡 Alerts delivered: {}", run.alerts_delivered);
    }
    for path in &run.outputs {
        info!("  💾 {}", path.display());
    }
    info!("  Processing Speed: {:.1} FPS", run.fps);
}
