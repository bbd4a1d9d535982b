// src/input.rs
//
// Detection logs: one JSON `FrameInput` per line, frames in order.

use crate::types::FrameInput;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const LOG_EXTENSIONS: [&str; 2] = ["jsonl", "JSONL"];

/// Reads every parsable frame from a detection log. Malformed lines are
/// logged and skipped; blank lines are ignored.
pub fn read_frames(path: &Path) -> Result<Vec<FrameInput>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open detection log {}", path.display()))?;
    parse_frames(BufReader::new(file), path)
}

fn parse_frames(reader: impl BufRead, source: &Path) -> Result<Vec<FrameInput>> {
    let mut frames = Vec::new();
    let mut skipped = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", source.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<FrameInput>(trimmed) {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                skipped += 1;
                warn!(
                    "Skipping malformed frame at {}:{}: {}",
                    source.display(),
                    idx + 1,
                    e
                );
            }
        }
    }

    if skipped > 0 {
        warn!("⚠️  {} malformed lines skipped in {}", skipped, source.display());
    }
    Ok(frames)
}

/// Detection logs under `dir`, sorted so batch runs are reproducible.
pub fn find_detection_logs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        anyhow::bail!("Input directory {} does not exist", dir.display());
    }

    let mut logs: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| LOG_EXTENSIONS.contains(&ext))
        })
        .collect();
    logs.sort();

    info!("Found {} detection logs", logs.len());
    Ok(logs)
}

/// A file is processed on its own; a directory is searched for logs.
pub fn resolve_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        find_detection_logs(path)
    }
}

pub fn new_analysis_id() -> String {
    format!("analysis_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"))
}
