//! End-of-run report and artifact export.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::frame::FrameMeta;
use crate::heatmap::{DensityStats, GridSnapshot, OverlayRenderer};
use crate::stats::{FrameRecord, RunStatistics};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Summary of one run. Derived values are rounded to two decimals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub total_frames: u64,
    pub total_people_detected: u64,
    pub avg_people_per_frame: f64,
    pub max_people_count: u64,
    pub max_people_frame: u64,
    /// Seconds into the video of `max_people_frame`.
    pub max_people_timestamp: f64,
    /// Seconds of video processed.
    pub video_duration: f64,
    pub fps: u32,
    /// `"WxH"`.
    pub resolution: String,
    pub density_stats: DensityStats,
    /// Local ISO-8601 time the report was built.
    pub processing_time: String,
    pub stopped_early: bool,
}

impl RunReport {
    pub fn new(
        stats: &RunStatistics,
        density: DensityStats,
        meta: &FrameMeta,
        stopped_early: bool,
    ) -> Self {
        let per_second = |frames: u64| {
            if meta.fps == 0 {
                0.0
            } else {
                round2(frames as f64 / f64::from(meta.fps))
            }
        };
        Self {
            total_frames: stats.total_frames,
            total_people_detected: stats.total_people_detected,
            avg_people_per_frame: round2(stats.avg_people_per_frame),
            max_people_count: stats.max_people_count,
            max_people_frame: stats.max_people_frame,
            max_people_timestamp: per_second(stats.max_people_frame),
            video_duration: per_second(stats.total_frames),
            fps: meta.fps,
            resolution: meta.resolution(),
            density_stats: density,
            processing_time: local_timestamp(),
            stopped_early,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

#[derive(Serialize)]
struct FrameStatisticsExport<'a> {
    frame_statistics: &'a [FrameRecord],
    export_time: String,
}

/// Writes `{"frame_statistics": [...], "export_time": "<ISO-8601>"}`.
pub fn write_frame_statistics(path: &Path, records: &[FrameRecord]) -> Result<()> {
    write_json(
        path,
        &FrameStatisticsExport {
            frame_statistics: records,
            export_time: local_timestamp(),
        },
    )
}

/// Saves the grid as a standalone colormapped image, `scale` pixels per cell.
pub fn save_heatmap_image(
    path: &Path,
    renderer: &OverlayRenderer,
    snapshot: &GridSnapshot,
    scale: u32,
) -> Result<()> {
    if scale == 0 {
        return Err(anyhow!("heatmap scale must be greater than zero"));
    }
    ensure_parent(path)?;
    renderer
        .render_heatmap(snapshot, scale)
        .save(path)
        .map_err(|e| anyhow!("failed to save heatmap {}: {}", path.display(), e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value).context("serialize report")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display())),
        _ => Ok(()),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Local wall-clock time without offset, microsecond precision.
fn local_timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format(TIMESTAMP_FORMAT)
        .to_string()
}
