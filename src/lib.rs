//! Crowd density heatmaps for video streams.
//!
//! Each frame is run through a person detector. Detection centroids are
//! accumulated into a coarse, decaying density grid, and the grid is blended
//! back over the frame as a colored overlay. Per-frame counts feed a run report.
//!
//! # Module Structure
//!
//! - `frame`: frame buffer and stream metadata types
//! - `ingest`: frame sources (synthetic, image sequences, video files)
//! - `detect`: detection types and detector backends
//! - `heatmap`: the density grid and the overlay renderer
//! - `stats`: streaming per-frame statistics
//! - `pipeline`: the per-run orchestrator
//! - `output`: sinks for rendered frames
//! - `report`: the end-of-run report and exported artifacts
//! - `config`: layered run configuration

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod heatmap;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod ui;

pub use config::RunConfig;
pub use detect::{
    build_detector, BoundingBox, Detection, DetectionSource, DetectorKind, DetectorSettings,
    ObjectClass, ReplayBackend,
};
pub use error::HeatmapError;
pub use frame::{Frame, FrameMeta, PointSample};
pub use heatmap::{DensityGrid, DensityStats, GridParams, GridSnapshot, OverlayRenderer};
pub use ingest::{
    FileConfig, FileSource, FrameSource, ImageSequenceSource, SyntheticConfig, SyntheticSource,
};
pub use output::{FrameSink, ImageSequenceSink, NullSink};
pub use pipeline::{FrameProgress, FramePipeline, PipelineConfig, PipelineState};
pub use report::RunReport;
pub use stats::{FrameRecord, FrameStatsCollector, RunStatistics};
