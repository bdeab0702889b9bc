//! Failure taxonomy for a heatmap run.
//!
//! Source, sink and detector seams report `anyhow::Error`; the pipeline maps
//! those into `HeatmapError` at the boundary so callers can tell a bad
//! configuration from a broken source or a full disk.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeatmapError {
    /// Bad grid or overlay parameters. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The frame source could not be opened, read, or reported bad metadata.
    #[error("frame source unavailable: {0}")]
    SourceUnavailable(String),

    /// A detector failed on a single frame. The pipeline logs it and treats
    /// the frame as empty.
    #[error("detection failed on frame {frame_index}: {reason}")]
    Detection { frame_index: u64, reason: String },

    /// Writing a rendered frame failed. Any partial output is invalid.
    #[error("frame sink write failed on frame {frame_index}: {reason}")]
    SinkWrite { frame_index: u64, reason: String },
}

impl HeatmapError {
    pub(crate) fn source_unavailable(err: anyhow::Error) -> Self {
        Self::SourceUnavailable(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, HeatmapError>;
