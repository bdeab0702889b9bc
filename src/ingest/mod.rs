//! Frame ingestion sources.
//!
//! This module provides different sources for decoded frames:
//! - Synthetic `stub://` source (tests, demos)
//! - Image-sequence directories (PNG/JPEG, one file per frame)
//! - Local video files (feature: ingest-ffmpeg)
//!
//! Every source is opened once, reports its `FrameMeta`, then yields frames in
//! order until it returns `Ok(None)`.

pub mod file;
#[cfg(feature = "ingest-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod image_seq;
pub mod synthetic;

use anyhow::Result;

use crate::frame::{Frame, FrameMeta};

pub use file::{FileConfig, FileSource};
pub use image_seq::ImageSequenceSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Sequential pull of frames with a fixed shape for the run.
pub trait FrameSource {
    /// Open the source and report its metadata.
    fn open(&mut self) -> Result<FrameMeta>;

    /// Next frame in video order, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release decoder resources. Called once when the run ends.
    fn close(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<FrameMeta> {
        (**self).open()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
