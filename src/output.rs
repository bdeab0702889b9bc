//! Frame sinks for rendered frames.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::frame::{Frame, FrameMeta};

/// Sequential push of rendered frames, same shape as the input.
pub trait FrameSink {
    /// Prepare for a stream with the given metadata.
    fn open(&mut self, meta: &FrameMeta) -> Result<()>;

    /// Write one rendered frame. `frame_index` is 1-based.
    fn write_frame(&mut self, frame_index: u64, frame: &Frame) -> Result<()>;

    /// Flush and release resources. Called once when the run ends.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn open(&mut self, meta: &FrameMeta) -> Result<()> {
        (**self).open(meta)
    }

    fn write_frame(&mut self, frame_index: u64, frame: &Frame) -> Result<()> {
        (**self).write_frame(frame_index, frame)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Writes `frame_<index>.png` files into a directory.
pub struct ImageSequenceSink {
    dir: PathBuf,
    written: u64,
}

impl ImageSequenceSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            written: 0,
        }
    }

    pub fn frame_path(&self, frame_index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", frame_index))
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for ImageSequenceSink {
    fn open(&mut self, meta: &FrameMeta) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create output directory {}", self.dir.display()))?;
        self.written = 0;
        log::info!(
            "ImageSequenceSink: writing {} frames to {}",
            meta.resolution(),
            self.dir.display()
        );
        Ok(())
    }

    fn write_frame(&mut self, frame_index: u64, frame: &Frame) -> Result<()> {
        let path = self.frame_path(frame_index);
        frame
            .save(&path)
            .map_err(|e| anyhow!("failed to write {}: {}", path.display(), e))?;
        self.written += 1;
        Ok(())
    }
}

/// Discards frames; for statistics-only runs.
#[derive(Debug, Default)]
pub struct NullSink {
    written: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for NullSink {
    fn open(&mut self, _meta: &FrameMeta) -> Result<()> {
        Ok(())
    }

    fn write_frame(&mut self, _frame_index: u64, _frame: &Frame) -> Result<()> {
        self.written += 1;
        Ok(())
    }
}
