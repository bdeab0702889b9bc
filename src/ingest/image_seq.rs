//! Image-sequence source: a directory with one PNG/JPEG file per frame.
//!
//! Frames are taken in file-name order. The first file fixes the resolution
//! reported in `FrameMeta`; the pipeline rejects later files that differ.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::FrameSource;
use crate::frame::{Frame, FrameMeta};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    fps: u32,
    files: Vec<PathBuf>,
    cursor: usize,
    /// First frame, decoded during `open` to learn the resolution.
    pending: Option<Frame>,
}

impl ImageSequenceSource {
    pub fn new<P: AsRef<Path>>(dir: P, fps: u32) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            fps,
            files: Vec::new(),
            cursor: 0,
            pending: None,
        }
    }

    fn list_frames(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read frame directory {}", self.dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_frame && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode frame {}", path.display()))?;
    Ok(image.to_rgb8())
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<FrameMeta> {
        self.files = self.list_frames()?;
        self.cursor = 0;
        let first = self
            .files
            .first()
            .ok_or_else(|| anyhow!("no frames found in {}", self.dir.display()))?;
        let frame = load_frame(first)?;
        let meta = FrameMeta {
            width: frame.width(),
            height: frame.height(),
            fps: self.fps,
            frame_count: Some(self.files.len() as u64),
        };
        self.pending = Some(frame);
        self.cursor = 1;
        log::info!(
            "ImageSequenceSource: {} frames from {}",
            self.files.len(),
            self.dir.display()
        );
        Ok(meta)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        load_frame(path).map(Some)
    }

    fn close(&mut self) {
        self.pending = None;
        self.files.clear();
        self.cursor = 0;
    }
}
