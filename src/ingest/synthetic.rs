//! Synthetic source (`stub://`) for tests and demos.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use super::FrameSource;
use crate::frame::{Frame, FrameMeta};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 10,
            frames: 100,
        }
    }
}

/// Generates a fixed number of patterned frames.
pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    opened: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            opened: false,
        }
    }

    /// Generate synthetic pixel data.
    ///
    /// A diagonal gradient that drifts one pixel per frame, so consecutive
    /// frames differ.
    fn generate(&self) -> Frame {
        let shift = self.frame_count as u32;
        RgbImage::from_fn(self.config.width, self.config.height, |x, y| {
            let v = ((x + y + shift) % 256) as u8;
            Rgb([v, v / 2, 255 - v])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<FrameMeta> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(anyhow!(
                "synthetic source dimensions must be non-zero, got {}x{}",
                self.config.width,
                self.config.height
            ));
        }
        self.opened = true;
        self.frame_count = 0;
        log::info!(
            "SyntheticSource: {}x{} @ {}fps, {} frames",
            self.config.width,
            self.config.height,
            self.config.fps,
            self.config.frames
        );
        Ok(FrameMeta {
            width: self.config.width,
            height: self.config.height,
            fps: self.config.fps,
            frame_count: Some(self.config.frames),
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.opened {
            return Err(anyhow!("synthetic source read before open"));
        }
        if self.frame_count >= self.config.frames {
            return Ok(None);
        }
        self.frame_count += 1;
        Ok(Some(self.generate()))
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_configured_number_of_frames() {
        let mut source = SyntheticSource::new(SyntheticConfig {
            width: 8,
            height: 6,
            fps: 5,
            frames: 3,
        });
        let meta = source.open().unwrap();
        assert_eq!(meta.resolution(), "8x6");
        assert_eq!(meta.frame_count, Some(3));

        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 3);
        assert_ne!(frames[0], frames[1]);
        assert!(frames.iter().all(|f| meta.matches(f)));
    }

    #[test]
    fn zero_dimensions_fail_to_open() {
        let mut source = SyntheticSource::new(SyntheticConfig {
            width: 0,
            ..SyntheticConfig::default()
        });
        assert!(source.open().is_err());
    }
}
