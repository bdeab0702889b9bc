//! Frame types shared by sources, the renderer and sinks.
//!
//! Frames are packed 8-bit RGB buffers. Every frame of a run has the
//! resolution advertised by its source in `FrameMeta`.

use image::RgbImage;

/// One decoded video frame.
pub type Frame = RgbImage;

/// Stream metadata reported by a frame source once it is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameMeta {
    pub width: u32,
    pub height: u32,
    /// Whole frames per second; 0 when the container does not say.
    pub fps: u32,
    /// Advertised frame count, if the container carries one.
    pub frame_count: Option<u64>,
}

impl FrameMeta {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        frame.width() == self.width && frame.height() == self.height
    }
}

/// A single pixel coordinate fed into the density grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointSample {
    pub x: i64,
    pub y: i64,
}
