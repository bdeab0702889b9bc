use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Person detector consumed by the pipeline.
///
/// Implementations return boxes in the frame's own pixel coordinates. An
/// error only affects the frame it was raised for: the pipeline logs it and
/// treats the frame as empty.
pub trait DetectionSource: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame. `frame_index` is 1-based.
    fn detect(&mut self, frame: &Frame, frame_index: u64) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: DetectionSource + ?Sized> DetectionSource for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame, frame_index: u64) -> Result<Vec<Detection>> {
        (**self).detect(frame, frame_index)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
