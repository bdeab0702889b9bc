#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectionSource;
use crate::detect::result::{non_max_suppression, BoundingBox, Detection, ObjectClass};
use crate::frame::Frame;

const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
/// COCO class index for "person".
const PERSON_CLASS: usize = 0;

/// Tract-based person detector for YOLO-style ONNX models.
///
/// Expects a single `[1, 4 + classes, predictions]` output with boxes as
/// `(cx, cy, w, h)` in model input pixels. Only class 0 (person) is reported.
/// Frames are resized to the square model input and boxes scaled back.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let input_size = if input_size == 0 {
            DEFAULT_INPUT_SIZE
        } else {
            input_size
        };
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_size as usize, input_size as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            confidence_threshold: 0.5,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let size = self.input_size;
        let resized = imageops::resize(frame, size, size, FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size as usize, size as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>, width: u32, height: u32) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = scores.shape();
        if shape.len() != 3 || shape[1] <= 4 + PERSON_CLASS {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }

        let scale_x = width as f32 / self.input_size as f32;
        let scale_y = height as f32 / self.input_size as f32;
        let mut candidates = Vec::new();
        for i in 0..shape[2] {
            let confidence = scores[[0, 4 + PERSON_CLASS, i]];
            if confidence < self.confidence_threshold {
                continue;
            }
            let bbox = BoundingBox::from_center(
                scores[[0, 0, i]] * scale_x,
                scores[[0, 1, i]] * scale_y,
                scores[[0, 2, i]] * scale_x,
                scores[[0, 3, i]] * scale_y,
            );
            candidates.push(Detection {
                bbox,
                confidence: confidence.clamp(0.0, 1.0),
                label: ObjectClass::Person,
            });
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

impl DetectionSource for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, _frame_index: u64) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame.width(), frame.height())
    }
}
