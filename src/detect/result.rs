use serde::{Deserialize, Serialize};

use crate::frame::PointSample;

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box from center and size, as YOLO-style heads report them.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).abs()
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Centroid floored to whole pixels.
    pub fn centroid(&self) -> PointSample {
        PointSample {
            x: ((self.x1 + self.x2) / 2.0).floor() as i64,
            y: ((self.y1 + self.y2) / 2.0).floor() as i64,
        }
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.min(self.x2).max(other.x1.min(other.x2));
        let iy1 = self.y1.min(self.y2).max(other.y1.min(other.y2));
        let ix2 = self.x1.max(self.x2).min(other.x1.max(other.x2));
        let iy2 = self.y1.max(self.y2).min(other.y1.max(other.y2));
        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    #[default]
    Person,
    Vehicle,
    Animal,
    Unknown,
}

/// One detector hit for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    #[serde(default)]
    pub label: ObjectClass,
}

impl Detection {
    pub fn person(bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            label: ObjectClass::Person,
        }
    }

    pub fn is_person(&self) -> bool {
        self.label == ObjectClass::Person
    }
}

/// Greedy non-maximum suppression, highest confidence first.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = keep.iter().any(|kept| {
            kept.label == candidate.label && kept.bbox.iou(&candidate.bbox) >= iou_threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_is_floored_midpoint() {
        let b = BoundingBox::new(10.0, 20.0, 15.0, 31.0);
        assert_eq!(b.centroid(), PointSample { x: 12, y: 25 });
        let negative = BoundingBox::new(-9.0, -9.0, -4.0, -4.0);
        assert_eq!(negative.centroid(), PointSample { x: -7, y: -7 });
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);
        let half = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&half) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn nms_drops_overlapping_lower_scores() {
        let detections = vec![
            Detection::person(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.6),
            Detection::person(BoundingBox::new(1.0, 1.0, 11.0, 11.0), 0.9),
            Detection::person(BoundingBox::new(50.0, 50.0, 60.0, 60.0), 0.7),
        ];
        let kept = non_max_suppression(detections, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.7);
    }

    #[test]
    fn detection_deserializes_from_array_bbox() {
        let d: Detection =
            serde_json::from_str(r#"{"bbox": [1, 2, 3, 4], "confidence": 0.8}"#).unwrap();
        assert_eq!(d.bbox, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        assert!(d.is_person());
    }
}
