//! Replay backend: fixed detection lists per frame index.
//!
//! Used for tests and for re-rendering heatmaps from detections produced
//! offline. The JSON file is either a list of per-frame lists (first entry is
//! frame 1) or an object `{"frames": {"<index>": [...]}}`; frames missing
//! from the object have no detections.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::detect::backend::DetectionSource;
use crate::detect::result::Detection;
use crate::frame::Frame;

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayFile {
    Indexed {
        frames: BTreeMap<String, Vec<Detection>>,
    },
    Sequence(Vec<Vec<Detection>>),
}

#[derive(Clone, Debug, Default)]
pub struct ReplayBackend {
    frames: BTreeMap<u64, Vec<Detection>>,
    failing: BTreeSet<u64>,
}

impl ReplayBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-frame lists in frame order; the first list belongs to frame 1.
    pub fn from_frames(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: frames
                .into_iter()
                .enumerate()
                .map(|(i, d)| (i as u64 + 1, d))
                .collect(),
            failing: BTreeSet::new(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ReplayFile =
            serde_json::from_str(raw).map_err(|e| anyhow!("invalid detections file: {}", e))?;
        match file {
            ReplayFile::Indexed { frames } => {
                let frames = frames
                    .into_iter()
                    .map(|(key, detections)| {
                        let index: u64 = key
                            .trim()
                            .parse()
                            .map_err(|_| anyhow!("frame key '{}' is not a frame index", key))?;
                        Ok((index, detections))
                    })
                    .collect::<Result<_>>()?;
                Ok(Self {
                    frames,
                    failing: BTreeSet::new(),
                })
            }
            ReplayFile::Sequence(frames) => Ok(Self::from_frames(frames)),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read detections file {}: {}", path.display(), e))?;
        Self::from_json(&raw)
    }

    /// Make `detect` fail for the given frame, as a broken detector would.
    pub fn fail_on(mut self, frame_index: u64) -> Self {
        self.failing.insert(frame_index);
        self
    }

    pub fn with_frame(mut self, frame_index: u64, detections: Vec<Detection>) -> Self {
        self.frames.insert(frame_index, detections);
        self
    }
}

impl DetectionSource for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&mut self, _frame: &Frame, frame_index: u64) -> Result<Vec<Detection>> {
        if self.failing.contains(&frame_index) {
            return Err(anyhow!("replayed detector failure"));
        }
        Ok(self.frames.get(&frame_index).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;
    use image::RgbImage;

    #[test]
    fn sequence_file_starts_at_frame_one() {
        let mut backend = ReplayBackend::from_json(
            r#"[[], [{"bbox": [0, 0, 10, 10], "confidence": 0.9}]]"#,
        )
        .unwrap();
        let frame = RgbImage::new(4, 4);
        assert!(backend.detect(&frame, 1).unwrap().is_empty());
        assert_eq!(backend.detect(&frame, 2).unwrap().len(), 1);
        assert!(backend.detect(&frame, 3).unwrap().is_empty());
    }

    #[test]
    fn indexed_file_skips_missing_frames() {
        let mut backend = ReplayBackend::from_json(
            r#"{"frames": {"4": [
                {"bbox": [0, 0, 10, 10], "confidence": 0.9, "label": "person"},
                {"bbox": [5, 5, 15, 15], "confidence": 0.7, "label": "vehicle"}
            ]}}"#,
        )
        .unwrap();
        let frame = RgbImage::new(4, 4);
        assert!(backend.detect(&frame, 1).unwrap().is_empty());
        let hits = backend.detect(&frame, 4).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].is_person());
        assert!(!hits[1].is_person());
    }

    #[test]
    fn scripted_failures_surface_as_errors() {
        let mut backend = ReplayBackend::new()
            .with_frame(2, vec![Detection::person(BoundingBox::new(0.0, 0.0, 2.0, 2.0), 1.0)])
            .fail_on(2);
        let frame = RgbImage::new(4, 4);
        assert!(backend.detect(&frame, 2).is_err());
    }

    #[test]
    fn malformed_file_is_rejected() {
        assert!(ReplayBackend::from_json(r#"{"frames": 3}"#).is_err());
    }
}
