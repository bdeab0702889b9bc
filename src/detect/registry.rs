use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::backend::DetectionSource;
use super::backends::ReplayBackend;

/// Detection strategy, chosen by configuration when a run is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Detections read from a JSON file, keyed by frame index.
    #[default]
    Replay,
    /// YOLO-style ONNX model on tract (feature `backend-tract`).
    Tract,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Replay => "replay",
            DetectorKind::Tract => "tract",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replay" => Ok(DetectorKind::Replay),
            "tract" | "onnx" => Ok(DetectorKind::Tract),
            other => Err(anyhow!("unknown detector '{}' (expected replay|tract)", other)),
        }
    }
}

/// Everything needed to construct a detector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectorSettings {
    pub kind: DetectorKind,
    /// Detections file for `replay`. Without one every frame is empty.
    pub detections_path: Option<PathBuf>,
    /// ONNX model for `tract`.
    pub model_path: Option<PathBuf>,
    /// Square model input edge in pixels; 0 selects the backend default.
    pub input_size: u32,
    pub confidence_threshold: f32,
}

/// Builds the configured detector.
pub fn build_detector(settings: &DetectorSettings) -> Result<Box<dyn DetectionSource>> {
    match settings.kind {
        DetectorKind::Replay => {
            let backend = match &settings.detections_path {
                Some(path) => ReplayBackend::from_path(path)?,
                None => {
                    log::warn!("replay detector has no detections file; every frame is empty");
                    ReplayBackend::new()
                }
            };
            Ok(Box::new(backend))
        }
        DetectorKind::Tract => build_tract(settings),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(settings: &DetectorSettings) -> Result<Box<dyn DetectionSource>> {
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("tract detector requires a model path"))?;
    let backend = super::backends::TractBackend::new(model_path, settings.input_size)?
        .with_threshold(settings.confidence_threshold);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(_settings: &DetectorSettings) -> Result<Box<dyn DetectionSource>> {
    Err(anyhow!("tract detector requires the backend-tract feature"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_detector_names() {
        assert_eq!("replay".parse::<DetectorKind>().unwrap(), DetectorKind::Replay);
        assert_eq!(" ONNX ".parse::<DetectorKind>().unwrap(), DetectorKind::Tract);
        assert!("hog".parse::<DetectorKind>().is_err());
    }

    #[test]
    fn builds_replay_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"[[{"bbox": [0, 0, 4, 4], "confidence": 1.0}]]"#)
            .unwrap();
        let settings = DetectorSettings {
            detections_path: Some(file.path().to_path_buf()),
            ..DetectorSettings::default()
        };
        let mut detector = build_detector(&settings).unwrap();
        assert_eq!(detector.name(), "replay");
        let frame = image::RgbImage::new(8, 8);
        assert_eq!(detector.detect(&frame, 1).unwrap().len(), 1);
    }

    #[test]
    fn missing_replay_file_is_an_error() {
        let settings = DetectorSettings {
            detections_path: Some(PathBuf::from("/nonexistent/detections.json")),
            ..DetectorSettings::default()
        };
        assert!(build_detector(&settings).is_err());
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn tract_without_feature_is_an_error() {
        let settings = DetectorSettings {
            kind: DetectorKind::Tract,
            ..DetectorSettings::default()
        };
        assert!(build_detector(&settings).is_err());
    }
}
