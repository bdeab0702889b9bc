use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::{DetectorKind, DetectorSettings};
use crate::heatmap::{
    GridParams, DEFAULT_CELL_SIZE, DEFAULT_DECAY_FACTOR, DEFAULT_OVERLAY_ALPHA,
    DEFAULT_SPREAD_MASS, DEFAULT_SPREAD_RADIUS,
};
use crate::pipeline::PipelineConfig;

pub const CONFIG_ENV: &str = "CROWD_HEATMAP_CONFIG";

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_PROGRESS_EVERY: u64 = 30;
const DEFAULT_HEATMAP_SCALE: u32 = 10;

#[derive(Debug, Deserialize, Default)]
struct RunConfigFile {
    grid: Option<GridConfigFile>,
    overlay: Option<OverlayConfigFile>,
    detector: Option<DetectorConfigFile>,
    progress_every: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct GridConfigFile {
    cell_size: Option<u32>,
    decay_factor: Option<f32>,
    spread_radius: Option<u32>,
    spread_mass: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    alpha: Option<f32>,
    draw_detections: Option<bool>,
    heatmap_scale: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    kind: Option<DetectorKind>,
    detections_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
}

/// Settings for one run, before the frame source is known.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub pipeline: PipelineConfig,
    pub detector: DetectorSettings,
    /// Pixels per cell in the saved heatmap image.
    pub heatmap_scale: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from_file(RunConfigFile::default())
    }
}

impl RunConfig {
    /// Defaults, then the JSON file named by `CROWD_HEATMAP_CONFIG`, then
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Like `load`, but reads an explicit file instead of `CROWD_HEATMAP_CONFIG`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RunConfigFile) -> Self {
        let grid = file.grid.unwrap_or_default();
        let overlay = file.overlay.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();

        let confidence_threshold = detector
            .confidence_threshold
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);
        let pipeline = PipelineConfig {
            grid: GridParams {
                cell_size: grid.cell_size.unwrap_or(DEFAULT_CELL_SIZE),
                spread_radius: grid.spread_radius.unwrap_or(DEFAULT_SPREAD_RADIUS),
                spread_mass: grid.spread_mass.unwrap_or(DEFAULT_SPREAD_MASS),
            },
            decay_factor: grid.decay_factor.unwrap_or(DEFAULT_DECAY_FACTOR),
            overlay_alpha: overlay.alpha.unwrap_or(DEFAULT_OVERLAY_ALPHA),
            draw_detections: overlay.draw_detections.unwrap_or(true),
            confidence_threshold,
            progress_every: file.progress_every.unwrap_or(DEFAULT_PROGRESS_EVERY),
        };
        let detector = DetectorSettings {
            kind: detector.kind.unwrap_or_default(),
            detections_path: detector.detections_path,
            model_path: detector.model_path,
            input_size: detector.input_size.unwrap_or(0),
            confidence_threshold,
        };

        Self {
            pipeline,
            detector,
            heatmap_scale: overlay.heatmap_scale.unwrap_or(DEFAULT_HEATMAP_SCALE),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(cell_size) = env_parse::<u32>("CROWD_HEATMAP_CELL_SIZE")? {
            self.pipeline.grid.cell_size = cell_size;
        }
        if let Some(decay) = env_parse::<f32>("CROWD_HEATMAP_DECAY")? {
            self.pipeline.decay_factor = decay;
        }
        if let Some(alpha) = env_parse::<f32>("CROWD_HEATMAP_ALPHA")? {
            self.pipeline.overlay_alpha = alpha;
        }
        if let Some(confidence) = env_parse::<f32>("CROWD_HEATMAP_CONFIDENCE")? {
            self.set_confidence_threshold(confidence);
        }
        if let Ok(kind) = std::env::var("CROWD_HEATMAP_DETECTOR") {
            if !kind.trim().is_empty() {
                self.detector.kind = kind.parse()?;
            }
        }
        if let Ok(path) = std::env::var("CROWD_HEATMAP_DETECTIONS") {
            if !path.trim().is_empty() {
                self.detector.detections_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("CROWD_HEATMAP_MODEL") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    /// The threshold is shared by the detector and the pipeline filter.
    pub fn set_confidence_threshold(&mut self, threshold: f32) {
        self.pipeline.confidence_threshold = threshold;
        self.detector.confidence_threshold = threshold;
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        self.pipeline.validate()?;
        if self.heatmap_scale == 0 {
            return Err(crate::HeatmapError::Configuration(
                "heatmap_scale must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} has an invalid value '{}'", key, raw)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<RunConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
