//! Per-run orchestration.
//!
//! A `FramePipeline` owns one frame source, one detector, one sink and the
//! run's accumulators. Frames are processed to completion one at a time:
//! detect, accumulate, render, emit. Decay and spreading are order-dependent,
//! so frames are never reordered or processed concurrently.
//!
//! State machine:
//! `Idle -> Initializing -> Running(n) -> ... -> Finalizing -> Done`, with
//! any unrecoverable error moving to `Failed`. A stop request is honored
//! between frames and finalizes normally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::detect::{Detection, DetectionSource};
use crate::error::{HeatmapError, Result};
use crate::frame::{Frame, FrameMeta, PointSample};
use crate::heatmap::{
    DensityGrid, DensityStats, GridParams, OverlayRenderer, DEFAULT_DECAY_FACTOR,
    DEFAULT_OVERLAY_ALPHA,
};
use crate::ingest::FrameSource;
use crate::output::FrameSink;
use crate::report::RunReport;
use crate::stats::FrameStatsCollector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub grid: GridParams,
    /// Per-frame decay, in `(0, 1]`.
    pub decay_factor: f32,
    /// Overlay opacity, in `[0, 1]`.
    pub overlay_alpha: f32,
    pub draw_detections: bool,
    /// Detections below this confidence are ignored.
    pub confidence_threshold: f32,
    /// Log progress every N frames; 0 disables.
    pub progress_every: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid: GridParams::default(),
            decay_factor: DEFAULT_DECAY_FACTOR,
            overlay_alpha: DEFAULT_OVERLAY_ALPHA,
            draw_detections: true,
            confidence_threshold: 0.5,
            progress_every: 30,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(HeatmapError::Configuration(format!(
                "decay_factor must be within (0, 1], got {}",
                self.decay_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.overlay_alpha) {
            return Err(HeatmapError::Configuration(format!(
                "overlay_alpha must be within [0, 1], got {}",
                self.overlay_alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(HeatmapError::Configuration(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Initializing,
    Running { frame_index: u64 },
    Finalizing,
    Done,
    Failed,
}

/// Reported to the observer after each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProgress {
    pub frame_index: u64,
    pub person_count: u64,
    pub total_people: u64,
    pub expected_frames: Option<u64>,
}

type Observer = Box<dyn FnMut(&FrameProgress) + Send>;

pub struct FramePipeline<S, D, K> {
    config: PipelineConfig,
    source: S,
    detector: D,
    sink: K,
    renderer: OverlayRenderer,
    grid: Option<DensityGrid>,
    stats: FrameStatsCollector,
    meta: Option<FrameMeta>,
    state: PipelineState,
    stop: Arc<AtomicBool>,
    observer: Option<Observer>,
}

impl<S, D, K> FramePipeline<S, D, K>
where
    S: FrameSource,
    D: DetectionSource,
    K: FrameSink,
{
    pub fn new(config: PipelineConfig, source: S, detector: D, sink: K) -> Self {
        Self {
            config,
            source,
            detector,
            sink,
            renderer: OverlayRenderer::new(),
            grid: None,
            stats: FrameStatsCollector::new(),
            meta: None,
            state: PipelineState::Idle,
            stop: Arc::new(AtomicBool::new(false)),
            observer: None,
        }
    }

    /// Share an externally owned stop flag (e.g. a Ctrl-C handler's).
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&FrameProgress) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Setting the returned flag stops the run at the next frame boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn meta(&self) -> Option<&FrameMeta> {
        self.meta.as_ref()
    }

    pub fn grid(&self) -> Option<&DensityGrid> {
        self.grid.as_ref()
    }

    pub fn stats(&self) -> &FrameStatsCollector {
        &self.stats
    }

    /// Grid summary; zeros before the grid exists.
    pub fn density_stats(&self) -> DensityStats {
        self.grid
            .as_ref()
            .map(DensityGrid::stats)
            .unwrap_or_default()
    }

    pub fn renderer(&self) -> &OverlayRenderer {
        &self.renderer
    }

    /// Runs the whole stream. A pipeline runs once; build a new one per video.
    pub fn run(&mut self) -> Result<RunReport> {
        if self.state != PipelineState::Idle {
            return Err(HeatmapError::Configuration(format!(
                "pipeline already used (state {:?})",
                self.state
            )));
        }
        if let Err(err) = self.config.validate() {
            return self.fail(err);
        }

        self.state = PipelineState::Initializing;
        let meta = match self.initialize() {
            Ok(meta) => meta,
            Err(err) => return self.fail(err),
        };

        let mut frame_index = 0u64;
        let mut stopped_early = false;
        loop {
            if self.stop.load(Ordering::SeqCst) {
                log::info!("stop requested after {} frames", frame_index);
                stopped_early = true;
                break;
            }
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    return self.fail(HeatmapError::SourceUnavailable(format!(
                        "failed to read frame {}: {:#}",
                        frame_index + 1,
                        err
                    )))
                }
            };
            frame_index += 1;
            self.state = PipelineState::Running { frame_index };
            if let Err(err) = self.process_frame(&meta, frame_index, &frame) {
                return self.fail(err);
            }
        }

        self.finalize(&meta, stopped_early)
    }

    fn initialize(&mut self) -> Result<FrameMeta> {
        let meta = self
            .source
            .open()
            .map_err(HeatmapError::source_unavailable)?;
        if meta.width == 0 || meta.height == 0 {
            return Err(HeatmapError::SourceUnavailable(format!(
                "source reported invalid resolution {}",
                meta.resolution()
            )));
        }
        if meta.fps == 0 {
            return Err(HeatmapError::SourceUnavailable(
                "source reported a frame rate of 0".to_string(),
            ));
        }

        self.grid = Some(DensityGrid::with_params(
            meta.height,
            meta.width,
            self.config.grid,
        )?);
        self.detector.warm_up().map_err(|e| {
            HeatmapError::Configuration(format!(
                "detector '{}' failed to warm up: {:#}",
                self.detector.name(),
                e
            ))
        })?;
        self.sink
            .open(&meta)
            .map_err(|e| HeatmapError::SinkWrite {
                frame_index: 0,
                reason: format!("{e:#}"),
            })?;

        log::info!(
            "processing video: {} @ {}fps, {} frames, detector {}",
            meta.resolution(),
            meta.fps,
            meta.frame_count
                .map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            self.detector.name()
        );
        self.meta = Some(meta);
        Ok(meta)
    }

    fn process_frame(&mut self, meta: &FrameMeta, frame_index: u64, frame: &Frame) -> Result<()> {
        if !meta.matches(frame) {
            return Err(HeatmapError::SourceUnavailable(format!(
                "frame {} is {}x{} but the run is {}",
                frame_index,
                frame.width(),
                frame.height(),
                meta.resolution()
            )));
        }

        let people = self.detect_people(frame, frame_index);
        let points: Vec<PointSample> = people.iter().map(|d| d.bbox.centroid()).collect();
        let person_count = people.len() as u64;

        let snapshot = {
            let grid = self.grid.as_mut().ok_or_else(|| {
                HeatmapError::Configuration("density grid used before initialization".to_string())
            })?;
            grid.update(self.config.decay_factor, &points);
            grid.snapshot()
        };
        self.stats.record(frame_index, person_count, meta.fps);

        let annotated;
        let base = if self.config.draw_detections && !people.is_empty() {
            annotated = self.renderer.draw_detections(frame, &people);
            &annotated
        } else {
            frame
        };
        let rendered = self
            .renderer
            .composite(base, &snapshot, self.config.overlay_alpha);
        self.sink
            .write_frame(frame_index, &rendered)
            .map_err(|e| HeatmapError::SinkWrite {
                frame_index,
                reason: format!("{e:#}"),
            })?;

        self.report_progress(meta, frame_index, person_count);
        Ok(())
    }

    /// Detector output filtered to confident person boxes. A detector error
    /// counts as an empty frame.
    fn detect_people(&mut self, frame: &Frame, frame_index: u64) -> Vec<Detection> {
        let detections = match self.detector.detect(frame, frame_index) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!(
                    "{}",
                    HeatmapError::Detection {
                        frame_index,
                        reason: format!("{err:#}"),
                    }
                );
                return Vec::new();
            }
        };
        let threshold = self.config.confidence_threshold;
        detections
            .into_iter()
            .filter(|d| d.is_person() && d.confidence >= threshold)
            .collect()
    }

    fn report_progress(&mut self, meta: &FrameMeta, frame_index: u64, person_count: u64) {
        let every = self.config.progress_every;
        if every > 0 && frame_index % every == 0 {
            match meta.frame_count.filter(|&n| n > 0) {
                Some(total) => log::info!(
                    "processing progress: {:.1}% ({}/{})",
                    frame_index as f64 / total as f64 * 100.0,
                    frame_index,
                    total
                ),
                None => log::info!("processing progress: {} frames", frame_index),
            }
        }
        if let Some(observer) = self.observer.as_mut() {
            observer(&FrameProgress {
                frame_index,
                person_count,
                total_people: self.stats.total_people(),
                expected_frames: meta.frame_count,
            });
        }
    }

    fn finalize(&mut self, meta: &FrameMeta, stopped_early: bool) -> Result<RunReport> {
        self.state = PipelineState::Finalizing;
        self.source.close();
        if let Err(err) = self.sink.finish() {
            self.state = PipelineState::Failed;
            let err = HeatmapError::SinkWrite {
                frame_index: self.stats.frame_count(),
                reason: format!("{err:#}"),
            };
            log::error!("run failed: {}", err);
            return Err(err);
        }

        let report = RunReport::new(
            &self.stats.summarize(),
            self.density_stats(),
            meta,
            stopped_early,
        );
        self.state = PipelineState::Done;
        log::info!(
            "video processing completed: {} frames, {} people, max {} at frame {}",
            report.total_frames,
            report.total_people_detected,
            report.max_people_count,
            report.max_people_frame
        );
        Ok(report)
    }

    /// Moves to `Failed`, releasing source and sink.
    fn fail<T>(&mut self, err: HeatmapError) -> Result<T> {
        self.state = PipelineState::Failed;
        self.source.close();
        if let Err(finish_err) = self.sink.finish() {
            log::warn!("sink cleanup after failure also failed: {:#}", finish_err);
        }
        log::error!("run failed: {}", err);
        Err(err)
    }
}
