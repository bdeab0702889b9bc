//! crowd_heatmap - render a crowd density overlay for a video
//!
//! Reads frames from a video file, an image directory or `stub://`, writes
//! the overlaid frames as a PNG sequence, and exports the run report, the
//! per-frame statistics and a standalone heatmap image.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crowd_heatmap::output::{FrameSink, ImageSequenceSink, NullSink};
use crowd_heatmap::report::{save_heatmap_image, write_frame_statistics};
use crowd_heatmap::ui::Ui;
use crowd_heatmap::{build_detector, FileConfig, FileSource, FramePipeline, RunConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file, frame directory, or stub:// URL.
    #[arg(long)]
    input: String,
    /// Directory for rendered frames and exported artifacts.
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    /// JSON config file (defaults to $CROWD_HEATMAP_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Detector backend (replay|tract).
    #[arg(long, env = "CROWD_HEATMAP_DETECTOR")]
    detector: Option<String>,
    /// Detections file for the replay detector.
    #[arg(long)]
    detections: Option<PathBuf>,
    /// ONNX model for the tract detector.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Grid cell edge in pixels.
    #[arg(long)]
    cell_size: Option<u32>,
    /// Per-frame density decay, in (0, 1].
    #[arg(long)]
    decay: Option<f32>,
    /// Overlay opacity, in [0, 1].
    #[arg(long)]
    alpha: Option<f32>,
    /// Minimum detection confidence.
    #[arg(long)]
    confidence: Option<f32>,
    /// Frame rate for inputs without one (image directories, stub://).
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Skip drawing detection boxes.
    #[arg(long)]
    no_draw: bool,
    /// Do not write rendered frames; export statistics only.
    #[arg(long)]
    no_frames: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let ui = Ui::from_flag(Some(&args.ui), std::io::stderr().is_terminal());

    let cfg = {
        let _stage = ui.stage("Load configuration");
        load_config(&args)?
    };

    let source = FileSource::new(FileConfig {
        path: args.input.clone(),
        fps: args.fps,
        ..FileConfig::default()
    })?;
    let detector = {
        let _stage = ui.stage("Build detector");
        build_detector(&cfg.detector)?
    };
    let sink: Box<dyn FrameSink> = if args.no_frames {
        Box::new(NullSink::new())
    } else {
        Box::new(ImageSequenceSink::new(args.output_dir.join("frames")))
    };

    let pipeline = FramePipeline::new(cfg.pipeline, source, detector, sink);
    let stop = pipeline.stop_handle();
    ctrlc::set_handler(move || {
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    // Frame count is unknown until the source opens; the bar takes its
    // length from the first progress event.
    let bar = ui.frames(None);
    let observer_bar = bar.clone();
    let mut pipeline = pipeline.with_observer(move |progress| observer_bar.update(progress));

    log::info!("crowd_heatmap running. input {}", args.input);
    let result = pipeline.run();
    bar.finish();
    let report = result?;

    let _stage = ui.stage("Export artifacts");
    let out = &args.output_dir;
    report.write_json(&out.join("report.json"))?;
    write_frame_statistics(&out.join("frame_statistics.json"), pipeline.stats().records())?;
    if let Some(grid) = pipeline.grid() {
        save_heatmap_image(
            &out.join("heatmap.png"),
            pipeline.renderer(),
            &grid.snapshot(),
            cfg.heatmap_scale,
        )?;
    }
    log::info!(
        "{} frames, {} people, avg {:.2}/frame, peak {} at {:.2}s{}",
        report.total_frames,
        report.total_people_detected,
        report.avg_people_per_frame,
        report.max_people_count,
        report.max_people_timestamp,
        if report.stopped_early { " (stopped early)" } else { "" }
    );
    log::info!("artifacts written to {}", out.display());
    Ok(())
}

fn load_config(args: &Args) -> Result<RunConfig> {
    let mut cfg = match &args.config {
        Some(path) => RunConfig::load_from(Path::new(path))?,
        None => RunConfig::load()?,
    };
    if let Some(kind) = &args.detector {
        cfg.detector.kind = kind.parse()?;
    }
    if let Some(path) = &args.detections {
        cfg.detector.detections_path = Some(path.clone());
    }
    if let Some(path) = &args.model {
        cfg.detector.model_path = Some(path.clone());
    }
    if let Some(cell_size) = args.cell_size {
        cfg.pipeline.grid.cell_size = cell_size;
    }
    if let Some(decay) = args.decay {
        cfg.pipeline.decay_factor = decay;
    }
    if let Some(alpha) = args.alpha {
        cfg.pipeline.overlay_alpha = alpha;
    }
    if let Some(confidence) = args.confidence {
        cfg.set_confidence_threshold(confidence);
    }
    if args.no_draw {
        cfg.pipeline.draw_detections = false;
    }
    cfg.validate()?;
    Ok(cfg)
}
