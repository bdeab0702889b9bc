use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use image::RgbImage;

use crowd_heatmap::{
    BoundingBox, Detection, Frame, FrameMeta, FramePipeline, FrameSink, FrameSource,
    HeatmapError, ImageSequenceSink, NullSink, PipelineConfig, PipelineState, ReplayBackend,
    SyntheticConfig, SyntheticSource,
};

const COUNTS: [usize; 10] = [0, 1, 1, 3, 3, 3, 1, 0, 0, 2];

fn synthetic(frames: u64) -> SyntheticSource {
    SyntheticSource::new(SyntheticConfig {
        width: 200,
        height: 100,
        fps: 10,
        frames,
    })
}

fn people(n: usize) -> Vec<Detection> {
    (0..n)
        .map(|i| {
            let x = 20.0 + 50.0 * i as f32;
            Detection::person(BoundingBox::new(x, 20.0, x + 20.0, 60.0), 0.9)
        })
        .collect()
}

fn replay(counts: &[usize]) -> ReplayBackend {
    ReplayBackend::from_frames(counts.iter().map(|&n| people(n)).collect())
}

/// Keeps every written frame for inspection after the run.
#[derive(Clone, Default)]
struct CapturingSink {
    frames: Arc<Mutex<Vec<(u64, Frame)>>>,
    fail_at: Option<u64>,
}

impl FrameSink for CapturingSink {
    fn open(&mut self, _meta: &FrameMeta) -> Result<()> {
        Ok(())
    }

    fn write_frame(&mut self, frame_index: u64, frame: &Frame) -> Result<()> {
        if self.fail_at == Some(frame_index) {
            return Err(anyhow!("disk full"));
        }
        self.frames.lock().unwrap().push((frame_index, frame.clone()));
        Ok(())
    }
}

/// Reports one resolution and yields frames of another from the second frame on.
struct ShapeShiftingSource {
    yielded: u64,
}

impl FrameSource for ShapeShiftingSource {
    fn open(&mut self) -> Result<FrameMeta> {
        Ok(FrameMeta {
            width: 40,
            height: 30,
            fps: 5,
            frame_count: Some(3),
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.yielded += 1;
        Ok(Some(if self.yielded == 1 {
            RgbImage::new(40, 30)
        } else {
            RgbImage::new(30, 40)
        }))
    }
}

struct UnopenableSource;

impl FrameSource for UnopenableSource {
    fn open(&mut self) -> Result<FrameMeta> {
        Err(anyhow!("no such device"))
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(None)
    }
}

#[test]
fn ten_frame_run_produces_expected_report() {
    let mut pipeline = FramePipeline::new(
        PipelineConfig::default(),
        synthetic(10),
        replay(&COUNTS),
        NullSink::new(),
    );
    let report = pipeline.run().expect("run");

    assert_eq!(report.total_frames, 10);
    assert_eq!(report.total_people_detected, 14);
    assert_eq!(report.avg_people_per_frame, 1.4);
    assert_eq!(report.max_people_count, 3);
    assert_eq!(report.max_people_frame, 4);
    assert_eq!(report.max_people_timestamp, 0.4);
    assert_eq!(report.video_duration, 1.0);
    assert_eq!(report.fps, 10);
    assert_eq!(report.resolution, "200x100");
    assert!(!report.stopped_early);
    assert!(report.density_stats.max_density > 0.0);
    assert!(report.density_stats.total_activity > 0.0);
    assert_eq!(pipeline.state(), PipelineState::Done);

    let records = pipeline.stats().records();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0].frame_index, 1);
    assert_eq!(records[3].person_count, 3);
    assert_eq!(records[9].timestamp_seconds, 1.0);
}

#[test]
fn frames_without_activity_pass_through_unchanged() {
    let sink = CapturingSink::default();
    let frames = Arc::clone(&sink.frames);
    let mut pipeline = FramePipeline::new(
        PipelineConfig::default(),
        synthetic(3),
        replay(&[0, 1, 0]),
        sink,
    );
    pipeline.run().expect("run");

    let mut reference = synthetic(3);
    reference.open().unwrap();
    let originals: Vec<Frame> = (0..3).map(|_| reference.next_frame().unwrap().unwrap()).collect();

    let written = frames.lock().unwrap();
    assert_eq!(written.len(), 3);
    assert_eq!(written[0].0, 1);
    assert_eq!(written[0].1, originals[0]);
    assert_ne!(written[1].1, originals[1]);
    // Decayed density from frame 2 still tints frame 3.
    assert_ne!(written[2].1, originals[2]);
    assert_eq!(written[2].1.dimensions(), (200, 100));
}

#[test]
fn boxes_far_outside_the_frame_are_counted_and_rendered() {
    let far = |x1: f32, y1: f32, x2: f32, y2: f32| {
        Detection::person(BoundingBox::new(x1, y1, x2, y2), 0.9)
    };
    let detector = ReplayBackend::from_frames(vec![
        vec![far(3e9, 3e9, 4e9, 4e9), far(-3e9, -3e9, 50.0, 50.0)],
        vec![far(-4e9, -4e9, -3e9, -3e9)],
    ]);
    let sink = CapturingSink::default();
    let frames = Arc::clone(&sink.frames);
    let config = PipelineConfig::default();
    assert!(config.draw_detections);
    let mut pipeline = FramePipeline::new(config, synthetic(2), detector, sink);

    let report = pipeline.run().expect("out-of-frame boxes never abort the run");
    assert_eq!(report.total_frames, 2);
    assert_eq!(report.total_people_detected, 3);
    assert_eq!(report.max_people_frame, 1);

    let grid = pipeline.grid().expect("grid");
    assert_eq!((grid.width(), grid.height()), (4, 2));
    assert!(grid.value(0, 0).unwrap() > 0.0);
    assert!(grid.value(3, 1).unwrap() > 0.0);

    let written = frames.lock().unwrap();
    assert_eq!(written.len(), 2);
    assert!(written.iter().all(|(_, frame)| frame.dimensions() == (200, 100)));
}

#[test]
fn detector_failure_counts_as_an_empty_frame() {
    let detector = replay(&[2, 2, 2]).fail_on(2);
    let mut pipeline =
        FramePipeline::new(PipelineConfig::default(), synthetic(3), detector, NullSink::new());
    let report = pipeline.run().expect("run continues past detector errors");
    assert_eq!(report.total_frames, 3);
    assert_eq!(report.total_people_detected, 4);
    assert_eq!(pipeline.stats().records()[1].person_count, 0);
}

#[test]
fn sink_failure_aborts_the_run() {
    let sink = CapturingSink {
        fail_at: Some(3),
        ..CapturingSink::default()
    };
    let frames = Arc::clone(&sink.frames);
    let mut pipeline =
        FramePipeline::new(PipelineConfig::default(), synthetic(10), replay(&COUNTS), sink);
    match pipeline.run() {
        Err(HeatmapError::SinkWrite { frame_index, .. }) => assert_eq!(frame_index, 3),
        other => panic!("expected sink failure, got {other:?}"),
    }
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(frames.lock().unwrap().len(), 2);
}

#[test]
fn unopenable_source_is_reported() {
    let mut pipeline = FramePipeline::new(
        PipelineConfig::default(),
        UnopenableSource,
        ReplayBackend::new(),
        NullSink::new(),
    );
    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, HeatmapError::SourceUnavailable(_)));
    assert!(pipeline.grid().is_none());
}

#[test]
fn resolution_change_mid_stream_is_fatal() {
    let mut pipeline = FramePipeline::new(
        PipelineConfig::default(),
        ShapeShiftingSource { yielded: 0 },
        ReplayBackend::new(),
        NullSink::new(),
    );
    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, HeatmapError::SourceUnavailable(_)));
    assert_eq!(pipeline.stats().frame_count(), 1);
}

#[test]
fn image_sequence_sink_receives_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ImageSequenceSink::new(dir.path());
    let mut pipeline =
        FramePipeline::new(PipelineConfig::default(), synthetic(4), replay(&COUNTS), sink);
    pipeline.run().expect("run");
    for index in 1..=4 {
        let path = dir.path().join(format!("frame_{index:06}.png"));
        assert!(path.exists(), "missing {}", path.display());
    }
}

#[test]
fn observer_sees_each_frame_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let mut pipeline = FramePipeline::new(
        PipelineConfig::default(),
        synthetic(10),
        replay(&COUNTS),
        NullSink::new(),
    )
    .with_observer(move |progress| {
        sink_seen
            .lock()
            .unwrap()
            .push((progress.frame_index, progress.person_count));
    });
    pipeline.run().expect("run");

    let seen = seen.lock().unwrap();
    let expected: Vec<(u64, u64)> = COUNTS
        .iter()
        .enumerate()
        .map(|(i, &n)| (i as u64 + 1, n as u64))
        .collect();
    assert_eq!(*seen, expected);
}
