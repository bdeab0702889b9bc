//! Local video file source using FFmpeg.
//!
//! Decodes the best video stream in-memory and converts every frame to packed
//! RGB24. Frame rate and frame count come from the container.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use std::collections::VecDeque;

use super::file::FileConfig;
use super::FrameSource;
use crate::frame::{Frame, FrameMeta};

struct Decoding {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    ready: VecDeque<Frame>,
    eof_sent: bool,
}

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    state: Option<Decoding>,
    frame_count: u64,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Self {
        Self {
            config,
            state: None,
            frame_count: 0,
        }
    }
}

impl Decoding {
    /// Pulls every frame the decoder has ready into the queue.
    fn drain(&mut self) -> Result<()> {
        let mut decoded = ffmpeg::frame::Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let mut rgb_frame = ffmpeg::frame::Video::empty();
            self.scaler
                .run(&decoded, &mut rgb_frame)
                .context("scale frame to RGB")?;
            self.ready.push_back(frame_to_image(&rgb_frame)?);
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut fed = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                fed = true;
                break;
            }
            if !fed {
                self.decoder.send_eof().context("flush ffmpeg decoder")?;
                self.eof_sent = true;
            }
            self.drain()?;
        }
    }
}

impl FrameSource for FfmpegFileSource {
    fn open(&mut self) -> Result<FrameMeta> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&self.config.path).with_context(|| {
            format!("failed to open file input '{}' with ffmpeg", self.config.path)
        })?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let rate = input_stream.avg_frame_rate();
        let frames = input_stream.frames();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        // Whole frames per second, truncated like the container-reported rate.
        let fps = if rate.denominator() > 0 && rate.numerator() > 0 {
            (rate.numerator() / rate.denominator()) as u32
        } else {
            self.config.fps
        };
        let meta = FrameMeta {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            frame_count: (frames > 0).then_some(frames as u64),
        };

        self.state = Some(Decoding {
            input,
            stream_index,
            decoder,
            scaler,
            ready: VecDeque::new(),
            eof_sent: false,
        });
        self.frame_count = 0;
        log::info!(
            "FileSource: opened {} (ffmpeg) {}x{} @ {}fps",
            self.config.path,
            meta.width,
            meta.height,
            meta.fps
        );
        Ok(meta)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("ffmpeg source read before open"))?;
        let frame = state.next()?;
        if frame.is_some() {
            self.frame_count += 1;
        }
        Ok(frame)
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::debug!(
                "FileSource: closed {} after {} frames",
                self.config.path,
                self.frame_count
            );
        }
    }
}

fn frame_to_image(frame: &ffmpeg::frame::Video) -> Result<Frame> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let pixels = if stride == row_bytes {
        data.get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?
            .to_vec()
    } else {
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let end = start + row_bytes;
            pixels.extend_from_slice(
                data.get(start..end)
                    .context("ffmpeg frame row is out of bounds")?,
            );
        }
        pixels
    };

    Frame::from_raw(width, height, pixels).ok_or_else(|| anyhow!("ffmpeg frame size mismatch"))
}
