//! Local frame source selection.
//!
//! `FileSource` picks a backend from the configured path:
//! - `stub://<name>`: synthetic frames
//! - a directory: image sequence
//! - a file: video decoded with FFmpeg (feature: ingest-ffmpeg)
//!
//! Only local paths are accepted; URL schemes other than `stub://` are
//! rejected.

use std::path::Path;

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::image_seq::ImageSequenceSource;
use super::synthetic::{SyntheticConfig, SyntheticSource};
use super::FrameSource;
use crate::frame::{Frame, FrameMeta};

/// Configuration for a local frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileConfig {
    /// Local path, frame directory, or `stub://` URL.
    pub path: String,
    /// Frame rate for sources without one (image sequences, synthetic). Video
    /// files report their own rate.
    pub fps: u32,
    /// Shape of `stub://` streams.
    pub synthetic: SyntheticConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            fps: 10,
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// Local frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    Images(ImageSequenceSource),
    #[cfg(feature = "ingest-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with("stub://") {
            return Ok(Self {
                backend: FileBackend::Synthetic(SyntheticSource::new(SyntheticConfig {
                    fps: config.fps,
                    ..config.synthetic
                })),
            });
        }

        let path = Path::new(&config.path);
        if path.is_dir() {
            return Ok(Self {
                backend: FileBackend::Images(ImageSequenceSource::new(path, config.fps)),
            });
        }
        if !path.exists() {
            return Err(anyhow!("input {} does not exist", config.path));
        }

        #[cfg(feature = "ingest-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)),
            })
        }
        #[cfg(not(feature = "ingest-ffmpeg"))]
        {
            Err(anyhow!(
                "video file ingestion requires the ingest-ffmpeg feature"
            ))
        }
    }

    fn inner(&mut self) -> &mut dyn FrameSource {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source,
            FileBackend::Images(source) => source,
            #[cfg(feature = "ingest-ffmpeg")]
            FileBackend::Ffmpeg(source) => source,
        }
    }
}

impl FrameSource for FileSource {
    fn open(&mut self) -> Result<FrameMeta> {
        self.inner().open()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.inner().next_frame()
    }

    fn close(&mut self) {
        self.inner().close()
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_remote_urls_and_empty_paths() {
        for path in ["", "  ", "rtsp://camera/stream", "https://example.com/a.mp4"] {
            let config = FileConfig {
                path: path.to_string(),
                ..FileConfig::default()
            };
            assert!(FileSource::new(config).is_err(), "{path} should be rejected");
        }
    }

    #[test]
    fn stub_url_uses_configured_fps() {
        let config = FileConfig {
            path: "stub://lobby".to_string(),
            fps: 24,
            synthetic: SyntheticConfig {
                width: 16,
                height: 8,
                fps: 1,
                frames: 2,
            },
        };
        let mut source = FileSource::new(config).unwrap();
        let meta = source.open().unwrap();
        assert_eq!(meta.fps, 24);
        assert_eq!((meta.width, meta.height), (16, 8));
    }

    #[test]
    fn missing_file_is_rejected() {
        let config = FileConfig {
            path: "/nonexistent/crowd.mp4".to_string(),
            ..FileConfig::default()
        };
        assert!(FileSource::new(config).is_err());
    }
}
