//! Local video file frame source.
//!
//! `FileSource` decodes BGR24 frames from a local video file:
//! - `stub://` paths run a deterministic synthetic clip (tests, demos);
//!   `stub://empty` yields zero frames, which exercises the
//!   first-frame-read failure path
//! - real paths decode via FFmpeg (feature: video-ffmpeg)
//!
//! After a successful open, [`FileSource::video_info`] reports the stream
//! geometry, the frame rate rounded to the nearest integer, and the total
//! frame count when the container knows it. The output writer and the
//! progress display are set up from this.

use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::source::FrameSource;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (no URL schemes) or "stub://..." for synthetic.
    pub path: String,
    /// Stop after this many frames even if the file has more. `None` plays
    /// the whole file.
    pub frame_limit: Option<u64>,
}

/// Properties of an opened video stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Detected frame rate, rounded to the nearest integer.
    pub fps: u32,
    /// Total frames if the container reports it.
    pub total_frames: Option<u64>,
}

/// Local video file frame source.
pub struct FileSource {
    backend: FileBackend,
    frame_limit: Option<u64>,
    frames_read: u64,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(crate::source::file_ffmpeg::FfmpegFileSource),
}

impl FileSource {
    /// Open a video file for reading. Fails if the path cannot be opened or
    /// contains no video stream.
    pub fn open(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let frame_limit = config.frame_limit;
        let backend = if config.path.starts_with("stub://") {
            FileBackend::Synthetic(SyntheticFileSource::new(config))
        } else {
            #[cfg(feature = "video-ffmpeg")]
            {
                FileBackend::Ffmpeg(crate::source::file_ffmpeg::FfmpegFileSource::open(config)?)
            }
            #[cfg(not(feature = "video-ffmpeg"))]
            {
                return Err(anyhow!(
                    "reading video files requires the video-ffmpeg feature"
                ));
            }
        };
        Ok(Self {
            backend,
            frame_limit,
            frames_read: 0,
        })
    }

    /// Stream properties detected at open time.
    pub fn video_info(&self) -> VideoInfo {
        let mut info = match &self.backend {
            FileBackend::Synthetic(source) => source.video_info(),
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.video_info(),
        };
        if let Some(limit) = self.frame_limit {
            info.total_frames = Some(match info.total_frames {
                Some(total) => total.min(limit),
                None => limit,
            });
        }
        info
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(limit) = self.frame_limit {
            if self.frames_read >= limit {
                return Ok(None);
            }
        }
        let frame = match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "video-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame()?,
        };
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and featureless builds
// ----------------------------------------------------------------------------

const SYNTHETIC_WIDTH: u32 = 1280;
const SYNTHETIC_HEIGHT: u32 = 720;
const SYNTHETIC_FPS: u32 = 30;
const SYNTHETIC_CLIP_FRAMES: u64 = 90;

struct SyntheticFileSource {
    total_frames: u64,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Self {
        let total_frames = if config.path == "stub://empty" {
            0
        } else {
            SYNTHETIC_CLIP_FRAMES
        };
        log::info!("FileSource: opened {} (synthetic)", config.path);
        Self {
            total_frames,
            frame_count: 0,
        }
    }

    fn video_info(&self) -> VideoInfo {
        VideoInfo {
            width: SYNTHETIC_WIDTH,
            height: SYNTHETIC_HEIGHT,
            fps: SYNTHETIC_FPS,
            total_frames: Some(self.total_frames),
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.frame_count >= self.total_frames {
            return None;
        }
        self.frame_count += 1;
        Some(self.generate_synthetic_frame())
    }

    /// Deterministic split-layout clip: both halves' green channels vary
    /// with position and frame index, so two sources opened with the same
    /// path produce byte-identical sequences.
    fn generate_synthetic_frame(&self) -> Frame {
        let width = SYNTHETIC_WIDTH as u64;
        let height = SYNTHETIC_HEIGHT as u64;
        let index = self.frame_count;
        let mut pixels = vec![0u8; (width * height * 3) as usize];
        for y in 0..height {
            for x in 0..width {
                let green = (x / 5 + y / 4 + 3 * index) % 251;
                let offset = ((y * width + x) * 3) as usize;
                pixels[offset] = (x % 256) as u8;
                pixels[offset + 1] = green as u8;
                pixels[offset + 2] = (y % 256) as u8;
            }
        }
        Frame::new(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT)
            .expect("synthetic buffer length matches its dimensions")
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

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_source_reports_clip_info() -> Result<()> {
        let source = FileSource::open(FileConfig {
            path: "stub://clip".to_string(),
            frame_limit: None,
        })?;
        let info = source.video_info();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.fps, 30);
        assert_eq!(info.total_frames, Some(90));
        Ok(())
    }

    #[test]
    fn frame_limit_caps_stream_and_total() -> Result<()> {
        let mut source = FileSource::open(FileConfig {
            path: "stub://clip".to_string(),
            frame_limit: Some(10),
        })?;
        assert_eq!(source.video_info().total_frames, Some(10));

        let mut count = 0;
        while let Some(_frame) = source.next_frame()? {
            count += 1;
        }
        assert_eq!(count, 10);
        Ok(())
    }

    #[test]
    fn empty_stub_yields_no_frames() -> Result<()> {
        let mut source = FileSource::open(FileConfig {
            path: "stub://empty".to_string(),
            frame_limit: None,
        })?;
        assert_eq!(source.video_info().total_frames, Some(0));
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn identical_stub_sources_produce_identical_frames() -> Result<()> {
        let config = FileConfig {
            path: "stub://clip".to_string(),
            frame_limit: Some(3),
        };
        let mut a = FileSource::open(config.clone())?;
        let mut b = FileSource::open(config)?;
        while let Some(frame_a) = a.next_frame()? {
            let frame_b = b.next_frame()?.expect("same length");
            assert_eq!(frame_a.data(), frame_b.data());
        }
        assert!(b.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn url_schemes_are_rejected() {
        let result = FileSource::open(FileConfig {
            path: "http://example.com/clip.mp4".to_string(),
            frame_limit: None,
        });
        assert!(result.is_err());
    }
}
