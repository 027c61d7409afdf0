//! Frame sinks.
//!
//! Sinks consume reconstructed frames:
//! - `VideoWriter` appends them to an output container (feature: video-ffmpeg)
//! - `PreviewSink` keeps a watchable JPEG snapshot fresh (feature: preview-jpeg)
//! - `CollectSink` / `NullSink` back the tests and featureless builds
//!
//! `finish` finalizes the output (container trailer, last snapshot). Dropping
//! a sink without calling it still releases OS handles, so error and cancel
//! paths never leak; only a clean finalize is skipped.

#[cfg(feature = "preview-jpeg")]
pub mod preview;
#[cfg(feature = "video-ffmpeg")]
pub mod video_ffmpeg;

#[cfg(feature = "preview-jpeg")]
pub use preview::PreviewSink;
#[cfg(feature = "video-ffmpeg")]
pub use video_ffmpeg::VideoWriter;

use anyhow::Result;

use crate::frame::Frame;

/// Geometry and rate of an output stream, derived from the first
/// reconstructed frame and the detected input frame rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// A blocking consumer of frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Finalize the output. Called once, after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink that keeps every frame in memory, in arrival order. Test double for
/// the video writer.
#[derive(Default)]
pub struct CollectSink {
    pub frames: Vec<Frame>,
    pub finished: bool,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for CollectSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Sink that counts frames and discards them.
#[derive(Default)]
pub struct NullSink {
    pub frames_written: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for NullSink {
    fn write_frame(&mut self, _frame: &Frame) -> Result<()> {
        self.frames_written += 1;
        Ok(())
    }
}
