//! Frame sources.
//!
//! This module provides the inputs to the reconstruction pipeline:
//! - Live cameras via V4L2 (feature: capture-v4l2)
//! - Local video files via FFmpeg (feature: video-ffmpeg)
//! - Synthetic sources for `stub://` devices/paths (always available, used
//!   by tests and featureless builds)
//!
//! All sources produce packed BGR24 [`Frame`]s. Conversion from the native
//! capture format happens inside the source, so the rest of the pipeline
//! never sees device pixel formats.

pub mod camera;
pub mod file;
#[cfg(feature = "video-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "capture-v4l2")]
mod normalize;

pub use camera::{list_available_cameras, CameraConfig, CameraSource};
pub use file::{FileConfig, FileSource, VideoInfo};

use anyhow::Result;

use crate::frame::Frame;

/// A blocking sequence of frames.
///
/// `Ok(None)` is normal end-of-stream; `Err` is a read failure. Live cameras
/// never return `Ok(None)`.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
