//! splitgray - high-bit-depth grayscale reconstruction from split video frames
//!
//! The capture hardware this crate serves emits a wide BGR frame whose green
//! channel carries one 16-bit grayscale sample per output pixel, split across
//! two side-by-side 8-bit halves: the left half holds the low byte, the right
//! half the high byte. The pipeline reassembles each sample, keeps the high
//! byte, inverts it, and emits a three-channel grayscale frame of half the
//! input width.
//!
//! # Module structure
//!
//! - `frame`: packed BGR24 frame container
//! - `reconstruct`: the split-frame transform (pure, stateless)
//! - `source`: frame inputs (V4L2 cameras, video files, synthetic stubs)
//! - `sink`: frame outputs (video writer, JPEG preview, test sinks)
//! - `session`: processing-session state machine, worker thread, progress
//! - `ui`: terminal progress reporting
//!
//! Two binaries sit on top: `live` (camera preview loop) and
//! `videofile_processor` (file-to-file conversion).

pub mod frame;
pub mod reconstruct;
pub mod session;
pub mod sink;
pub mod source;
pub mod ui;

pub use frame::Frame;
pub use reconstruct::{reconstruct, DimensionError, LEFT_WIDTH, MIN_INPUT_WIDTH};
pub use session::{
    run_job, JobConfig, JobSummary, ProgressEvent, Session, SessionError, SessionState,
};
pub use sink::{CollectSink, FrameSink, NullSink, OutputFormat};
#[cfg(feature = "preview-jpeg")]
pub use sink::PreviewSink;
#[cfg(feature = "video-ffmpeg")]
pub use sink::VideoWriter;
pub use source::{
    list_available_cameras, CameraConfig, CameraSource, FileConfig, FileSource, FrameSource,
    VideoInfo,
};
