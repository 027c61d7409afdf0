//! Processing session state machine.
//!
//! A session owns one file-to-file processing job:
//!
//! ```text
//! Idle -> Configured -> Processing -> Idle
//!                            \-> Failed -> (configure) -> Configured
//! ```
//!
//! `run_job` is the synchronous pipeline body (read, reconstruct, write,
//! repeat); `Session` runs it on a worker thread and reports progress over
//! an mpsc channel so the calling thread stays responsive to a cancel
//! request between frames. Cancellation is cooperative: the flag is checked
//! once per loop iteration, in-flight reads and writes are not interrupted.
//!
//! Source and sink handles are released on every exit path. The sink is
//! only created after the first frame has been read and transformed, so a
//! job that fails on its first read never creates an output file.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;
use thiserror::Error;

use crate::reconstruct::{reconstruct, DimensionError};
use crate::sink::{FrameSink, OutputFormat};
use crate::source::FrameSource;

/// Input and output paths for one processing job.
#[derive(Clone, Debug)]
pub struct JobConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Everything that can end a session abnormally, surfaced to the user as a
/// single message at the point of occurrence.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no capture devices available")]
    NoCameraAvailable,
    #[error("failed to open camera: {0}")]
    CameraOpenFailure(String),
    #[error("failed to open input file: {0}")]
    InputOpenFailure(String),
    #[error("failed to read the first frame from the input")]
    FirstFrameReadFailure,
    #[error("failed to open the output writer: {0}")]
    OutputWriterOpenFailure(String),
    #[error(transparent)]
    Dimension(#[from] DimensionError),
    #[error("failed to read frame {frame}: {message}")]
    FrameReadFailure { frame: u64, message: String },
    #[error("failed to write frame {frame}: {message}")]
    FrameWriteFailure { frame: u64, message: String },
    #[error("failed to finalize the output after {frames} frames: {message}")]
    OutputFinalizeFailure { frames: u64, message: String },
    #[error("session has no configured job")]
    NotConfigured,
    #[error("a processing job is already running")]
    Busy,
    #[error("processing worker panicked")]
    WorkerPanicked,
}

/// Progress reports from the worker to the UI thread.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    Started {
        output: OutputFormat,
        total_frames: Option<u64>,
    },
    Frame {
        done: u64,
        total: Option<u64>,
    },
}

/// Result of a completed job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobSummary {
    pub frames: u64,
    pub cancelled: bool,
}

/// Run one processing job to completion.
///
/// Reads the first frame and transforms it before invoking `sink_factory`,
/// matching the output-writer setup order of the capture tools: a source
/// that yields nothing, or a first frame that fails the dimension check,
/// never creates an output file.
pub fn run_job(
    source: &mut dyn FrameSource,
    fps: u32,
    total_frames: Option<u64>,
    sink_factory: impl FnOnce(OutputFormat) -> Result<Box<dyn FrameSink>>,
    events: &Sender<ProgressEvent>,
    cancel: &AtomicBool,
) -> Result<JobSummary, SessionError> {
    let first = source
        .next_frame()
        .map_err(|err| {
            log::warn!("first frame read failed: {err:#}");
            SessionError::FirstFrameReadFailure
        })?
        .ok_or(SessionError::FirstFrameReadFailure)?;

    let processed = reconstruct(&first)?;
    let output = OutputFormat {
        width: processed.width(),
        height: processed.height(),
        fps,
    };
    log::info!(
        "input {}x{} -> output {}x{} @ {} fps",
        first.width(),
        first.height(),
        output.width,
        output.height,
        output.fps
    );

    let mut sink = sink_factory(output)
        .map_err(|err| SessionError::OutputWriterOpenFailure(format!("{err:#}")))?;
    sink.write_frame(&processed)
        .map_err(|err| SessionError::FrameWriteFailure {
            frame: 1,
            message: format!("{err:#}"),
        })?;

    let mut frames = 1u64;
    let _ = events.send(ProgressEvent::Started {
        output,
        total_frames,
    });
    let _ = events.send(ProgressEvent::Frame {
        done: frames,
        total: total_frames,
    });

    let mut cancelled = false;
    loop {
        if cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                return Err(SessionError::FrameReadFailure {
                    frame: frames + 1,
                    message: format!("{err:#}"),
                })
            }
        };
        let processed = reconstruct(&frame)?;
        sink.write_frame(&processed)
            .map_err(|err| SessionError::FrameWriteFailure {
                frame: frames + 1,
                message: format!("{err:#}"),
            })?;
        frames += 1;
        let _ = events.send(ProgressEvent::Frame {
            done: frames,
            total: total_frames,
        });
    }

    sink.finish()
        .map_err(|err| SessionError::OutputFinalizeFailure {
            frames,
            message: format!("{err:#}"),
        })?;
    log::info!(
        "processed {} frames{}",
        frames,
        if cancelled { " (cancelled)" } else { "" }
    );
    Ok(JobSummary { frames, cancelled })
}

/// Session lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Configured,
    Processing,
    Failed,
}

type WorkerResult = Result<JobSummary, SessionError>;

/// One processing session: explicit state, a cancel flag shared with the
/// worker, and a progress channel drained by `poll`.
pub struct Session {
    state: SessionState,
    config: Option<JobConfig>,
    cancel: Arc<AtomicBool>,
    events: Option<Receiver<ProgressEvent>>,
    worker: Option<JoinHandle<WorkerResult>>,
    result: Option<WorkerResult>,
    frames_done: u64,
    total_frames: Option<u64>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            config: None,
            cancel: Arc::new(AtomicBool::new(false)),
            events: None,
            worker: None,
            result: None,
            frames_done: 0,
            total_frames: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> Option<&JobConfig> {
        self.config.as_ref()
    }

    /// Fraction of the job completed, when the total is known.
    pub fn progress(&self) -> Option<f64> {
        let total = self.total_frames?;
        if total == 0 {
            return None;
        }
        Some(self.frames_done as f64 / total as f64)
    }

    /// Set (or replace) the job paths. Allowed in any state except
    /// `Processing`, mirroring the disabled file pickers while a job runs.
    pub fn configure(&mut self, config: JobConfig) -> Result<(), SessionError> {
        if self.state == SessionState::Processing {
            return Err(SessionError::Busy);
        }
        self.config = Some(config);
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Spawn the worker thread for the configured job.
    ///
    /// The `job` closure receives the shared cancel flag and the progress
    /// sender and runs on the worker thread; it typically opens the source
    /// and calls [`run_job`]. Keeping the closure at this seam lets tests
    /// drive the state machine without any real I/O.
    pub fn start<J>(&mut self, job: J) -> Result<(), SessionError>
    where
        J: FnOnce(&JobConfig, Arc<AtomicBool>, Sender<ProgressEvent>) -> WorkerResult
            + Send
            + 'static,
    {
        match self.state {
            SessionState::Configured | SessionState::Failed => {}
            SessionState::Processing => return Err(SessionError::Busy),
            SessionState::Idle => return Err(SessionError::NotConfigured),
        }
        let config = self.config.clone().ok_or(SessionError::NotConfigured)?;

        let (tx, rx) = std::sync::mpsc::channel();
        // Reuse the shared flag so handles given out before start (e.g. a
        // Ctrl-C handler) stay wired to the running job.
        self.cancel.store(false, Ordering::Relaxed);
        let cancel = self.cancel.clone();
        self.events = Some(rx);
        self.result = None;
        self.frames_done = 0;
        self.total_frames = None;
        self.worker = Some(std::thread::spawn(move || job(&config, cancel, tx)));
        self.state = SessionState::Processing;
        Ok(())
    }

    /// Shared cancel flag, usable from a Ctrl-C handler.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Request cooperative cancellation; the worker stops between frames.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_processing(&self) -> bool {
        self.state == SessionState::Processing
    }

    /// Drain pending progress events and, if the worker has exited, join it
    /// and transition out of `Processing`. The job paths are cleared on
    /// completion, like the file pickers resetting after a run.
    pub fn poll(&mut self) -> Vec<ProgressEvent> {
        let mut drained = self.drain_events();

        let finished = self
            .worker
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(false);
        if finished {
            if let Some(handle) = self.worker.take() {
                let result = handle.join().unwrap_or(Err(SessionError::WorkerPanicked));
                // The worker may have sent more events between the drain
                // above and its exit; pick them up before the receiver is
                // dropped.
                drained.extend(self.drain_events());
                self.state = if result.is_ok() {
                    SessionState::Idle
                } else {
                    SessionState::Failed
                };
                self.result = Some(result);
                self.config = None;
                self.events = None;
            }
        }
        drained
    }

    fn drain_events(&mut self) -> Vec<ProgressEvent> {
        let mut drained = Vec::new();
        if let Some(events) = &self.events {
            loop {
                match events.try_recv() {
                    Ok(event) => {
                        if let ProgressEvent::Frame { done, total } = &event {
                            self.frames_done = *done;
                            self.total_frames = *total;
                        }
                        if let ProgressEvent::Started { total_frames, .. } = &event {
                            self.total_frames = *total_frames;
                        }
                        drained.push(event);
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }
        drained
    }

    /// Block until the worker exits, then return its result.
    pub fn wait(&mut self) -> Result<WorkerResult, SessionError> {
        if let Some(handle) = self.worker.take() {
            let result = handle.join().unwrap_or(Err(SessionError::WorkerPanicked));
            // Keep the progress counters accurate for the final report.
            let _ = self.drain_events();
            self.state = if result.is_ok() {
                SessionState::Idle
            } else {
                SessionState::Failed
            };
            self.result = Some(result);
            self.config = None;
            self.events = None;
        }
        self.result.take().ok_or(SessionError::NotConfigured)
    }

    /// The finished job's result, if one has completed since the last call.
    pub fn take_result(&mut self) -> Option<WorkerResult> {
        self.result.take()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> JobConfig {
        JobConfig {
            input: PathBuf::from("stub://clip"),
            output: PathBuf::from("stub://out"),
        }
    }

    #[test]
    fn starts_only_when_configured() {
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);

        let err = session
            .start(|_, _, _| Ok(JobSummary { frames: 0, cancelled: false }))
            .unwrap_err();
        assert!(matches!(err, SessionError::NotConfigured));

        session.configure(config()).unwrap();
        assert_eq!(session.state(), SessionState::Configured);
    }

    #[test]
    fn completed_job_returns_to_idle_and_clears_config() {
        let mut session = Session::new();
        session.configure(config()).unwrap();
        session
            .start(|_, _, _| Ok(JobSummary { frames: 7, cancelled: false }))
            .unwrap();
        assert!(session.is_processing());

        let result = session.wait().unwrap().unwrap();
        assert_eq!(result.frames, 7);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.config().is_none());
    }

    #[test]
    fn failed_job_transitions_to_failed() {
        let mut session = Session::new();
        session.configure(config()).unwrap();
        session
            .start(|_, _, _| Err(SessionError::FirstFrameReadFailure))
            .unwrap();

        let result = session.wait().unwrap();
        assert!(matches!(result, Err(SessionError::FirstFrameReadFailure)));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn cancel_reaches_the_worker() {
        let mut session = Session::new();
        session.configure(config()).unwrap();
        session
            .start(|_, cancel, _| {
                // Spin until the main thread requests cancellation.
                while !cancel.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Ok(JobSummary { frames: 3, cancelled: true })
            })
            .unwrap();

        session.cancel();
        let result = session.wait().unwrap().unwrap();
        assert!(result.cancelled);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn poll_tracks_progress_events() {
        let mut session = Session::new();
        session.configure(config()).unwrap();
        session
            .start(|_, _, events| {
                for done in 1..=4 {
                    let _ = events.send(ProgressEvent::Frame {
                        done,
                        total: Some(4),
                    });
                }
                Ok(JobSummary { frames: 4, cancelled: false })
            })
            .unwrap();

        // Worker is short-lived; wait for it, then drain.
        while session.is_processing() {
            session.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(session.progress(), Some(1.0));
        assert_eq!(session.take_result().unwrap().unwrap().frames, 4);
    }

    #[test]
    fn poll_delivers_every_event_when_the_worker_exits() {
        // A short-lived worker often finishes between a drain and the
        // is_finished check; no event may be dropped with the receiver.
        for _ in 0..200 {
            let mut session = Session::new();
            session.configure(config()).unwrap();
            session
                .start(|_, _, events| {
                    for done in 1..=4 {
                        let _ = events.send(ProgressEvent::Frame {
                            done,
                            total: Some(4),
                        });
                    }
                    Ok(JobSummary { frames: 4, cancelled: false })
                })
                .unwrap();

            let mut frame_events = 0;
            while session.is_processing() {
                frame_events += session
                    .poll()
                    .iter()
                    .filter(|event| matches!(event, ProgressEvent::Frame { .. }))
                    .count();
            }
            assert_eq!(frame_events, 4);
            assert_eq!(session.progress(), Some(1.0));
            session.take_result().unwrap().unwrap();
        }
    }
}
