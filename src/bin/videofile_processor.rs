//! videofile_processor - convert a split-frame video file
//!
//! Opens the input file, reconstructs every frame, and writes the result to
//! the output path at the detected input frame rate. Progress is reported as
//! a percent bar when the container knows its frame count. Ctrl-C cancels
//! cooperatively between frames; whatever was already written is finalized.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use splitgray::sink::{FrameSink, NullSink, OutputFormat};
use splitgray::ui::{JobProgress, Ui, UiMode};
use splitgray::{
    run_job, FileConfig, FileSource, JobConfig, ProgressEvent, Session, SessionError,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input video file (or stub://... for a synthetic clip).
    #[arg(short, long)]
    input: PathBuf,
    /// Output video file (or stub://... to discard frames).
    #[arg(short, long)]
    output: PathBuf,
    /// Process at most this many frames.
    #[arg(long)]
    frame_limit: Option<u64>,
    /// Progress output: auto, plain, or pretty.
    #[arg(long, default_value = "auto")]
    ui: UiMode,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => {}
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<()> {
    let ui = Ui::new(args.ui, std::io::stderr().is_terminal());

    let mut session = Session::new();
    session.configure(JobConfig {
        input: args.input.clone(),
        output: args.output.clone(),
    })?;

    let cancel = session.cancel_handle();
    ctrlc::set_handler(move || {
        cancel.store(true, std::sync::atomic::Ordering::Relaxed);
    })
    .map_err(|err| anyhow::anyhow!("set Ctrl-C handler: {err}"))?;

    let frame_limit = args.frame_limit;
    session.start(move |config, cancel, events| {
        let mut source = FileSource::open(FileConfig {
            path: config.input.to_string_lossy().into_owned(),
            frame_limit,
        })
        .map_err(|err| SessionError::InputOpenFailure(format!("{err:#}")))?;
        let info = source.video_info();
        let output = config.output.clone();
        run_job(
            &mut source,
            info.fps,
            info.total_frames,
            move |format| create_sink(&output, format),
            &events,
            &cancel,
        )
    })?;

    // Drive the progress display from the worker's events; the poll loop is
    // what keeps this thread free to notice Ctrl-C between frames.
    let mut progress: Option<JobProgress> = None;
    while session.is_processing() {
        for event in session.poll() {
            match event {
                ProgressEvent::Started { total_frames, .. } => {
                    progress = Some(ui.job_progress(total_frames));
                }
                ProgressEvent::Frame { done, .. } => {
                    if let Some(progress) = progress.as_mut() {
                        progress.update(done);
                    }
                }
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    match session.take_result() {
        Some(Ok(summary)) => {
            let message = if summary.cancelled {
                format!("Processing cancelled after {} frames.", summary.frames)
            } else {
                format!("File processed successfully ({} frames).", summary.frames)
            };
            match &progress {
                Some(progress) if summary.cancelled => progress.abandon(&message),
                Some(progress) => progress.finish(&message),
                None => println!("{message}"),
            }
            Ok(())
        }
        Some(Err(err)) => {
            if let Some(progress) = &progress {
                progress.abandon("Processing failed.");
            }
            Err(err.into())
        }
        None => Err(SessionError::NotConfigured.into()),
    }
}

fn create_sink(path: &Path, format: OutputFormat) -> Result<Box<dyn FrameSink>> {
    if path.to_string_lossy().starts_with("stub://") {
        return Ok(Box::new(NullSink::new()));
    }
    #[cfg(feature = "video-ffmpeg")]
    {
        Ok(Box::new(splitgray::VideoWriter::create(path, format)?))
    }
    #[cfg(not(feature = "video-ffmpeg"))]
    {
        let _ = format;
        anyhow::bail!("writing video files requires the video-ffmpeg feature")
    }
}
