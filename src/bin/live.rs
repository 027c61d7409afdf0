//! live - camera capture and reconstruction preview
//!
//! Lists the available cameras, lets the user pick one by number, then runs
//! the capture/reconstruct loop until Ctrl-C. Frames that are too narrow to
//! carry both halves are passed through unchanged with a warning, so an
//! accidentally misconfigured camera still shows something.

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use splitgray::sink::FrameSink;
use splitgray::ui::{Ui, UiMode};
use splitgray::{
    list_available_cameras, reconstruct, CameraConfig, CameraSource, DimensionError, SessionError,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera device path (e.g. /dev/video0) or stub://... for a synthetic
    /// camera. Skips the interactive picker.
    #[arg(long)]
    device: Option<String>,
    /// Requested capture width.
    #[arg(long, default_value_t = 1280)]
    width: u32,
    /// Requested capture height.
    #[arg(long, default_value_t = 720)]
    height: u32,
    /// Requested capture frame rate.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Probe at most this many camera indices.
    #[arg(long, default_value_t = 10)]
    max_cameras: usize,
    /// Write the latest reconstructed frame to this JPEG path
    /// (requires the preview-jpeg feature).
    #[arg(long)]
    preview: Option<PathBuf>,
    /// Refresh the preview snapshot every Nth frame.
    #[arg(long, default_value_t = 10)]
    preview_every: u64,
    /// Progress output: auto, plain, or pretty.
    #[arg(long, default_value = "auto")]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let device = match &args.device {
        Some(device) => device.clone(),
        None => select_camera(args.max_cameras)?,
    };

    let mut source = CameraSource::new(CameraConfig {
        device: device.clone(),
        width: args.width,
        height: args.height,
        target_fps: args.fps,
    })
    .map_err(|err| SessionError::CameraOpenFailure(format!("{err:#}")))?;
    source
        .connect()
        .map_err(|err| SessionError::CameraOpenFailure(format!("{err:#}")))?;

    let mut preview = open_preview(&args)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        })
        .context("set Ctrl-C handler")?;
    }

    let ui = Ui::new(args.ui, std::io::stderr().is_terminal());
    let status = ui.live_status();
    println!("Capturing from {device}. Press Ctrl-C to stop.");

    let started = Instant::now();
    let mut frames = 0u64;
    let mut last_warned_width: Option<u32> = None;

    while !stop.load(Ordering::Relaxed) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                eprintln!("Error: failed to read frame: {err:#}");
                break;
            }
        };

        let processed = match reconstruct(&frame) {
            Ok(processed) => {
                last_warned_width = None;
                processed
            }
            Err(err @ DimensionError { width }) => {
                if last_warned_width != Some(width) {
                    log::warn!("{err}; passing the input frame through unchanged");
                    last_warned_width = Some(width);
                }
                frame.clone()
            }
        };

        if let Some(sink) = preview.as_mut() {
            sink.write_frame(&processed)?;
        }

        frames += 1;
        let elapsed = started.elapsed().as_secs_f64();
        let measured_fps = if elapsed > 0.0 {
            frames as f64 / elapsed
        } else {
            0.0
        };
        status.update(format!(
            "{frames} frames, {measured_fps:.1} fps, {}x{} -> {}x{}",
            frame.width(),
            frame.height(),
            processed.width(),
            processed.height()
        ));
    }

    status.finish(&format!("Stopped after {frames} frames."));
    // Dropping the source releases the device handle on every exit path.
    Ok(())
}

/// Interactive camera picker: list devices, read a number, re-prompt until
/// the input names an available camera.
fn select_camera(max_cameras: usize) -> Result<String> {
    let cameras = list_available_cameras(max_cameras);
    if cameras.is_empty() {
        return Err(SessionError::NoCameraAvailable.into());
    }

    println!("Available cameras:");
    for index in &cameras {
        println!("[{index}] Camera {index}");
    }

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("Select camera number: ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // stdin closed; nothing left to prompt.
            return Err(SessionError::NoCameraAvailable.into());
        }
        match parse_camera_choice(&line, &cameras) {
            Some(index) => return Ok(format!("/dev/video{index}")),
            None => println!("Invalid choice. Try again."),
        }
    }
}

/// Accepts the input only if it parses as an index in the available list.
fn parse_camera_choice(input: &str, cameras: &[usize]) -> Option<usize> {
    let index: usize = input.trim().parse().ok()?;
    cameras.contains(&index).then_some(index)
}

#[cfg(feature = "preview-jpeg")]
fn open_preview(args: &Args) -> Result<Option<Box<dyn FrameSink>>> {
    Ok(args.preview.clone().map(|path| {
        Box::new(splitgray::PreviewSink::new(path, args.preview_every)) as Box<dyn FrameSink>
    }))
}

#[cfg(not(feature = "preview-jpeg"))]
fn open_preview(args: &Args) -> Result<Option<Box<dyn FrameSink>>> {
    if args.preview.is_some() {
        anyhow::bail!("preview snapshots require the preview-jpeg feature");
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::parse_camera_choice;

    #[test]
    fn accepts_only_listed_cameras() {
        let cameras = vec![0, 2];
        assert_eq!(parse_camera_choice("0\n", &cameras), Some(0));
        assert_eq!(parse_camera_choice(" 2 ", &cameras), Some(2));
        assert_eq!(parse_camera_choice("1\n", &cameras), None);
        assert_eq!(parse_camera_choice("camera", &cameras), None);
        assert_eq!(parse_camera_choice("", &cameras), None);
    }
}
