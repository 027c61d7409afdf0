//! Terminal progress reporting.
//!
//! Pretty output (indicatif bars/spinners) is used on a TTY unless the user
//! forces plain mode; plain mode prints occasional lines instead, so logs
//! piped to a file stay readable.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl std::str::FromStr for UiMode {
    type Err = String;

    /// Strict: an unrecognized value is an error, not a fallback to auto,
    /// so a typo on the command line is rejected instead of masked.
    fn from_str(flag: &str) -> Result<Self, Self::Err> {
        match flag {
            "auto" => Ok(UiMode::Auto),
            "plain" => Ok(UiMode::Plain),
            "pretty" => Ok(UiMode::Pretty),
            other => Err(format!(
                "unknown ui mode '{other}' (expected auto, plain, or pretty)"
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    fn use_pretty(&self) -> bool {
        match self.mode {
            UiMode::Pretty => true,
            UiMode::Plain => false,
            UiMode::Auto => self.is_tty,
        }
    }

    /// Percent bar over a known frame total, or a counting spinner when the
    /// container does not report one.
    pub fn job_progress(&self, total_frames: Option<u64>) -> JobProgress {
        if self.use_pretty() {
            let bar = match total_frames {
                Some(total) => {
                    let bar = ProgressBar::new(total);
                    bar.set_style(
                        ProgressStyle::with_template(
                            "{bar:40} {pos}/{len} frames ({percent}%) {msg}",
                        )
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                    );
                    bar
                }
                None => {
                    let bar = ProgressBar::new_spinner();
                    bar.set_style(
                        ProgressStyle::with_template("{spinner} {pos} frames {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                    );
                    bar
                }
            };
            bar.set_draw_target(ProgressDrawTarget::stderr());
            JobProgress {
                bar: Some(bar),
                total_frames,
                last_plain: 0,
            }
        } else {
            JobProgress {
                bar: None,
                total_frames,
                last_plain: 0,
            }
        }
    }

    /// Ticking status line for the live capture loop.
    pub fn live_status(&self) -> LiveStatus {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            LiveStatus {
                spinner: Some(spinner),
            }
        } else {
            LiveStatus { spinner: None }
        }
    }
}

pub struct JobProgress {
    bar: Option<ProgressBar>,
    total_frames: Option<u64>,
    last_plain: u64,
}

impl JobProgress {
    const PLAIN_STEP: u64 = 100;

    pub fn update(&mut self, done: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(done);
        } else if done >= self.last_plain + Self::PLAIN_STEP {
            self.last_plain = done;
            match self.total_frames {
                Some(total) => eprintln!("processed {done}/{total} frames"),
                None => eprintln!("processed {done} frames"),
            }
        }
    }

    pub fn finish(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        } else {
            eprintln!("{message}");
        }
    }

    pub fn abandon(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.abandon_with_message(message.to_string());
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct LiveStatus {
    spinner: Option<ProgressBar>,
}

impl LiveStatus {
    pub fn update(&self, message: String) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(message);
        }
        // Plain mode stays quiet; the capture loop logs its own summary.
    }

    pub fn finish(&self, message: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message.to_string());
        } else {
            eprintln!("{message}");
        }
    }
}
