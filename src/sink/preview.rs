//! JPEG preview snapshot sink.
//!
//! Writes every Nth frame to a fixed JPEG path so a file watcher or image
//! viewer can follow the live output. The snapshot is written to a temporary
//! file and renamed into place so readers never observe a half-written image.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::frame::Frame;
use crate::sink::FrameSink;

pub struct PreviewSink {
    path: PathBuf,
    every: u64,
    frames_seen: u64,
}

impl PreviewSink {
    /// Snapshot `path` is overwritten with every `every`-th frame, starting
    /// with the first.
    pub fn new(path: PathBuf, every: u64) -> Self {
        Self {
            path,
            every: every.max(1),
            frames_seen: 0,
        }
    }

    fn write_snapshot(&self, frame: &Frame) -> Result<()> {
        // BGR -> RGB for the image crate.
        let mut rgb = Vec::with_capacity(frame.data().len());
        for pixel in frame.data().chunks_exact(3) {
            rgb.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
        }
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), rgb)
            .context("preview buffer length mismatch")?;

        let tmp = self.path.with_extension("tmp");
        img.save_with_format(&tmp, image::ImageFormat::Jpeg)
            .with_context(|| format!("write preview snapshot {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("publish preview snapshot {}", self.path.display()))?;
        Ok(())
    }
}

impl FrameSink for PreviewSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let due = self.frames_seen % self.every == 0;
        self.frames_seen += 1;
        if due {
            self.write_snapshot(frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_first_and_every_nth_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("preview.jpg");
        let mut sink = PreviewSink::new(path.clone(), 3);

        let frame = Frame::from_gray(&vec![128u8; 16 * 8], 16, 8);
        sink.write_frame(&frame)?;
        assert!(path.exists());

        fs::remove_file(&path)?;
        sink.write_frame(&frame)?;
        sink.write_frame(&frame)?;
        assert!(!path.exists());

        sink.write_frame(&frame)?;
        assert!(path.exists());
        Ok(())
    }
}
