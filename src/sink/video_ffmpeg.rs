//! FFmpeg-backed video file writer.
//!
//! Encodes frames as MPEG-4 video in a container chosen from the output
//! path's extension, at the detected input frame rate. This mirrors the
//! `mp4v` writer the capture tools have always produced.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use ffmpeg_next as ffmpeg;

use crate::frame::Frame;
use crate::sink::{FrameSink, OutputFormat};

pub struct VideoWriter {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::codec::encoder::video::Encoder,
    scaler: ffmpeg::software::scaling::Context,
    format: OutputFormat,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    pts: i64,
    finished: bool,
}

impl VideoWriter {
    /// Create the output file and write the container header.
    pub fn create(path: &Path, format: OutputFormat) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;

        if format.width == 0 || format.height == 0 {
            bail!("output geometry must be non-zero");
        }
        let fps = format.fps.max(1) as i32;

        let mut octx = ffmpeg::format::output(&path)
            .with_context(|| format!("failed to create output file '{}'", path.display()))?;
        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| anyhow!("MPEG-4 encoder not available"))?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

        let encoder_time_base = ffmpeg::Rational(1, fps);
        let encoder = {
            let mut ost = octx.add_stream(codec).context("add video stream")?;
            let mut encoder = ffmpeg::codec::context::Context::from_parameters(ost.parameters())
                .context("create encoder context")?
                .encoder()
                .video()
                .context("create video encoder")?;
            encoder.set_width(format.width);
            encoder.set_height(format.height);
            encoder.set_format(ffmpeg::util::format::pixel::Pixel::YUV420P);
            encoder.set_time_base(encoder_time_base);
            encoder.set_frame_rate(Some(ffmpeg::Rational(fps, 1)));
            if global_header {
                encoder.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
            }
            let encoder = encoder.open_as(codec).context("open MPEG-4 encoder")?;
            ost.set_parameters(&encoder);
            ost.set_time_base(encoder_time_base);
            encoder
        };

        octx.write_header().context("write container header")?;
        // The muxer may adjust the stream time base while writing the header.
        let stream_time_base = octx
            .stream(0)
            .map(|s| s.time_base())
            .unwrap_or(encoder_time_base);

        let scaler = ffmpeg::software::scaling::context::Context::get(
            ffmpeg::util::format::pixel::Pixel::BGR24,
            format.width,
            format.height,
            ffmpeg::util::format::pixel::Pixel::YUV420P,
            format.width,
            format.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "VideoWriter: writing {} ({}x{} @ {} fps)",
            path.display(),
            format.width,
            format.height,
            fps
        );

        Ok(Self {
            octx,
            encoder,
            scaler,
            format,
            encoder_time_base,
            stream_time_base,
            pts: 0,
            finished: false,
        })
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.octx)
                .context("write packet to container")?;
        }
        Ok(())
    }
}

impl FrameSink for VideoWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            bail!("video writer already finalized");
        }
        if frame.width() != self.format.width || frame.height() != self.format.height {
            bail!(
                "frame geometry {}x{} does not match the output stream {}x{}",
                frame.width(),
                frame.height(),
                self.format.width,
                self.format.height
            );
        }

        let mut bgr = ffmpeg::frame::Video::new(
            ffmpeg::util::format::pixel::Pixel::BGR24,
            self.format.width,
            self.format.height,
        );
        let stride = bgr.stride(0);
        let row_len = self.format.width as usize * 3;
        let data = bgr.data_mut(0);
        for y in 0..self.format.height as usize {
            data[y * stride..y * stride + row_len]
                .copy_from_slice(&frame.data()[y * row_len..(y + 1) * row_len]);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&bgr, &mut yuv)
            .context("scale frame to YUV")?;
        yuv.set_pts(Some(self.pts));
        self.pts += 1;

        self.encoder
            .send_frame(&yuv)
            .context("send frame to encoder")?;
        self.drain_packets()
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let _ = self.encoder.send_eof();
        self.drain_packets()?;
        self.octx.write_trailer().context("write container trailer")
    }
}
