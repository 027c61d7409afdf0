//! FFmpeg-backed video file decoder.
//!
//! Decodes the best video stream of a local file, scaled to packed BGR24.
//! Stream geometry, frame rate, and total frame count are captured at open
//! time for writer setup and progress totals.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use crate::frame::Frame;
use crate::source::file::{FileConfig, VideoInfo};

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    info: VideoInfo,
    frame_count: u64,
    sent_eof: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open video file '{}'", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();

        let rate = input_stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            (rate.numerator() as f64 / rate.denominator() as f64).round() as u32
        } else {
            0
        };
        let reported_frames = input_stream.frames();
        let total_frames = if reported_frames > 0 {
            Some(reported_frames as u64)
        } else {
            None
        };

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::BGR24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let info = VideoInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames,
        };
        log::info!(
            "FileSource: opened {} ({}x{} @ {} fps, {} frames)",
            config.path,
            info.width,
            info.height,
            info.fps,
            info.total_frames
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            info,
            frame_count: 0,
            sent_eof: false,
        })
    }

    pub(crate) fn video_info(&self) -> VideoInfo {
        self.info
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut bgr = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut bgr)
                    .context("scale frame to BGR")?;
                self.frame_count += 1;
                return Ok(Some(frame_from_bgr(&bgr)?));
            }

            if self.sent_eof {
                log::debug!(
                    "FileSource: {} ended after {} frames",
                    self.config.path,
                    self.frame_count
                );
                return Ok(None);
            }

            // Feed the decoder one more packet, or flush it at end of file.
            let mut sent = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                sent = true;
                break;
            }
            if !sent {
                let _ = self.decoder.send_eof();
                self.sent_eof = true;
            }
        }
    }
}

/// Copy a decoded BGR24 frame into a packed buffer, dropping row padding.
fn frame_from_bgr(bgr: &ffmpeg::frame::Video) -> Result<Frame> {
    let width = bgr.width();
    let height = bgr.height();
    let stride = bgr.stride(0);
    let row_len = width as usize * 3;
    let data = bgr.data(0);

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        let row = data
            .get(start..start + row_len)
            .ok_or_else(|| anyhow!("decoded frame buffer shorter than its geometry"))?;
        pixels.extend_from_slice(row);
    }
    Frame::new(pixels, width, height)
}
