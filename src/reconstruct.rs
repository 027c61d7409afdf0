//! The split-frame reconstruction transform.
//!
//! Capture hardware feeding this tool emits one wide BGR frame per sample
//! period. The green channel of the left half carries the low byte and the
//! green channel of the right half carries the high byte of a 16-bit
//! grayscale sample. `reconstruct` reassembles the 16-bit value, keeps its
//! high byte, inverts it, and replicates the result into a three-channel
//! frame of half the input width.
//!
//! The transform is pure: no state is carried across calls, and the same
//! input always yields the same output.

use thiserror::Error;

use crate::frame::Frame;

/// Width of the left (low byte) half, in pixels.
pub const LEFT_WIDTH: u32 = 640;

/// Minimum input width accepted by [`reconstruct`].
pub const MIN_INPUT_WIDTH: u32 = 1280;

/// Input frame is too narrow to contain both halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("frame width {width} is below the {MIN_INPUT_WIDTH} required for reconstruction")]
pub struct DimensionError {
    pub width: u32,
}

/// Reconstruct a grayscale frame from the two halves of a wide input frame.
///
/// The output has width `frame.width() / 2` and the input's height, with the
/// grayscale value replicated across all three channels.
///
/// Each output pixel is computed literally as
/// `255 - (((right << 8) | left) >> 8)` over the green channels of the two
/// halves. The shift discards every bit the left half contributed, so the
/// output value at column `x` equals `255 - green(LEFT_WIDTH + x, y)`
/// regardless of the left half's content. This matches the capture format
/// description and the observed behavior of the deployed tools; do not
/// simplify the combination away without confirming the format is really
/// meant to drop the low byte.
pub fn reconstruct(frame: &Frame) -> Result<Frame, DimensionError> {
    if frame.width() < MIN_INPUT_WIDTH {
        return Err(DimensionError {
            width: frame.width(),
        });
    }

    let out_width = frame.width() / 2;
    let height = frame.height();
    let mut gray = vec![0u8; out_width as usize * height as usize];

    for y in 0..height {
        for x in 0..out_width {
            // Inputs wider than 1280 have more output columns than the left
            // half has pixels; the missing low bytes are taken as zero. The
            // shift below discards them either way.
            let low = if x < LEFT_WIDTH {
                frame.green(x, y) as u16
            } else {
                0
            };
            let high = frame.green(LEFT_WIDTH + x, y) as u16;
            let combined16 = (high << 8) | low;
            let combined8 = (combined16 >> 8) as u8;
            gray[y as usize * out_width as usize + x as usize] = 255 - combined8;
        }
    }

    Ok(Frame::from_gray(&gray, out_width, height))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
