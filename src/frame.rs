//! BGR frame container.
//!
//! Frames are transient values: a source produces them, the reconstruction
//! transform consumes them, a sink writes them, and they are dropped. Nothing
//! in this crate persists a frame beyond one trip through the pipeline.
//!
//! Pixel layout is packed BGR24 (`len == width * height * 3`), the byte order
//! the capture devices and the file decoder both deliver.

use anyhow::{bail, Result};

/// Bytes per pixel (blue, green, red).
pub const CHANNELS: usize = 3;

/// A packed BGR24 frame.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap a packed BGR24 buffer. Fails if the buffer length does not match
    /// the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(CHANNELS))
            .ok_or_else(|| anyhow::anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            bail!(
                "frame buffer length mismatch: expected {} for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            );
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build a color-compatible frame from a single grayscale plane by
    /// replicating each value into all three channels.
    ///
    /// Panics if `gray.len() != width * height`; callers construct the plane
    /// from the same dimensions they pass here.
    pub fn from_gray(gray: &[u8], width: u32, height: u32) -> Self {
        assert_eq!(gray.len(), (width as usize) * (height as usize));
        let mut data = Vec::with_capacity(gray.len() * CHANNELS);
        for &value in gray {
            data.extend_from_slice(&[value, value, value]);
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed BGR24 bytes, row-major, no padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The `[blue, green, red]` triple at `(x, y)`.
    ///
    /// Panics on out-of-bounds coordinates, as slice indexing would.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = self.offset(x, y);
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    /// Green channel value at `(x, y)`.
    pub fn green(&self, x: u32, y: u32) -> u8 {
        self.data[self.offset(x, y) + 1]
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height);
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer_length() {
        let result = Frame::new(vec![0u8; 10], 4, 4);
        assert!(result.is_err());
    }

    #[test]
    fn pixel_accessors_follow_bgr_order() -> Result<()> {
        // 2x1 frame: first pixel B=1 G=2 R=3, second B=4 G=5 R=6.
        let frame = Frame::new(vec![1, 2, 3, 4, 5, 6], 2, 1)?;
        assert_eq!(frame.pixel(0, 0), [1, 2, 3]);
        assert_eq!(frame.pixel(1, 0), [4, 5, 6]);
        assert_eq!(frame.green(1, 0), 5);
        Ok(())
    }

    #[test]
    fn from_gray_replicates_channels() {
        let frame = Frame::from_gray(&[7, 200], 2, 1);
        assert_eq!(frame.data(), &[7, 7, 7, 200, 200, 200]);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 1);
    }
}
