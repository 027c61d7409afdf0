use anyhow::{anyhow, Result};

/// Pixel formats we accept from a capture device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CaptureFormat {
    Rgb24,
    Yuyv,
}

/// Convert a captured buffer to packed BGR24.
pub(crate) fn normalize_to_bgr(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: CaptureFormat,
) -> Result<Vec<u8>> {
    match format {
        CaptureFormat::Rgb24 => rgb24_to_bgr(pixels, width, height),
        CaptureFormat::Yuyv => yuyv_to_bgr(pixels, width, height),
    }
}

fn rgb24_to_bgr(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "RGB frame too short: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut bgr = vec![0u8; expected];
    for (dst, src) in bgr.chunks_exact_mut(3).zip(pixels.chunks_exact(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }
    Ok(bgr)
}

fn yuyv_to_bgr(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV requires an even frame width, got {}", width));
    }
    let w = width as usize;
    let h = height as usize;
    let expected = w
        .checked_mul(h)
        .and_then(|v| v.checked_mul(2))
        .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "YUYV frame too short: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut bgr = vec![0u8; w * h * 3];
    for j in 0..h {
        for i in (0..w).step_by(2) {
            // One macropixel: Y0 U Y1 V covers two output pixels.
            let base = (j * w + i) * 2;
            let y0 = pixels[base] as f32;
            let u = pixels[base + 1] as f32 - 128.0;
            let y1 = pixels[base + 2] as f32;
            let v = pixels[base + 3] as f32 - 128.0;

            for (k, y) in [(0usize, y0), (1usize, y1)] {
                let r = y + 1.402_f32 * v;
                let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
                let b = y + 1.772_f32 * u;

                let offset = (j * w + i + k) * 3;
                bgr[offset] = clamp_to_u8(b);
                bgr[offset + 1] = clamp_to_u8(g);
                bgr[offset + 2] = clamp_to_u8(r);
            }
        }
    }
    Ok(bgr)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb24_swaps_to_bgr() {
        let bgr = normalize_to_bgr(&[10, 20, 30, 40, 50, 60], 2, 1, CaptureFormat::Rgb24).unwrap();
        assert_eq!(bgr, vec![30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn rgb24_rejects_short_buffer() {
        let result = normalize_to_bgr(&[0u8; 5], 2, 1, CaptureFormat::Rgb24);
        assert!(result.is_err());
    }

    #[test]
    fn yuyv_neutral_chroma_is_gray() {
        // U = V = 128 means no chroma; both pixels come out at their Y value.
        let bgr = normalize_to_bgr(&[90, 128, 200, 128], 2, 1, CaptureFormat::Yuyv).unwrap();
        assert_eq!(bgr, vec![90, 90, 90, 200, 200, 200]);
    }

    #[test]
    fn yuyv_rejects_odd_width() {
        let result = normalize_to_bgr(&[0u8; 6], 3, 1, CaptureFormat::Yuyv);
        assert!(result.is_err());
    }
}
