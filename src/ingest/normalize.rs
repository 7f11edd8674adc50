use crate::error::DetectorError;
use crate::frame::rgb_len;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Nv12,
    Yuyv,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"NV12" => Some(PixelFormat::Nv12),
            b"YUYV" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }
}

/// Convert a captured buffer into tightly packed RGB24.
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>, DetectorError> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = rgb_len(width, height)
                .ok_or_else(|| fault("RGB frame dimensions overflow".into()))?;
            if pixels.len() < expected {
                return Err(fault(format!(
                    "RGB frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                )));
            }
            // Drivers may pad the buffer past the image.
            Ok(pixels[..expected].to_vec())
        }
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height),
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width, height),
    }
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, DetectorError> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| fault("NV12 frame dimensions overflow".into()))?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| fault("NV12 frame dimensions overflow".into()))?;
    if pixels.len() < expected {
        return Err(fault(format!(
            "NV12 frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        )));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;
            write_rgb(&mut rgb[(j * w + i) * 3..], y, u, v);
        }
    }
    Ok(rgb)
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, DetectorError> {
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| fault("YUYV frame dimensions overflow".into()))?;
    if width % 2 != 0 {
        return Err(fault(format!("YUYV frame width {width} is not even")));
    }
    let expected = pixel_count * 2;
    if pixels.len() < expected {
        return Err(fault(format!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        )));
    }

    let mut rgb = vec![0u8; pixel_count * 3];
    for (n, quad) in pixels[..expected].chunks_exact(4).enumerate() {
        let u = quad[1] as f32 - 128.0;
        let v = quad[3] as f32 - 128.0;
        write_rgb(&mut rgb[n * 6..], quad[0] as f32, u, v);
        write_rgb(&mut rgb[n * 6 + 3..], quad[2] as f32, u, v);
    }
    Ok(rgb)
}

fn write_rgb(out: &mut [u8], y: f32, u: f32, v: f32) {
    out[0] = clamp_to_u8(y + 1.402_f32 * v);
    out[1] = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
    out[2] = clamp_to_u8(y + 1.772_f32 * u);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn fault(message: String) -> DetectorError {
    DetectorError::ProcessingFault(message)
}
