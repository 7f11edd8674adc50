//! Frame and luminance containers.
//!
//! - `Frame`: RGB24 pixel buffer with fixed dimensions. Length is validated at construction.
//! - `LuminanceGrid`: single-channel brightness grid stored as a flat `y * width + x` array.
//!
//! Both zeroize their pixel storage on drop so released frames do not linger in memory.

use zeroize::Zeroize;

use crate::error::DetectorError;

/// Bytes per RGB24 pixel.
pub const RGB_CHANNELS: usize = 3;

/// Luminance weights in hundredths (0.30, 0.59, 0.11).
const WEIGHT_R: u32 = 30;
const WEIGHT_G: u32 = 59;
const WEIGHT_B: u32 = 11;

/// Exact perceptual luminance of one RGB pixel, in hundredths (0..=25_500).
///
/// `0.30 R + 0.59 G + 0.11 B` without rounding: `(0, 52, 0)` is 3068, i.e. 30.68.
#[inline]
pub fn luminance_centi(r: u8, g: u8, b: u8) -> u32 {
    r as u32 * WEIGHT_R + g as u32 * WEIGHT_G + b as u32 * WEIGHT_B
}

/// Perceptual luminance of one RGB pixel, truncated to 0..=255.
///
/// This is the value a reference grid stores. Comparisons against a stored value use
/// `luminance_centi` so the fractional part of the current pixel is kept.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (luminance_centi(r, g, b) / 100) as u8
}

/// Expected RGB24 buffer length for the given dimensions, `None` on overflow.
pub fn rgb_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One captured frame: `width * height` pixels, 8-bit R, G, B per pixel, row-major.
#[derive(Clone)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap an RGB24 buffer. Fails when the buffer length does not match the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, DetectorError> {
        let expected = rgb_len(width, height).ok_or_else(|| {
            DetectorError::ProcessingFault(format!("frame dimensions {width}x{height} overflow"))
        })?;
        if data.len() != expected {
            return Err(DetectorError::ProcessingFault(format!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build a frame from an RGBA buffer (canvas layout), dropping alpha.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self, DetectorError> {
        let pixel_count = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| {
                DetectorError::ProcessingFault(format!("frame dimensions {width}x{height} overflow"))
            })?;
        if rgba.len() != pixel_count * 4 {
            return Err(DetectorError::ProcessingFault(format!(
                "RGBA frame length mismatch: expected {}, got {}",
                pixel_count * 4,
                rgba.len()
            )));
        }
        let mut data = Vec::with_capacity(pixel_count * RGB_CHANNELS);
        for px in rgba.chunks_exact(4) {
            data.extend_from_slice(&px[..3]);
        }
        Self::new(width, height, data)
    }

    /// Frame with every pixel set to `rgb`.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixel_count = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixel_count * RGB_CHANNELS);
        for _ in 0..pixel_count {
            data.extend_from_slice(&rgb);
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Paint a rectangle, clipped to the frame bounds.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, rgb: [u8; 3]) {
        let x_end = x.saturating_add(w).min(self.width);
        let y_end = y.saturating_add(h).min(self.height);
        for py in y.min(y_end)..y_end {
            for px in x.min(x_end)..x_end {
                let offset = (py as usize * self.width as usize + px as usize) * RGB_CHANNELS;
                self.data[offset..offset + RGB_CHANNELS].copy_from_slice(&rgb);
            }
        }
    }

    /// Builder form of [`Frame::fill_rect`].
    pub fn with_rect(mut self, x: u32, y: u32, w: u32, h: u32, rgb: [u8; 3]) -> Self {
        self.fill_rect(x, y, w, h, rgb);
        self
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    /// Read-only RGB24 bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Mutable bytes; the length cannot change, so the frame stays valid.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

// ----------------------------------------------------------------------------
// LuminanceGrid
// ----------------------------------------------------------------------------

/// Grid of luminance values, same dimensions as the frame it came from.
///
/// Storage is a flat array indexed by `y * width + x`.
#[derive(Clone, PartialEq, Eq)]
pub struct LuminanceGrid {
    width: u32,
    height: u32,
    values: Vec<u8>,
}

impl LuminanceGrid {
    pub fn from_frame(frame: &Frame) -> Self {
        Self::from_rgb(frame.pixels(), frame.width, frame.height)
    }

    /// Caller guarantees `pixels.len() == width * height * 3`.
    pub(crate) fn from_rgb(pixels: &[u8], width: u32, height: u32) -> Self {
        let values = pixels
            .chunks_exact(RGB_CHANNELS)
            .map(|px| luminance(px[0], px[1], px[2]))
            .collect();
        Self {
            width,
            height,
            values,
        }
    }

    /// Declarative constructor: one slice per row, all rows the same length.
    pub fn from_rows(rows: &[&[u8]]) -> Result<Self, DetectorError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return Err(DetectorError::ProcessingFault(
                "luminance rows must all have the same length".into(),
            ));
        }
        Ok(Self {
            width: width as u32,
            height: height as u32,
            values: rows.concat(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.values
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.values
    }
}

impl std::fmt::Debug for LuminanceGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuminanceGrid")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Drop for LuminanceGrid {
    fn drop(&mut self) {
        self.values.zeroize();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luminance_weights() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 255, 255), 255);
        assert_eq!(luminance(100, 0, 0), 30);
        assert_eq!(luminance(0, 100, 0), 59);
        assert_eq!(luminance(0, 0, 100), 11);
        // 0.3*10 + 0.59*20 + 0.11*30 = 18.1, truncated
        assert_eq!(luminance(10, 20, 30), 18);
    }

    #[test]
    fn centi_luminance_keeps_fraction() {
        assert_eq!(luminance_centi(10, 20, 30), 1810);
        assert_eq!(luminance_centi(0, 52, 0), 3068);
        assert_eq!(luminance_centi(255, 255, 255), 25_500);
        assert_eq!(luminance(0, 52, 0), 30);
    }

    #[test]
    fn frame_rejects_length_mismatch() {
        let err = Frame::new(2, 2, vec![0u8; 11]).unwrap_err();
        assert!(matches!(err, DetectorError::ProcessingFault(_)));
        assert!(Frame::new(2, 2, vec![0u8; 12]).is_ok());
    }

    #[test]
    fn frame_from_rgba_drops_alpha() {
        let rgba = [1, 2, 3, 255, 4, 5, 6, 0];
        let frame = Frame::from_rgba(2, 1, &rgba).unwrap();
        assert_eq!(frame.pixels(), &[1, 2, 3, 4, 5, 6]);
        assert!(Frame::from_rgba(2, 1, &rgba[..7]).is_err());
    }

    #[test]
    fn fill_rect_is_clipped() {
        let frame = Frame::filled(4, 4, [0, 0, 0]).with_rect(3, 3, 10, 10, [255, 255, 255]);
        assert_eq!(frame.pixel(3, 3), Some([255, 255, 255]));
        assert_eq!(frame.pixel(2, 3), Some([0, 0, 0]));
        assert_eq!(frame.pixel(4, 4), None);
    }

    #[test]
    fn grid_uses_row_major_layout() {
        let frame = Frame::filled(3, 2, [0, 0, 0]).with_rect(2, 1, 1, 1, [255, 255, 255]);
        let grid = LuminanceGrid::from_frame(&frame);
        assert_eq!(grid.as_slice(), &[0, 0, 0, 0, 0, 255]);
        assert_eq!(grid.get(2, 1), Some(255));
        assert_eq!(grid.get(3, 0), None);
    }

    #[test]
    fn grid_from_rows() {
        let grid = LuminanceGrid::from_rows(&[&[1, 2], &[3, 4]]).unwrap();
        assert!(grid.matches(2, 2));
        assert_eq!(grid.get(0, 1), Some(3));
        assert!(LuminanceGrid::from_rows(&[&[1, 2], &[3]]).is_err());
    }
}
