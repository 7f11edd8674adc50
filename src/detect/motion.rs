use crate::detect::result::{ChangeMask, DetectionResult, MotionRegion};
use crate::error::DetectorError;
use crate::frame::{luminance_centi, rgb_len, Frame, LuminanceGrid, RGB_CHANNELS};

/// Default per-pixel luminance change (0-255) above which a pixel counts as changed.
pub const DEFAULT_THRESHOLD: u8 = 30;
/// Default bounding-box area (px²) a region must exceed to be reported.
pub const DEFAULT_MIN_AREA: u64 = 1000;

/// Detector tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectorConfig {
    pub threshold: u8,
    pub min_area: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_area: DEFAULT_MIN_AREA,
        }
    }
}

impl DetectorConfig {
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_area(mut self, min_area: u64) -> Self {
        self.min_area = min_area;
        self
    }
}

/// First-order temporal differencing detector.
///
/// Keeps exactly one reference frame (the previous one, as luminance) and compares
/// each new frame against it. No smoothing, no background model, no blob grouping.
pub struct MotionDetector {
    config: DetectorConfig,
    reference: Option<LuminanceGrid>,
    mask: Option<ChangeMask>,
}

impl MotionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            reference: None,
            mask: None,
        }
    }

    /// Also record which pixels changed in each frame, for highlighting.
    pub fn with_change_mask(mut self) -> Self {
        self.mask = Some(ChangeMask::default());
        self
    }

    /// Changed pixels of the last processed frame, when mask tracking is enabled.
    pub fn change_mask(&self) -> Option<&ChangeMask> {
        self.mask.as_ref()
    }

    pub fn config(&self) -> DetectorConfig {
        self.config
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<&LuminanceGrid> {
        self.reference.as_ref()
    }

    /// Process one frame against the stored reference.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<DetectionResult, DetectorError> {
        self.detect(frame.pixels(), frame.width, frame.height)
    }

    /// Process a borrowed RGB24 buffer.
    ///
    /// The first frame (or the first after a dimension change) only primes the
    /// reference and reports an empty result. A malformed buffer is a
    /// `ProcessingFault` and drops the reference.
    pub fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<DetectionResult, DetectorError> {
        if let Err(err) = validate_buffer(pixels, width, height) {
            self.release();
            return Err(err);
        }

        let needs_reset = !matches!(&self.reference, Some(r) if r.matches(width, height));
        if needs_reset {
            if let Some(previous) = &self.reference {
                log::debug!(
                    "MotionDetector: dimensions changed {}x{} -> {}x{}, rebuilding reference",
                    previous.width(),
                    previous.height(),
                    width,
                    height
                );
            }
            self.reference = Some(LuminanceGrid::from_rgb(pixels, width, height));
            if let Some(mask) = self.mask.as_mut() {
                mask.reset(width, height);
            }
            return Ok(DetectionResult::empty());
        }
        let Some(reference) = self.reference.as_mut() else {
            return Ok(DetectionResult::empty());
        };

        let row = width as usize;
        // Compared in hundredths: the stored reference is truncated, the current pixel is not.
        let threshold = self.config.threshold as u32 * 100;
        let mut mask = self.mask.as_mut();
        if let Some(mask) = mask.as_deref_mut() {
            mask.reset(width, height);
        }
        let mut changed = 0u64;
        let (mut min_x, mut min_y) = (width, height);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        // Compare and overwrite in one pass: the reference always ends up holding this frame.
        for (i, (px, slot)) in pixels
            .chunks_exact(RGB_CHANNELS)
            .zip(reference.as_mut_slice().iter_mut())
            .enumerate()
        {
            let current = luminance_centi(px[0], px[1], px[2]);
            if current.abs_diff(*slot as u32 * 100) > threshold {
                changed += 1;
                if let Some(mask) = mask.as_deref_mut() {
                    mask.mark(i);
                }
                let x = (i % row) as u32;
                let y = (i / row) as u32;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
            *slot = (current / 100) as u8;
        }

        let total = width as u64 * height as u64;
        let changed_fraction = changed as f64 / total as f64;

        let region = if changed == 0 {
            None
        } else {
            let region = MotionRegion {
                min_x,
                min_y,
                max_x,
                max_y,
                changed_pixels: changed,
            };
            (region.area() > self.config.min_area).then_some(region)
        };

        if let Some(region) = &region {
            log::debug!(
                "MotionDetector: motion in ({},{})-({},{}) area={} changed={:.2}%",
                region.min_x,
                region.min_y,
                region.max_x,
                region.max_y,
                region.area(),
                changed_fraction * 100.0
            );
        }

        Ok(DetectionResult {
            region,
            changed_fraction,
            changed_pixels: changed,
        })
    }

    /// Drop the reference frame. The next frame primes a fresh one.
    pub fn release(&mut self) {
        self.reference = None;
        if let Some(mask) = self.mask.as_mut() {
            mask.reset(0, 0);
        }
    }
}

fn validate_buffer(pixels: &[u8], width: u32, height: u32) -> Result<(), DetectorError> {
    if width == 0 || height == 0 {
        return Err(DetectorError::ProcessingFault(format!(
            "frame has no pixels ({width}x{height})"
        )));
    }
    let expected = rgb_len(width, height).ok_or_else(|| {
        DetectorError::ProcessingFault(format!("frame dimensions {width}x{height} overflow"))
    })?;
    if pixels.len() != expected {
        return Err(DetectorError::ProcessingFault(format!(
            "RGB frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        )));
    }
    Ok(())
}
