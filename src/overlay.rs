//! Detection overlays.
//!
//! Purely cosmetic feedback: an outline around the motion region and a label with the
//! changed percentage. Nothing here feeds back into detection.

use crate::detect::{ChangeMask, DetectionResult};
use crate::frame::{Frame, RGB_CHANNELS};

pub const OVERLAY_COLOR: [u8; 3] = [255, 0, 0];
pub const OUTLINE_WIDTH: u32 = 2;
/// Label anchor, top-left of the surface.
pub const LABEL_ORIGIN: (u32, u32) = (10, 20);

/// Axis-aligned rectangle in surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Anything a detection can be drawn onto.
pub trait OverlaySurface {
    fn dimensions(&self) -> (u32, u32);
    fn stroke_rect(&mut self, rect: Rect, color: [u8; 3], line_width: u32);
    fn fill_text(&mut self, x: u32, y: u32, text: &str, color: [u8; 3]);
    fn paint_pixel(&mut self, x: u32, y: u32, color: [u8; 3]);
}

/// Paint every changed pixel in `mask`. Returns the number of pixels painted.
pub fn highlight_changes<S: OverlaySurface + ?Sized>(surface: &mut S, mask: &ChangeMask) -> u64 {
    if surface.dimensions() != mask.dimensions() {
        return 0;
    }
    let mut painted = 0;
    for (x, y) in mask.changed() {
        surface.paint_pixel(x, y, OVERLAY_COLOR);
        painted += 1;
    }
    painted
}

/// Draw `result` onto `surface`. Returns false when there was nothing to draw.
pub fn annotate<S: OverlaySurface + ?Sized>(surface: &mut S, result: &DetectionResult) -> bool {
    let Some(region) = result.region else {
        return false;
    };
    surface.stroke_rect(
        Rect {
            x: region.min_x,
            y: region.min_y,
            width: region.width(),
            height: region.height(),
        },
        OVERLAY_COLOR,
        OUTLINE_WIDTH,
    );
    surface.fill_text(
        LABEL_ORIGIN.0,
        LABEL_ORIGIN.1,
        &motion_label(result),
        OVERLAY_COLOR,
    );
    true
}

pub fn motion_label(result: &DetectionResult) -> String {
    format!("Motion detected: {:.2}%", result.changed_percent())
}

/// Text placed on a surface. `RgbCanvas` records labels instead of rasterizing glyphs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
    pub x: u32,
    pub y: u32,
    pub text: String,
}

/// In-memory RGB24 surface.
pub struct RgbCanvas {
    frame: Frame,
    labels: Vec<Label>,
}

impl RgbCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_frame(Frame::filled(width, height, [0, 0, 0]))
    }

    /// Start from a captured frame so the overlay lands on top of the image.
    pub fn from_frame(frame: Frame) -> Self {
        Self {
            frame,
            labels: Vec::new(),
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    fn put(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.frame.width || y >= self.frame.height {
            return;
        }
        let offset = (y as usize * self.frame.width as usize + x as usize) * RGB_CHANNELS;
        self.frame.pixels_mut()[offset..offset + RGB_CHANNELS].copy_from_slice(&color);
    }
}

impl OverlaySurface for RgbCanvas {
    fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    /// Outline centred on the rectangle edge, clipped to the canvas.
    fn stroke_rect(&mut self, rect: Rect, color: [u8; 3], line_width: u32) {
        let half = line_width / 2;
        let left = rect.x.saturating_sub(half);
        let top = rect.y.saturating_sub(half);
        let right = rect.x.saturating_add(rect.width);
        let bottom = rect.y.saturating_add(rect.height);
        let thickness = line_width.max(1);

        for t in 0..thickness {
            for x in left..=right.saturating_add(half) {
                self.put(x, top.saturating_add(t), color);
                self.put(x, bottom.saturating_sub(half).saturating_add(t), color);
            }
            for y in top..=bottom.saturating_add(half) {
                self.put(left.saturating_add(t), y, color);
                self.put(right.saturating_sub(half).saturating_add(t), y, color);
            }
        }
    }

    fn fill_text(&mut self, x: u32, y: u32, text: &str, _color: [u8; 3]) {
        self.labels.push(Label {
            x,
            y,
            text: text.to_string(),
        });
    }

    fn paint_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.put(x, y, color);
    }
}

/// Write an RGB frame as PNG.
#[cfg(feature = "image-io")]
pub fn save_png(frame: &Frame, path: &std::path::Path) -> anyhow::Result<()> {
    let image = image::RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
        .ok_or_else(|| anyhow::anyhow!("frame buffer does not match {:?}", frame.dimensions()))?;
    image
        .save(path)
        .map_err(|e| anyhow::anyhow!("failed to write snapshot {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectorConfig, MotionDetector, MotionRegion};

    fn result_with_region() -> DetectionResult {
        DetectionResult {
            region: Some(MotionRegion {
                min_x: 4,
                min_y: 5,
                max_x: 12,
                max_y: 9,
                changed_pixels: 20,
            }),
            changed_fraction: 0.0125,
            changed_pixels: 20,
        }
    }

    #[test]
    fn annotates_region_and_label() {
        let mut canvas = RgbCanvas::new(32, 16);
        assert!(annotate(&mut canvas, &result_with_region()));

        assert_eq!(canvas.frame().pixel(4, 5), Some(OVERLAY_COLOR));
        assert_eq!(canvas.frame().pixel(12, 9), Some(OVERLAY_COLOR));
        assert_eq!(canvas.frame().pixel(8, 7), Some([0, 0, 0]));
        assert_eq!(
            canvas.labels(),
            &[Label {
                x: 10,
                y: 20,
                text: "Motion detected: 1.25%".into()
            }]
        );
    }

    #[test]
    fn nothing_drawn_without_region() {
        let mut canvas = RgbCanvas::new(8, 8);
        let result = DetectionResult {
            changed_fraction: 0.5,
            changed_pixels: 32,
            region: None,
        };
        assert!(!annotate(&mut canvas, &result));
        assert!(canvas.labels().is_empty());
        assert!(canvas.frame().pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn outline_is_clipped_to_canvas() {
        let mut canvas = RgbCanvas::new(4, 4);
        canvas.stroke_rect(
            Rect {
                x: 0,
                y: 0,
                width: 100,
                height: 100,
            },
            OVERLAY_COLOR,
            OUTLINE_WIDTH,
        );
        assert_eq!(canvas.frame().pixel(0, 0), Some(OVERLAY_COLOR));
        assert_eq!(canvas.frame().pixel(3, 3), Some([0, 0, 0]));
    }

    #[test]
    fn changed_pixels_are_painted() {
        let mut detector = MotionDetector::new(DetectorConfig::default()).with_change_mask();
        detector.process_frame(&Frame::filled(6, 4, [0, 0, 0])).unwrap();
        let frame = Frame::filled(6, 4, [0, 0, 0]).with_rect(4, 1, 1, 2, [255, 255, 255]);
        detector.process_frame(&frame).unwrap();
        let mask = detector.change_mask().unwrap();

        let mut canvas = RgbCanvas::from_frame(frame.clone());
        assert_eq!(highlight_changes(&mut canvas, mask), 2);
        assert_eq!(canvas.frame().pixel(4, 1), Some(OVERLAY_COLOR));
        assert_eq!(canvas.frame().pixel(4, 2), Some(OVERLAY_COLOR));
        assert_eq!(canvas.frame().pixel(3, 1), Some([0, 0, 0]));

        let mut other = RgbCanvas::new(3, 3);
        assert_eq!(highlight_changes(&mut other, mask), 0);
    }
}
