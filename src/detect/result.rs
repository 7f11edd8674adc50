/// Bounding box of every changed pixel in one frame, in pixel coordinates.
///
/// This is not a connected-component result: two disjoint blobs produce one box
/// spanning both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionRegion {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    /// Number of changed pixels inside the box.
    pub changed_pixels: u64,
}

impl MotionRegion {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }

    /// `(max_x - min_x) * (max_y - min_y)`, compared against `min_area`.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Per-frame detector output. Produced once per processed frame and not retained.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DetectionResult {
    /// Present only when the box area exceeds the configured minimum.
    pub region: Option<MotionRegion>,
    /// `changed_pixels / (width * height)`, reported even without a region.
    pub changed_fraction: f64,
    pub changed_pixels: u64,
}

impl DetectionResult {
    /// No region, nothing changed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn motion_detected(&self) -> bool {
        self.region.is_some()
    }

    pub fn changed_percent(&self) -> f64 {
        self.changed_fraction * 100.0
    }
}

/// Which pixels of the last processed frame changed, row-major like the frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeMask {
    width: u32,
    height: u32,
    changed: Vec<bool>,
}

impl ChangeMask {
    /// Clear every pixel, resizing when the frame dimensions changed.
    pub(crate) fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.changed.clear();
        self.changed.resize(width as usize * height as usize, false);
    }

    pub(crate) fn mark(&mut self, index: usize) {
        if let Some(slot) = self.changed.get_mut(index) {
            *slot = true;
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_changed(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.changed[y as usize * self.width as usize + x as usize]
    }

    /// Coordinates of changed pixels in row-major order.
    pub fn changed(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width.max(1) as usize;
        self.changed
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .map(move |(i, _)| ((i % width) as u32, (i / width) as u32))
    }
}
