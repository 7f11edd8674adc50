mod motion;
mod result;

pub use motion::{DetectorConfig, MotionDetector, DEFAULT_MIN_AREA, DEFAULT_THRESHOLD};
pub use result::{ChangeMask, DetectionResult, MotionRegion};
