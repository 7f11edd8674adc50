//! Frame sources.
//!
//! This module provides the sources a detection session can pull frames from:
//! - Synthetic scenes (`stub://` URIs, testing and demos)
//! - Scripted in-memory frame lists
//! - Image sequences from a local directory (feature: image-io)
//! - USB/V4L2 cameras (feature: ingest-v4l2)
//!
//! Every source implements `FrameSource`: a one-time `acquire` handshake, a pull-based
//! `next_frame`, and an idempotent `release`. Sources hand frames over one at a time and
//! never queue them; a slow consumer simply pulls less often.
//!
//! Only local sources are supported. Remote URIs fail with `UnsupportedEnvironment`.

#[cfg(feature = "image-io")]
pub mod image_seq;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod scripted;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::DetectorError;
use crate::frame::Frame;

#[cfg(feature = "image-io")]
pub use image_seq::ImageSequenceSource;
pub use scripted::ScriptedSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

pub const DEFAULT_SOURCE_URI: &str = "stub://front_camera";
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_TARGET_FPS: u32 = 10;

/// Configuration shared by all source kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    /// `stub://name`, a local image directory, or a device node such as `/dev/video0`.
    pub uri: String,
    /// Preferred capture width. Devices may negotiate something else.
    pub width: u32,
    /// Preferred capture height.
    pub height: u32,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Synthetic sources only: per-channel noise amplitude added to every pixel.
    pub noise: u8,
    /// Synthetic sources only: RNG seed for reproducible noise.
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_SOURCE_URI.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            target_fps: DEFAULT_TARGET_FPS,
            noise: 0,
            seed: None,
        }
    }
}

/// What the source actually negotiated during `acquire`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Capability interface over a frame producer.
pub trait FrameSource {
    /// Human-readable identifier for logs.
    fn describe(&self) -> String;

    /// One-time readiness handshake. Implementations that wait on hardware should poll
    /// `cancel` and give up early when it is raised.
    fn acquire(&mut self, cancel: &StopSignal) -> Result<SourceInfo, DetectorError>;

    /// Next frame, or `None` when the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>, DetectorError>;

    /// Release the underlying resource. Safe to call repeatedly.
    fn release(&mut self);

    fn frames_captured(&self) -> u64;

    fn is_healthy(&self) -> bool {
        true
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn acquire(&mut self, cancel: &StopSignal) -> Result<SourceInfo, DetectorError> {
        (**self).acquire(cancel)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DetectorError> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn frames_captured(&self) -> u64 {
        (**self).frames_captured()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
}

/// Shared stop flag. Clones observe the same flag, so a signal handler or another
/// thread can request a stop while the owner is blocked in `acquire`.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SourceKind {
    Synthetic,
    Device(String),
    ImageDir(String),
}

/// Open the source named by `config.uri`.
///
/// Fails with `UnsupportedEnvironment` for remote URIs and for local sources this build
/// was compiled without. Missing devices surface later, from `acquire`.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>, DetectorError> {
    match classify_uri(&config.uri)? {
        SourceKind::Synthetic => Ok(Box::new(SyntheticSource::new(config.clone()))),
        SourceKind::Device(path) => open_device(path, config),
        SourceKind::ImageDir(path) => open_image_dir(path, config),
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(path: String, config: &SourceConfig) -> Result<Box<dyn FrameSource>, DetectorError> {
    Ok(Box::new(V4l2Source::new(path, config.clone())))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(path: String, _config: &SourceConfig) -> Result<Box<dyn FrameSource>, DetectorError> {
    Err(DetectorError::UnsupportedEnvironment(format!(
        "camera capture from {path} requires the ingest-v4l2 feature"
    )))
}

#[cfg(feature = "image-io")]
fn open_image_dir(
    path: String,
    config: &SourceConfig,
) -> Result<Box<dyn FrameSource>, DetectorError> {
    Ok(Box::new(ImageSequenceSource::new(path, config.target_fps)))
}

#[cfg(not(feature = "image-io"))]
fn open_image_dir(
    path: String,
    _config: &SourceConfig,
) -> Result<Box<dyn FrameSource>, DetectorError> {
    Err(DetectorError::UnsupportedEnvironment(format!(
        "image sequence {path} requires the image-io feature"
    )))
}

fn classify_uri(uri: &str) -> Result<SourceKind, DetectorError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(DetectorError::SourceUnavailable(
            "no frame source configured".into(),
        ));
    }
    if uri.starts_with("stub://") {
        return Ok(SourceKind::Synthetic);
    }

    let path = match uri.split_once("://") {
        None => uri,
        Some(("file", rest)) => rest,
        Some(("http", rest)) => {
            let host = rest.split(['/', ':']).next().unwrap_or_default();
            if is_loopback_host(host) {
                return Err(DetectorError::UnsupportedEnvironment(
                    "network capture is not supported in this build".into(),
                ));
            }
            return Err(DetectorError::UnsupportedEnvironment(format!(
                "insecure origin {uri}: capture requires a secure (https) or local source"
            )));
        }
        Some((scheme, _)) => {
            return Err(DetectorError::UnsupportedEnvironment(format!(
                "remote capture over {scheme}:// is not supported in this build"
            )));
        }
    };

    if path.starts_with("/dev/video") {
        Ok(SourceKind::Device(path.to_string()))
    } else {
        Ok(SourceKind::ImageDir(path.to_string()))
    }
}

fn is_loopback_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_local_and_synthetic_uris() {
        assert_eq!(
            classify_uri("stub://front_camera").unwrap(),
            SourceKind::Synthetic
        );
        assert_eq!(
            classify_uri("/dev/video0").unwrap(),
            SourceKind::Device("/dev/video0".into())
        );
        assert_eq!(
            classify_uri("file:///var/lib/frames").unwrap(),
            SourceKind::ImageDir("/var/lib/frames".into())
        );
    }

    #[test]
    fn rejects_remote_and_insecure_uris() {
        let err = classify_uri("http://10.0.0.5/stream").unwrap_err();
        assert!(matches!(err, DetectorError::UnsupportedEnvironment(ref m) if m.contains("insecure origin")));

        let err = classify_uri("http://localhost:8080/stream").unwrap_err();
        assert!(matches!(err, DetectorError::UnsupportedEnvironment(_)));

        let err = classify_uri("rtsp://camera-1/stream").unwrap_err();
        assert!(matches!(err, DetectorError::UnsupportedEnvironment(ref m) if m.contains("rtsp://")));
    }

    #[test]
    fn empty_uri_is_unavailable() {
        assert!(matches!(
            classify_uri("   ").unwrap_err(),
            DetectorError::SourceUnavailable(_)
        ));
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        assert!(!signal.is_raised());
        remote.raise();
        assert!(signal.is_raised());
        signal.clear();
        assert!(!remote.is_raised());
    }

    #[test]
    fn opens_synthetic_source() {
        let source = open_source(&SourceConfig::default()).unwrap();
        assert_eq!(source.describe(), "stub://front_camera (synthetic)");
    }
}
