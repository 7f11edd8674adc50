//! Camera motion watch.
//!
//! This crate implements the frame-differencing motion detector behind the monitoring
//! portal's live camera view, the frame sources it runs against, and the `motiond` driver.
//!
//! # Detection model
//!
//! Each frame is reduced to luminance (`0.30 R + 0.59 G + 0.11 B`) and compared against
//! the previous frame only. Pixels whose luminance moved by more than the threshold are
//! counted, the tightest box around all of them is reported as a motion region when its
//! area exceeds the minimum, and the changed fraction is always reported.
//!
//! # Module Structure
//!
//! - `frame`: `Frame` (RGB24) and `LuminanceGrid`
//! - `detect`: `MotionDetector`, `DetectorConfig`, `DetectionResult`, `MotionRegion`
//! - `ingest`: `FrameSource` and the synthetic, scripted, image and V4L2 sources
//! - `session`: `DetectionSession` lifecycle (`Idle -> Starting -> Running -> Stopping`)
//! - `overlay`: cosmetic region/label drawing
//! - `config`: `motiond` configuration (file + environment)
//! - `ui`: terminal stage reporting for binaries

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod session;
pub mod ui;

pub use detect::{
    ChangeMask, DetectionResult, DetectorConfig, MotionDetector, MotionRegion, DEFAULT_MIN_AREA,
    DEFAULT_THRESHOLD,
};
pub use error::DetectorError;
pub use frame::{luminance, luminance_centi, Frame, LuminanceGrid};
pub use ingest::{
    open_source, FrameSource, ScriptedSource, SourceConfig, SourceInfo, StopSignal,
    SyntheticSource,
};
pub use overlay::{annotate, OverlaySurface, RgbCanvas};
pub use session::{DetectionSession, SessionState, SessionStats};
