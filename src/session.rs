//! Detection session lifecycle.
//!
//! A `DetectionSession` owns one `FrameSource` and, while running, one `MotionDetector`.
//!
//! States: `Idle -> Starting -> Running -> Stopping -> Idle`.
//! - `start` fails back to `Idle` on any acquisition error.
//! - `process_frame` / `poll` are only accepted in `Running`.
//! - `stop` is valid from any state, is idempotent, and always ends in `Idle` with the
//!   source released and the reference frame dropped.
//!
//! Stops requested from elsewhere (signal handlers, other threads) go through the
//! session's `StopSignal`; the session observes it after the start handshake and before
//! every frame.

use crate::detect::{ChangeMask, DetectionResult, DetectorConfig, MotionDetector};
use crate::error::DetectorError;
use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceInfo, StopSignal};
use crate::overlay::{annotate, highlight_changes, OverlaySurface};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub motion_frames: u64,
    pub last_changed_fraction: f64,
}

pub struct DetectionSession<S: FrameSource> {
    source: S,
    config: DetectorConfig,
    detector: Option<MotionDetector>,
    highlight: bool,
    state: SessionState,
    stop: StopSignal,
    info: Option<SourceInfo>,
    stats: SessionStats,
}

impl<S: FrameSource> DetectionSession<S> {
    /// New idle session. Nothing is acquired until `start`.
    pub fn new(source: S, config: DetectorConfig) -> Self {
        Self {
            source,
            config,
            detector: None,
            highlight: false,
            state: SessionState::Idle,
            stop: StopSignal::new(),
            info: None,
            stats: SessionStats::default(),
        }
    }

    /// Track changed pixels so overlays can paint them, not just the region box.
    pub fn with_change_highlight(mut self) -> Self {
        self.highlight = true;
        self
    }

    /// `new` followed by `start`.
    pub fn started(source: S, config: DetectorConfig) -> Result<Self, DetectorError> {
        let mut session = Self::new(source, config);
        session.start()?;
        Ok(session)
    }

    /// Acquire the source and begin detection.
    ///
    /// If a stop is requested while the source handshake is in progress, the source is
    /// released as soon as the handshake returns and `Cancelled` is reported.
    pub fn start(&mut self) -> Result<SourceInfo, DetectorError> {
        if let (SessionState::Running, Some(info)) = (self.state, self.info) {
            return Ok(info);
        }

        self.stop.clear();
        self.state = SessionState::Starting;
        log::info!("detection starting on {}", self.source.describe());

        let info = match self.source.acquire(&self.stop) {
            Ok(info) => info,
            Err(err) => {
                self.source.release();
                self.state = SessionState::Idle;
                log::warn!("detection start failed on {}: {}", self.source.describe(), err);
                return Err(err);
            }
        };

        if self.stop.is_raised() {
            self.source.release();
            self.state = SessionState::Idle;
            log::warn!(
                "detection start on {} cancelled during handshake",
                self.source.describe()
            );
            return Err(DetectorError::Cancelled);
        }

        let detector = MotionDetector::new(self.config);
        self.detector = Some(if self.highlight {
            detector.with_change_mask()
        } else {
            detector
        });
        self.info = Some(info);
        self.stats = SessionStats::default();
        self.state = SessionState::Running;
        log::info!(
            "detection running: {}x{} @ {} fps, threshold={}, min_area={}",
            info.width,
            info.height,
            info.fps,
            self.config.threshold,
            self.config.min_area
        );
        Ok(info)
    }

    /// Run the detector on a frame supplied by the caller.
    ///
    /// A `ProcessingFault` stops the session before the error is returned.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<DetectionResult, DetectorError> {
        if self.stop.is_raised() && self.state != SessionState::Idle {
            self.stop();
        }
        if self.state != SessionState::Running {
            return Err(DetectorError::NotRunning(self.state.as_str()));
        }
        let Some(detector) = self.detector.as_mut() else {
            return Err(DetectorError::NotRunning(self.state.as_str()));
        };

        match detector.process_frame(frame) {
            Ok(result) => {
                self.stats.frames_processed += 1;
                self.stats.last_changed_fraction = result.changed_fraction;
                if result.motion_detected() {
                    self.stats.motion_frames += 1;
                }
                Ok(result)
            }
            Err(err) => {
                log::error!("detection stopped after processing fault: {}", err);
                self.stop();
                Err(err)
            }
        }
    }

    /// `process_frame`, then draw the result onto `surface` when it matches the frame size.
    ///
    /// With change highlighting enabled, changed pixels are painted before the region box.
    pub fn process_frame_with_overlay(
        &mut self,
        frame: &Frame,
        surface: &mut dyn OverlaySurface,
    ) -> Result<DetectionResult, DetectorError> {
        let result = self.process_frame(frame)?;
        if surface.dimensions() == frame.dimensions() {
            if let Some(mask) = self.change_mask() {
                highlight_changes(surface, mask);
            }
            annotate(surface, &result);
        } else {
            log::debug!(
                "overlay skipped: surface {:?} does not match frame {:?}",
                surface.dimensions(),
                frame.dimensions()
            );
        }
        Ok(result)
    }

    /// Pull the next frame from the source and process it.
    ///
    /// Returns `Ok(None)` once the session has stopped, either because a stop was
    /// requested or because the source ran out of frames.
    pub fn poll(&mut self) -> Result<Option<(Frame, DetectionResult)>, DetectorError> {
        if self.stop.is_raised() {
            self.stop();
            return Ok(None);
        }
        if self.state != SessionState::Running {
            return Err(DetectorError::NotRunning(self.state.as_str()));
        }

        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("{} ended", self.source.describe());
                self.stop();
                return Ok(None);
            }
            Err(err) => {
                log::error!("frame source {} failed: {}", self.source.describe(), err);
                self.stop();
                return Err(err);
            }
        };
        let result = self.process_frame(&frame)?;
        Ok(Some((frame, result)))
    }

    /// Release the source and the reference frame. No-op when already idle.
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle && self.detector.is_none() {
            return;
        }
        self.state = SessionState::Stopping;
        self.stop.raise();
        self.source.release();
        self.detector = None;
        self.info = None;
        self.state = SessionState::Idle;
        log::info!(
            "detection stopped on {} after {} frames ({} with motion)",
            self.source.describe(),
            self.stats.frames_processed,
            self.stats.motion_frames
        );
    }

    /// Handle for requesting a stop from another thread or a signal handler.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn source_info(&self) -> Option<SourceInfo> {
        self.info
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// True while a reference frame is held.
    pub fn holds_reference(&self) -> bool {
        self.detector
            .as_ref()
            .map(|d| d.has_reference())
            .unwrap_or(false)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Changed pixels of the last frame; `None` unless change highlighting is enabled.
    pub fn change_mask(&self) -> Option<&ChangeMask> {
        self.detector.as_ref().and_then(|d| d.change_mask())
    }
}

impl<S: FrameSource> Drop for DetectionSession<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
