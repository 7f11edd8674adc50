//! Scripted frame source.
//!
//! Replays an in-memory list of frames in order, then reports end of stream. Used by
//! embedding callers that already hold decoded frames, and by tests.

use std::collections::VecDeque;

use super::{FrameSource, SourceInfo, StopSignal};
use crate::error::DetectorError;
use crate::frame::Frame;

pub struct ScriptedSource {
    name: String,
    frames: VecDeque<Frame>,
    fps: u32,
    acquire_error: Option<DetectorError>,
    acquired: bool,
    frames_captured: u64,
    releases: u32,
}

impl ScriptedSource {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            frames: frames.into(),
            fps: super::DEFAULT_TARGET_FPS,
            acquire_error: None,
            acquired: false,
            frames_captured: 0,
            releases: 0,
        }
    }

    /// A source whose `acquire` always fails with `err`.
    pub fn failing(name: impl Into<String>, err: DetectorError) -> Self {
        let mut source = Self::new(name, Vec::new());
        source.acquire_error = Some(err);
        source
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Append a frame to the end of the script.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Number of effective releases (acquired -> released transitions).
    pub fn releases(&self) -> u32 {
        self.releases
    }
}

impl FrameSource for ScriptedSource {
    fn describe(&self) -> String {
        format!("{} (scripted, {} frames)", self.name, self.frames.len())
    }

    fn acquire(&mut self, _cancel: &StopSignal) -> Result<SourceInfo, DetectorError> {
        if let Some(err) = &self.acquire_error {
            return Err(err.clone());
        }
        let (width, height) = self
            .frames
            .front()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0));
        self.acquired = true;
        Ok(SourceInfo {
            width,
            height,
            fps: self.fps,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DetectorError> {
        if !self.acquired {
            return Err(DetectorError::SourceUnavailable(format!(
                "{} is not acquired",
                self.name
            )));
        }
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.frames_captured += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) {
        if self.acquired {
            self.acquired = false;
            self.releases += 1;
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frames_captured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_frames_then_ends() {
        let mut source = ScriptedSource::new(
            "script",
            vec![Frame::filled(2, 2, [0, 0, 0]), Frame::filled(2, 2, [9, 9, 9])],
        );
        let info = source.acquire(&StopSignal::new()).unwrap();
        assert_eq!((info.width, info.height), (2, 2));

        assert_eq!(source.next_frame().unwrap().unwrap().pixel(0, 0), Some([0, 0, 0]));
        assert_eq!(source.next_frame().unwrap().unwrap().pixel(0, 0), Some([9, 9, 9]));
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.frames_captured(), 2);
    }

    #[test]
    fn failing_source_reports_its_error() {
        let mut source = ScriptedSource::failing(
            "camera",
            DetectorError::SourceUnavailable("no capture device found".into()),
        );
        let err = source.acquire(&StopSignal::new()).unwrap_err();
        assert!(matches!(err, DetectorError::SourceUnavailable(_)));
        assert!(!source.is_acquired());
    }

    #[test]
    fn release_counts_only_effective_releases() {
        let mut source = ScriptedSource::new("script", Vec::new());
        source.release();
        source.acquire(&StopSignal::new()).unwrap();
        source.release();
        source.release();
        assert_eq!(source.releases(), 1);
    }
}
