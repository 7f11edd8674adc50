//! Synthetic frame source (`stub://` URIs).
//!
//! Generates a static scene with occasional "motion events": a bright block that jumps
//! to a new position every `SCENE_PERIOD` frames. Optional low-amplitude noise makes the
//! static frames realistic without crossing the detection threshold.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, SourceConfig, SourceInfo, StopSignal};
use crate::error::DetectorError;
use crate::frame::Frame;

/// Frames between scene changes.
pub const SCENE_PERIOD: u64 = 50;
/// Number of horizontal positions the block cycles through.
const BLOCK_POSITIONS: u32 = 4;
const BACKGROUND: [u8; 3] = [40, 40, 40];
const BLOCK: [u8; 3] = [220, 220, 220];

pub struct SyntheticSource {
    config: SourceConfig,
    rng: StdRng,
    acquired: bool,
    frame_count: u64,
    scene_state: u32,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            acquired: false,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn generate(&mut self) -> Frame {
        if self.frame_count % SCENE_PERIOD == 0 {
            self.scene_state = (self.scene_state + 1) % BLOCK_POSITIONS;
        }

        let (width, height) = (self.config.width, self.config.height);
        let block_w = (width / 5).max(1);
        let block_h = (height / 5).max(1);
        let x = self.scene_state * (width / BLOCK_POSITIONS);
        let y = height / 2 - block_h / 2;

        let mut frame =
            Frame::filled(width, height, BACKGROUND).with_rect(x, y, block_w, block_h, BLOCK);
        let noise = self.config.noise;
        if noise > 0 {
            for value in frame.pixels_mut() {
                *value = value.saturating_add(self.rng.gen_range(0..=noise));
            }
        }
        frame
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("{} (synthetic)", self.config.uri)
    }

    fn acquire(&mut self, _cancel: &StopSignal) -> Result<SourceInfo, DetectorError> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(DetectorError::SourceUnavailable(format!(
                "synthetic source {} has no resolution",
                self.config.uri
            )));
        }
        self.acquired = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{} @ {} fps)",
            self.config.uri,
            self.config.width,
            self.config.height,
            self.config.target_fps
        );
        Ok(SourceInfo {
            width: self.config.width,
            height: self.config.height,
            fps: self.config.target_fps,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DetectorError> {
        if !self.acquired {
            return Err(DetectorError::SourceUnavailable(format!(
                "{} is not acquired",
                self.config.uri
            )));
        }
        self.frame_count += 1;
        Ok(Some(self.generate()))
    }

    fn release(&mut self) {
        if self.acquired {
            self.acquired = false;
            log::info!("SyntheticSource: released {}", self.config.uri);
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
