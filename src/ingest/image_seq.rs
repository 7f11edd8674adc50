//! Image sequence frame source.
//!
//! Reads PNG/JPEG files from a local directory in lexical order, one frame per file.
//! Decoding happens in-memory; nothing is written back.

use std::path::{Path, PathBuf};

use super::{FrameSource, SourceInfo, StopSignal};
use crate::error::DetectorError;
use crate::frame::Frame;

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    fps: u32,
    files: Vec<PathBuf>,
    cursor: usize,
    acquired: bool,
    frames_captured: u64,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            dir: dir.into(),
            fps,
            files: Vec::new(),
            cursor: 0,
            acquired: false,
            frames_captured: 0,
        }
    }

    fn list_images(dir: &Path) -> Result<Vec<PathBuf>, DetectorError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            DetectorError::SourceUnavailable(format!(
                "cannot read image directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl FrameSource for ImageSequenceSource {
    fn describe(&self) -> String {
        format!("{} (image sequence)", self.dir.display())
    }

    fn acquire(&mut self, _cancel: &StopSignal) -> Result<SourceInfo, DetectorError> {
        let files = Self::list_images(&self.dir)?;
        let Some(first) = files.first() else {
            return Err(DetectorError::SourceUnavailable(format!(
                "no images found in {}",
                self.dir.display()
            )));
        };
        let (width, height) = image::image_dimensions(first).map_err(|e| {
            DetectorError::SourceUnavailable(format!("cannot read {}: {}", first.display(), e))
        })?;

        log::info!(
            "ImageSequenceSource: {} frames from {} ({}x{})",
            files.len(),
            self.dir.display(),
            width,
            height
        );
        self.files = files;
        self.cursor = 0;
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
                self.dir.display()
            )));
        }
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        let image = image::open(path)
            .map_err(|e| {
                DetectorError::ProcessingFault(format!("failed to decode {}: {}", path.display(), e))
            })?
            .to_rgb8();
        let (width, height) = image.dimensions();
        let frame = Frame::new(width, height, image.into_raw())?;
        self.frames_captured += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if self.acquired {
            self.acquired = false;
            self.files.clear();
            log::info!("ImageSequenceSource: released {}", self.dir.display());
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frames_captured
    }
}
