//! V4L2 frame source.
//!
//! Captures from a local device node (e.g. `/dev/video0`) through memory-mapped buffers.
//! RGB24 is requested; NV12 and YUYV are converted when the driver insists on them.
//! The driver owns a small fixed set of buffers, so frames that are not pulled in time
//! are overwritten by the driver rather than queued.

use ouroboros::self_referencing;
use std::path::Path;
use std::time::{Duration, Instant};

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{FrameSource, SourceConfig, SourceInfo, StopSignal};
use crate::error::DetectorError;
use crate::frame::Frame;

const CAPTURE_BUFFERS: u32 = 4;

pub struct V4l2Source {
    device: String,
    config: SourceConfig,
    state: Option<DeviceState>,
    format: PixelFormat,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(device: impl Into<String>, config: SourceConfig) -> Self {
        Self {
            device: device.into(),
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> DetectorError {
    DetectorError::SourceUnavailable(format!("{context}: {err}"))
}

impl FrameSource for V4l2Source {
    fn describe(&self) -> String {
        format!("{} (v4l2)", self.device)
    }

    fn acquire(&mut self, cancel: &StopSignal) -> Result<SourceInfo, DetectorError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        if !Path::new(&self.device).exists() {
            return Err(DetectorError::SourceUnavailable(format!(
                "no capture device found at {}",
                self.device
            )));
        }

        let mut device = v4l::Device::with_path(&self.device)
            .map_err(|e| unavailable(&format!("open v4l2 device {}", self.device), e))?;
        let mut format = device
            .format()
            .map_err(|e| unavailable("read v4l2 format", e))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Source: failed to set format on {}: {}", self.device, err);
                device
                    .format()
                    .map_err(|e| unavailable("read v4l2 format after set failure", e))?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            DetectorError::UnsupportedEnvironment(format!(
                "{} only offers pixel format {}",
                self.device, format.fourcc
            ))
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", self.device, err);
            }
        }

        if cancel.is_raised() {
            return Err(DetectorError::Cancelled);
        }

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, CAPTURE_BUFFERS)
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            unavailable("create v4l2 buffer stream", err)
        })?;

        self.state = Some(state);
        self.format = pixel_format;
        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(SourceInfo {
            width: self.active_width,
            height: self.active_height,
            fps: self.config.target_fps,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DetectorError> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().ok_or_else(|| {
            DetectorError::SourceUnavailable(format!("{} is not acquired", self.device))
        })?;
        let (width, height, format) = (self.active_width, self.active_height, self.format);
        let captured = state.with_mut(|fields| {
            fields.stream.next().map(|(buf, meta)| {
                let used = (meta.bytesused as usize).min(buf.len());
                let used = if used == 0 { buf.len() } else { used };
                normalize_to_rgb(&buf[..used], width, height, format)
            })
        });
        let rgb = match captured {
            Ok(rgb) => rgb?,
            Err(err) => {
                self.last_error = Some(err.to_string());
                return Err(unavailable("capture v4l2 frame", err));
            }
        };

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Frame::new(width, height, rgb).map(Some)
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Source: released {}", self.device);
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }
}
