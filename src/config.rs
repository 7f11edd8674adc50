use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{DetectorConfig, DEFAULT_MIN_AREA, DEFAULT_THRESHOLD};
use crate::ingest::{
    SourceConfig, DEFAULT_HEIGHT, DEFAULT_SOURCE_URI, DEFAULT_TARGET_FPS, DEFAULT_WIDTH,
};

const DEFAULT_HEALTH_LOG_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MotiondConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    overlay: Option<OverlayConfigFile>,
    health_log_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    uri: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    noise: Option<u8>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    threshold: Option<u32>,
    min_area: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OverlayConfigFile {
    snapshot_dir: Option<PathBuf>,
}

/// Resolved `motiond` configuration.
#[derive(Debug, Clone)]
pub struct MotiondConfig {
    pub source: SourceConfig,
    pub detector: DetectorConfig,
    /// When set, frames with motion are annotated and saved here.
    pub snapshot_dir: Option<PathBuf>,
    pub health_interval: Duration,
}

impl Default for MotiondConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            detector: DetectorConfig::default(),
            snapshot_dir: None,
            health_interval: Duration::from_secs(DEFAULT_HEALTH_LOG_SECS),
        }
    }
}

impl MotiondConfig {
    /// Load from the file named by `MOTION_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MOTION_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit file (if any), then apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MotiondConfigFile) -> Result<Self> {
        let source = file.source.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let threshold = match detector.threshold {
            Some(value) => threshold_from(value)?,
            None => DEFAULT_THRESHOLD,
        };
        Ok(Self {
            source: SourceConfig {
                uri: source.uri.unwrap_or_else(|| DEFAULT_SOURCE_URI.to_string()),
                width: source.width.unwrap_or(DEFAULT_WIDTH),
                height: source.height.unwrap_or(DEFAULT_HEIGHT),
                target_fps: source.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                noise: source.noise.unwrap_or(0),
                seed: source.seed,
            },
            detector: DetectorConfig {
                threshold,
                min_area: detector.min_area.unwrap_or(DEFAULT_MIN_AREA),
            },
            snapshot_dir: file.overlay.and_then(|o| o.snapshot_dir),
            health_interval: Duration::from_secs(
                file.health_log_secs.unwrap_or(DEFAULT_HEALTH_LOG_SECS),
            ),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(uri) = std::env::var("MOTION_SOURCE") {
            if !uri.trim().is_empty() {
                self.source.uri = uri;
            }
        }
        if let Ok(threshold) = std::env::var("MOTION_THRESHOLD") {
            let value: u32 = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("MOTION_THRESHOLD must be an integer between 0 and 255"))?;
            self.detector.threshold = threshold_from(value)?;
        }
        if let Ok(min_area) = std::env::var("MOTION_MIN_AREA") {
            self.detector.min_area = min_area
                .trim()
                .parse()
                .map_err(|_| anyhow!("MOTION_MIN_AREA must be a non-negative integer (px²)"))?;
        }
        if let Ok(fps) = std::env::var("MOTION_TARGET_FPS") {
            self.source.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("MOTION_TARGET_FPS must be an integer frame rate"))?;
        }
        if let Ok(dir) = std::env::var("MOTION_SNAPSHOT_DIR") {
            self.snapshot_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.source.uri = self.source.uri.trim().to_string();
        if self.source.uri.is_empty() {
            return Err(anyhow!("source uri must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!(
                "source resolution must be non-zero (got {}x{})",
                self.source.width,
                self.source.height
            ));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("target_fps must be >= 1"));
        }
        if self.health_interval.is_zero() {
            return Err(anyhow!("health_log_secs must be greater than zero"));
        }
        Ok(())
    }
}

fn threshold_from(value: u32) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("threshold {} is outside 0..=255", value))
}

fn read_config_file(path: &Path) -> Result<MotiondConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
