//! motiond - camera motion watch daemon
//!
//! This daemon:
//! 1. Loads configuration (file named by `--config`/`MOTION_CONFIG`, then environment)
//! 2. Opens and acquires the configured frame source (stub, image directory, V4L2)
//! 3. Runs the frame-differencing detector on every frame
//! 4. Logs motion regions and, when a snapshot directory is configured, saves annotated frames
//! 5. Stops cleanly on Ctrl-C, end of stream, or `--max-frames`

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use motion_watch::{
    config::MotiondConfig,
    ui::{Ui, UiMode},
    open_source, ChangeMask, DetectionResult, DetectionSession, DetectorError, Frame, FrameSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch a camera for motion")]
struct Args {
    /// Configuration file (JSON, or TOML when the name ends in .toml).
    #[arg(long, env = "MOTION_CONFIG")]
    config: Option<PathBuf>,

    /// Frame source URI (overrides config), e.g. stub://porch or /dev/video0.
    #[arg(long)]
    source: Option<String>,

    /// Per-pixel luminance change that counts as motion (0-255).
    #[arg(long)]
    threshold: Option<u8>,

    /// Minimum bounding-box area (px²) for a motion region.
    #[arg(long)]
    min_area: Option<u64>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Save annotated frames with motion to this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value_t = UiMode::Auto, value_name = "MODE")]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::new(args.ui, std::io::stderr().is_terminal());

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = MotiondConfig::load_from(args.config.as_deref())?;
        if let Some(source) = args.source {
            cfg.source.uri = source;
        }
        if let Some(threshold) = args.threshold {
            cfg.detector.threshold = threshold;
        }
        if let Some(min_area) = args.min_area {
            cfg.detector.min_area = min_area;
        }
        if args.snapshot_dir.is_some() {
            cfg.snapshot_dir = args.snapshot_dir;
        }
        cfg
    };
    let snapshot_dir = prepare_snapshot_dir(cfg.snapshot_dir.as_deref())?;

    let source = open_source(&cfg.source).map_err(|e| remediate(&cfg.source.uri, e))?;
    let mut session = DetectionSession::new(source, cfg.detector);
    if snapshot_dir.is_some() {
        session = session.with_change_highlight();
    }

    let stop = session.stop_signal();
    ctrlc::set_handler(move || stop.raise())
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let info = {
        let _stage = ui.stage("Acquire frame source");
        match session.start() {
            Ok(info) => info,
            Err(DetectorError::Cancelled) => {
                log::info!("shutdown requested before the source was ready");
                return Ok(());
            }
            Err(e) => return Err(remediate(&cfg.source.uri, e)),
        }
    };

    log::info!("motiond running. watching {}", cfg.source.uri);
    log::info!(
        "threshold={}, min_area={}px², {}x{} @ {} fps",
        cfg.detector.threshold,
        cfg.detector.min_area,
        info.width,
        info.height,
        info.fps
    );

    let status = ui.status(&cfg.source.uri);
    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(info.fps.max(1)));
    let mut last_health_log = Instant::now();

    loop {
        let tick = Instant::now();

        let Some((frame, result)) = session.poll()? else {
            break;
        };
        let stats = session.stats();

        if let Some(region) = result.region {
            log::info!(
                "motion #{}: box=({},{})-({},{}) area={}px² changed={:.2}%",
                stats.motion_frames,
                region.min_x,
                region.min_y,
                region.max_x,
                region.max_y,
                region.area(),
                result.changed_percent()
            );
            if let Some(dir) = snapshot_dir.as_deref() {
                let mask = session.change_mask();
                if let Err(e) = save_snapshot(dir, stats.frames_processed, frame, &result, mask) {
                    log::error!("snapshot failed: {}", e);
                }
            }
        }
        if let Some(status) = &status {
            status.update(&stats, &result);
        }

        if last_health_log.elapsed() >= cfg.health_interval {
            log::info!(
                "source health={} captured={} processed={} motion_frames={}",
                session.source().is_healthy(),
                session.source().frames_captured(),
                stats.frames_processed,
                stats.motion_frames
            );
            last_health_log = Instant::now();
        }

        if args
            .max_frames
            .is_some_and(|max| stats.frames_processed >= max)
        {
            log::info!("frame limit reached");
            break;
        }

        // Only sleep the remainder of the frame interval; a slow frame is not made up for.
        if let Some(remaining) = frame_interval.checked_sub(tick.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    let stats = session.stats();
    session.stop();
    if let Some(status) = &status {
        status.finish(&stats);
    }
    log::info!(
        "motiond stopped: {} frames processed, {} with motion",
        stats.frames_processed,
        stats.motion_frames
    );
    Ok(())
}

fn remediate(uri: &str, err: DetectorError) -> anyhow::Error {
    let hint = match &err {
        DetectorError::SourceUnavailable(_) => {
            "check that the camera is connected or the image directory exists"
        }
        DetectorError::UnsupportedEnvironment(msg) if msg.contains("feature") => {
            "rebuild motiond with the named cargo feature enabled"
        }
        DetectorError::UnsupportedEnvironment(_) => {
            "use a local source: stub://name, an image directory, or /dev/videoN"
        }
        _ => "see the log for details",
    };
    anyhow!("cannot watch {}: {} ({})", uri, err, hint)
}

fn prepare_snapshot_dir(dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let Some(dir) = dir else {
        return Ok(None);
    };
    if !cfg!(feature = "image-io") {
        log::warn!(
            "snapshot_dir {} ignored: motiond was built without the image-io feature",
            dir.display()
        );
        return Ok(None);
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow!("failed to create snapshot dir {}: {}", dir.display(), e))?;
    log::info!("saving motion snapshots to {}", dir.display());
    Ok(Some(dir.to_path_buf()))
}

#[cfg(feature = "image-io")]
fn save_snapshot(
    dir: &Path,
    index: u64,
    frame: Frame,
    result: &DetectionResult,
    mask: Option<&ChangeMask>,
) -> Result<()> {
    use motion_watch::overlay::{annotate, highlight_changes, save_png, RgbCanvas};

    let mut canvas = RgbCanvas::from_frame(frame);
    if let Some(mask) = mask {
        highlight_changes(&mut canvas, mask);
    }
    annotate(&mut canvas, result);
    for label in canvas.labels() {
        log::debug!("snapshot {} label: {}", index, label.text);
    }
    let path = dir.join(format!("motion_{:08}.png", index));
    save_png(canvas.frame(), &path)?;
    log::info!("snapshot written to {}", path.display());
    Ok(())
}

#[cfg(not(feature = "image-io"))]
fn save_snapshot(
    _dir: &Path,
    _index: u64,
    _frame: Frame,
    _result: &DetectionResult,
    _mask: Option<&ChangeMask>,
) -> Result<()> {
    Ok(())
}
