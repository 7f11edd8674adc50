use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::detect::DetectionResult;
use crate::session::SessionStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Terminal reporting for `motiond`: a spinner per startup stage and a live status line
/// while detecting. Falls back to plain stderr lines when not on a TTY.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    fn pretty(&self) -> bool {
        self.is_tty && !matches!(self.mode, UiMode::Plain)
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Live status line; `None` in plain mode (logs carry the same information).
    pub fn status(&self, source: &str) -> Option<LiveStatus> {
        if !self.pretty() {
            return None;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_prefix(source.to_string());
        Some(LiveStatus { bar })
    }
}

pub struct LiveStatus {
    bar: ProgressBar,
}

impl LiveStatus {
    pub fn update(&self, stats: &SessionStats, result: &DetectionResult) {
        let marker = if result.motion_detected() {
            "MOTION"
        } else {
            "quiet"
        };
        self.bar.set_message(format!(
            "{marker} changed={:.2}% frames={} motion_frames={}",
            result.changed_percent(),
            stats.frames_processed,
            stats.motion_frames
        ));
        self.bar.tick();
    }

    pub fn finish(&self, stats: &SessionStats) {
        self.bar.finish_with_message(format!(
            "stopped: {} frames, {} with motion",
            stats.frames_processed, stats.motion_frames
        ));
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_has_no_live_status() {
        assert!(Ui::new(UiMode::Plain, true).status("stub://x").is_none());
        assert!(Ui::new(UiMode::Pretty, false).status("stub://x").is_none());
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
