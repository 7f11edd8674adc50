use std::time::{Duration, Instant};

use motion_watch::{
    open_source, DetectionSession, DetectorConfig, DetectorError, Frame, FrameSource,
    RgbCanvas, ScriptedSource, SessionState, SourceConfig, SourceInfo, StopSignal,
};

const BLACK: [u8; 3] = [0, 0, 0];
const WHITE: [u8; 3] = [255, 255, 255];

fn corner_script() -> Vec<Frame> {
    vec![
        Frame::filled(4, 4, BLACK),
        Frame::filled(4, 4, BLACK),
        Frame::filled(4, 4, BLACK),
        Frame::filled(4, 4, BLACK).with_rect(0, 0, 2, 2, WHITE),
    ]
}

fn poll_all<S: FrameSource>(session: &mut DetectionSession<S>) -> Vec<motion_watch::DetectionResult> {
    let mut results = Vec::new();
    while let Some((_, result)) = session.poll().expect("poll") {
        results.push(result);
    }
    results
}

#[test]
fn corner_block_is_reported_with_zero_min_area() {
    let config = DetectorConfig::default().with_min_area(0);
    let mut session =
        DetectionSession::started(ScriptedSource::new("corner", corner_script()), config)
            .expect("start");

    let results = poll_all(&mut session);
    assert_eq!(results.len(), 4);
    assert!(results[..3].iter().all(|r| !r.motion_detected()));
    assert!(results[..3].iter().all(|r| r.changed_fraction == 0.0));

    let last = results[3];
    assert_eq!(last.changed_fraction, 0.25);
    assert_eq!(last.changed_pixels, 4);
    let region = last.region.expect("motion region");
    assert_eq!(
        (region.min_x, region.min_y, region.max_x, region.max_y),
        (0, 0, 1, 1)
    );
    assert_eq!(region.area(), 1);

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.stats().motion_frames, 1);
}

#[test]
fn corner_block_is_below_default_min_area() {
    let mut session = DetectionSession::started(
        ScriptedSource::new("corner", corner_script()),
        DetectorConfig::default(),
    )
    .expect("start");

    let results = poll_all(&mut session);
    let last = results[3];
    assert!(last.region.is_none());
    assert_eq!(last.changed_fraction, 0.25);
    assert_eq!(session.stats().motion_frames, 0);
    assert_eq!(session.stats().last_changed_fraction, 0.25);
}

#[test]
fn stop_is_idempotent_and_releases_once() {
    let mut session = DetectionSession::started(
        ScriptedSource::new("corner", corner_script()),
        DetectorConfig::default(),
    )
    .expect("start");
    assert!(session.poll().expect("poll").is_some());
    assert!(session.holds_reference());

    session.stop();
    session.stop();
    session.stop();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.holds_reference());
    assert_eq!(session.source().releases(), 1);
    assert!(!session.source().is_acquired());
}

#[test]
fn process_after_stop_is_rejected() {
    let mut session = DetectionSession::started(
        ScriptedSource::new("corner", corner_script()),
        DetectorConfig::default(),
    )
    .expect("start");
    session.stop();

    let err = session
        .process_frame(&Frame::filled(4, 4, BLACK))
        .unwrap_err();
    assert_eq!(err, DetectorError::NotRunning("idle"));
}

#[test]
fn session_can_restart_after_stop() {
    let mut source = ScriptedSource::new("corner", Vec::new());
    source.push(Frame::filled(4, 4, BLACK));
    source.push(Frame::filled(4, 4, BLACK));
    let mut session = DetectionSession::started(source, DetectorConfig::default()).expect("start");
    assert!(session.poll().expect("poll").is_some());
    session.stop();

    session.start().expect("restart");
    assert!(session.is_running());
    assert!(!session.holds_reference());
    let (_, result) = session.poll().expect("poll").expect("frame");
    assert!(!result.motion_detected());
    assert_eq!(session.stats().frames_processed, 1);
}

#[test]
fn dimension_change_resets_reference_mid_stream() {
    let frames = vec![
        Frame::filled(4, 4, BLACK),
        Frame::filled(4, 4, BLACK),
        Frame::filled(8, 8, BLACK),
        Frame::filled(8, 8, WHITE),
    ];
    let mut session = DetectionSession::started(
        ScriptedSource::new("resize", frames),
        DetectorConfig::default().with_min_area(0),
    )
    .expect("start");

    let results = poll_all(&mut session);
    assert_eq!(results.len(), 4);
    assert_eq!(results[2], motion_watch::DetectionResult::empty());

    let region = results[3].region.expect("full-frame change");
    assert_eq!(results[3].changed_fraction, 1.0);
    assert_eq!(
        (region.min_x, region.min_y, region.max_x, region.max_y),
        (0, 0, 7, 7)
    );
}

#[test]
fn processing_fault_stops_the_session() {
    let mut session = DetectionSession::started(
        ScriptedSource::new("corner", corner_script()),
        DetectorConfig::default(),
    )
    .expect("start");
    session.poll().expect("poll");

    let err = session
        .process_frame(&Frame::filled(0, 0, BLACK))
        .unwrap_err();
    assert!(matches!(err, DetectorError::ProcessingFault(_)));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.holds_reference());
    assert_eq!(session.source().releases(), 1);
}

#[test]
fn acquisition_errors_leave_session_idle() {
    for err in [
        DetectorError::SourceUnavailable("no capture device found at /dev/video9".into()),
        DetectorError::UnsupportedEnvironment("insecure origin http://10.0.0.5/".into()),
    ] {
        let mut session = DetectionSession::new(
            ScriptedSource::failing("camera", err.clone()),
            DetectorConfig::default(),
        );
        assert_eq!(session.start().unwrap_err(), err);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.source_info().is_none());
        assert!(!session.holds_reference());
    }
}

#[test]
fn remote_uri_is_rejected_before_acquire() {
    let config = SourceConfig {
        uri: "rtsp://camera-1/stream".into(),
        ..SourceConfig::default()
    };
    let err = open_source(&config).err().expect("remote source rejected");
    assert!(matches!(err, DetectorError::UnsupportedEnvironment(_)));
}

/// Source whose handshake blocks until a stop is requested.
struct SlowCamera {
    acquired: bool,
    releases: u32,
    raise_itself: bool,
}

impl SlowCamera {
    fn new(raise_itself: bool) -> Self {
        Self {
            acquired: false,
            releases: 0,
            raise_itself,
        }
    }
}

impl FrameSource for SlowCamera {
    fn describe(&self) -> String {
        "slow camera".into()
    }

    fn acquire(&mut self, cancel: &StopSignal) -> Result<SourceInfo, DetectorError> {
        self.acquired = true;
        if self.raise_itself {
            cancel.raise();
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cancel.is_raised() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(SourceInfo {
            width: 4,
            height: 4,
            fps: 10,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DetectorError> {
        Ok(Some(Frame::filled(4, 4, BLACK)))
    }

    fn release(&mut self) {
        if self.acquired {
            self.acquired = false;
            self.releases += 1;
        }
    }

    fn frames_captured(&self) -> u64 {
        0
    }
}

#[test]
fn stop_during_handshake_cancels_start() {
    let mut session = DetectionSession::new(SlowCamera::new(true), DetectorConfig::default());
    assert_eq!(session.start().unwrap_err(), DetectorError::Cancelled);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.source().acquired);
    assert_eq!(session.source().releases, 1);
    assert!(!session.holds_reference());
}

#[test]
fn stop_from_another_thread_cancels_start() {
    let mut session = DetectionSession::new(SlowCamera::new(false), DetectorConfig::default());
    let stop = session.stop_signal();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stop.raise();
    });

    let err = session.start().unwrap_err();
    stopper.join().expect("stopper thread");

    assert_eq!(err, DetectorError::Cancelled);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.source().releases, 1);
    assert!(matches!(
        session.process_frame(&Frame::filled(4, 4, BLACK)),
        Err(DetectorError::NotRunning(_))
    ));
}

#[test]
fn overlay_is_drawn_for_motion_frames() {
    let mut session = DetectionSession::started(
        ScriptedSource::new("corner", Vec::new()),
        DetectorConfig::default().with_min_area(0),
    )
    .expect("start");
    let mut canvas = RgbCanvas::new(4, 4);

    for frame in corner_script() {
        session
            .process_frame_with_overlay(&frame, &mut canvas)
            .expect("process");
    }

    assert_eq!(canvas.labels().len(), 1);
    assert_eq!(canvas.labels()[0].text, "Motion detected: 25.00%");
    assert_eq!(
        canvas.frame().pixel(0, 0),
        Some(motion_watch::overlay::OVERLAY_COLOR)
    );
}

#[test]
fn overlay_paints_changed_pixels_when_highlighting() {
    let mut session = DetectionSession::new(
        ScriptedSource::new("corner", Vec::new()),
        DetectorConfig::default(),
    )
    .with_change_highlight();
    session.start().expect("start");
    let mut canvas = RgbCanvas::new(4, 4);

    for frame in corner_script() {
        session
            .process_frame_with_overlay(&frame, &mut canvas)
            .expect("process");
    }

    // Below the default min area: no box or label, but the changed pixels are painted.
    assert!(canvas.labels().is_empty());
    let red = Some(motion_watch::overlay::OVERLAY_COLOR);
    assert_eq!(canvas.frame().pixel(1, 1), red);
    assert_eq!(canvas.frame().pixel(2, 2), Some(BLACK));
    assert_eq!(session.change_mask().expect("mask").changed().count(), 4);
}

#[test]
fn fractional_luminance_change_is_detected() {
    let frames = vec![Frame::filled(4, 4, BLACK), Frame::filled(4, 4, [0, 52, 0])];
    let mut session = DetectionSession::started(
        ScriptedSource::new("green", frames),
        DetectorConfig::default().with_min_area(0),
    )
    .expect("start");

    let results = poll_all(&mut session);
    assert_eq!(results[1].changed_pixels, 16);
    assert_eq!(results[1].changed_fraction, 1.0);
}

#[test]
fn overlay_is_skipped_for_mismatched_surface() {
    let mut session = DetectionSession::started(
        ScriptedSource::new("corner", Vec::new()),
        DetectorConfig::default().with_min_area(0),
    )
    .expect("start");
    let mut canvas = RgbCanvas::new(16, 16);

    for frame in corner_script() {
        session
            .process_frame_with_overlay(&frame, &mut canvas)
            .expect("process");
    }
    assert!(canvas.labels().is_empty());
    assert_eq!(session.stats().motion_frames, 1);
}

#[test]
fn synthetic_scene_reports_periodic_motion() {
    let config = SourceConfig {
        uri: "stub://porch".into(),
        width: 160,
        height: 120,
        noise: 8,
        seed: Some(42),
        ..SourceConfig::default()
    };
    let source = open_source(&config).expect("open");
    let mut session =
        DetectionSession::started(source, DetectorConfig::default()).expect("start");

    for _ in 0..60 {
        session.poll().expect("poll").expect("synthetic frames never end");
    }
    assert_eq!(session.stats().frames_processed, 60);
    assert_eq!(session.stats().motion_frames, 1);
    assert_eq!(session.source().frames_captured(), 60);

    session.stop();
    assert_eq!(session.state(), SessionState::Idle);
}
