use std::sync::Mutex;

use super::*;
use crate::encode::sink::InMemorySink;
use crate::foundation::core::Fps;
use crate::host::simulated::{SimulatedHost, SimulatedScene};
use crate::job::progress::ProgressEvent;

fn canvas() -> Canvas {
    Canvas {
        width: 32,
        height: 18,
    }
}

fn quick_opts() -> DriverOpts {
    DriverOpts {
        readiness: ReadinessCaps {
            font_timeout_ms: 10,
            image_timeout_ms: 10,
            paint_cycles: 0,
            paint_timeout_ms: 0,
            settle_delay_ms: 0,
        },
        frame_format: FrameFormat::Png,
        ..Default::default()
    }
}

fn table(fps: u32, secs: f64) -> FrameTimetable {
    FrameTimetable::new(Fps::whole(fps).unwrap(), secs).unwrap()
}

fn run(
    scene: SimulatedScene,
    timetable: FrameTimetable,
    opts: &DriverOpts,
    cancel: &CancelToken,
    sink: &mut InMemorySink,
) -> CastResult<DriverOutcome> {
    let mut host = SimulatedHost::new(scene, canvas());
    let progress = |_: &ProgressEvent| {};
    FrameDriver::new(&mut host, timetable, canvas(), opts, &progress, cancel).run(sink)
}

#[test]
fn every_frame_once_in_order() {
    let mut sink = InMemorySink::new();
    let out = run(
        SimulatedScene::default(),
        table(30, 2.0),
        &quick_opts(),
        &CancelToken::new(),
        &mut sink,
    )
    .unwrap();
    let DriverOutcome::Completed(stats) = out else {
        panic!("expected completion");
    };
    assert_eq!(stats.frames_captured, 60);
    assert_eq!(sink.frames().len(), 60);
    assert!(sink.is_finished());
    for (i, f) in sink.frames().iter().enumerate() {
        assert_eq!(f.idx, FrameIndex(i as u64));
    }
    assert_eq!(stats.times[1].as_micros(), 33_333);
    assert_eq!(stats.times[59].as_micros(), 1_966_666);
    assert!(stats.times.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(sink.config().unwrap().total_frames, 60);
}

#[test]
fn failed_captures_become_placeholders() {
    let scene = SimulatedScene {
        failing_captures: [3, 4].into_iter().collect(),
        ..Default::default()
    };
    let mut sink = InMemorySink::new();
    let out = run(scene, table(10, 1.0), &quick_opts(), &CancelToken::new(), &mut sink).unwrap();
    let DriverOutcome::Completed(stats) = out else {
        panic!("expected completion");
    };
    assert_eq!(stats.placeholders, 2);
    assert_eq!(sink.frames().len(), 10);
    assert!(sink.frames()[3].placeholder);
    assert!(!sink.frames()[5].placeholder);
}

#[test]
fn cancellation_aborts_the_sink() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut sink = InMemorySink::new();
    let out = run(
        SimulatedScene::default(),
        table(30, 2.0),
        &quick_opts(),
        &cancel,
        &mut sink,
    )
    .unwrap();
    assert!(matches!(out, DriverOutcome::Cancelled(ref s) if s.frames_captured == 0));
    assert!(sink.is_aborted());
    assert!(!sink.is_finished());
}

#[test]
fn slow_sink_bounds_in_flight_frames() {
    let opts = DriverOpts {
        channel_capacity: 2,
        ..quick_opts()
    };
    let mut sink = InMemorySink::with_push_delay(Duration::from_millis(5));
    let out = run(
        SimulatedScene::default(),
        table(30, 1.0),
        &opts,
        &CancelToken::new(),
        &mut sink,
    )
    .unwrap();
    let DriverOutcome::Completed(stats) = out else {
        panic!("expected completion");
    };
    assert!(stats.max_in_flight <= 3, "{}", stats.max_in_flight);
    assert_eq!(sink.frames().len(), 30);
}

#[test]
fn progress_walks_the_stages_in_order() {
    let events = Mutex::new(Vec::new());
    let progress = |e: &ProgressEvent| events.lock().unwrap().push(e.clone());
    let mut host = SimulatedHost::new(SimulatedScene::default(), canvas());
    let mut sink = InMemorySink::new();
    let opts = quick_opts();
    let cancel = CancelToken::new();
    let mut driver = FrameDriver::new(&mut host, table(10, 1.0), canvas(), &opts, &progress, &cancel);
    assert_eq!(driver.state(), DriverState::Idle);
    driver.run(&mut sink).unwrap();
    assert_eq!(driver.state(), DriverState::Done);

    let events = events.into_inner().unwrap();
    let stages: Vec<_> = events.iter().map(|e| e.stage).collect();
    assert!(stages.windows(2).all(|w| w[0] <= w[1]), "{stages:?}");
    assert_eq!(stages.first(), Some(&Stage::Preparing));
    assert_eq!(stages.last(), Some(&Stage::Finalizing));
    assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
}

#[test]
fn runs_are_deterministic() {
    let scene = SimulatedScene {
        tick_every_ms: Some(40),
        ..Default::default()
    };
    let mut a = InMemorySink::new();
    let mut b = InMemorySink::new();
    let opts = quick_opts();
    let sa = run(scene.clone(), table(24, 1.0), &opts, &CancelToken::new(), &mut a).unwrap();
    let sb = run(scene, table(24, 1.0), &opts, &CancelToken::new(), &mut b).unwrap();
    let (DriverOutcome::Completed(sa), DriverOutcome::Completed(sb)) = (sa, sb) else {
        panic!("expected completion");
    };
    assert_eq!(sa.digests, sb.digests);
    assert_eq!(a.frames(), b.frames());
}

struct FailingSink;

impl FrameSink for FailingSink {
    fn begin(&mut self, _cfg: SinkConfig) -> CastResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, frame: &EncodedFrame) -> CastResult<()> {
        if frame.idx.0 == 2 {
            return Err(CastError::encode("disk full"));
        }
        Ok(())
    }

    fn end(&mut self) -> CastResult<()> {
        Ok(())
    }
}

#[test]
fn encoder_errors_surface_over_channel_errors() {
    let mut host = SimulatedHost::new(SimulatedScene::default(), canvas());
    let opts = quick_opts();
    let cancel = CancelToken::new();
    let progress = |_: &ProgressEvent| {};
    let mut driver = FrameDriver::new(&mut host, table(30, 1.0), canvas(), &opts, &progress, &cancel);
    let err = driver.run(&mut FailingSink).unwrap_err();
    assert!(err.to_string().contains("disk full"), "{err}");
    assert_eq!(driver.state(), DriverState::Failed);
}
