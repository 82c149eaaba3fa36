use super::*;

fn canvas() -> Canvas {
    Canvas {
        width: 64,
        height: 36,
    }
}

fn ms(v: u64) -> VirtualTime {
    VirtualTime::from_millis(v)
}

fn quick_caps() -> ReadinessCaps {
    ReadinessCaps {
        font_timeout_ms: 20,
        image_timeout_ms: 30,
        paint_cycles: 0,
        paint_timeout_ms: 0,
        settle_delay_ms: 0,
    }
}

#[test]
fn same_time_captures_are_identical() {
    let mut a = SimulatedHost::new(SimulatedScene::default(), canvas());
    let mut b = SimulatedHost::new(SimulatedScene::default(), canvas());
    let rect = TargetRect::full(canvas());
    a.sync_to(ms(500)).unwrap();
    b.sync_to(ms(250)).unwrap();
    b.sync_to(ms(500)).unwrap();
    let fa = a.capture(&rect, FrameFormat::Png, 0).unwrap();
    let fb = b.capture(&rect, FrameFormat::Png, 0).unwrap();
    assert_eq!(fa, fb);

    a.sync_to(ms(540)).unwrap();
    assert_ne!(a.capture(&rect, FrameFormat::Png, 0).unwrap(), fa);
}

#[test]
fn scene_timers_follow_virtual_time() {
    let scene = SimulatedScene {
        tick_every_ms: Some(100),
        ..Default::default()
    };
    let mut host = SimulatedHost::new(scene, canvas());
    host.sync_to(ms(99)).unwrap();
    assert_eq!(host.ticks(), 0);
    let report = host.sync_to(ms(100)).unwrap();
    assert_eq!(report.executed, 1);
    host.sync_to(ms(1_000)).unwrap();
    // One batch per seek: 200 fires here, the rest stay due.
    assert_eq!(host.ticks(), 2);
}

#[test]
fn throwing_timers_are_reported_not_fatal() {
    let scene = SimulatedScene {
        throw_at_ms: vec![10],
        ..Default::default()
    };
    let mut host = SimulatedHost::new(scene, canvas());
    let report = host.sync_to(ms(33)).unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("threw"));
    assert!(host.sync_to(ms(66)).unwrap().errors.is_empty());
}

#[test]
fn injected_capture_failures() {
    let scene = SimulatedScene {
        failing_captures: [1].into_iter().collect(),
        ..Default::default()
    };
    let mut host = SimulatedHost::new(scene, canvas());
    let rect = TargetRect::full(canvas());
    assert!(host.capture(&rect, FrameFormat::Jpeg, 80).is_ok());
    let err = host.capture(&rect, FrameFormat::Jpeg, 80).unwrap_err();
    assert!(err.is_recoverable());
    assert!(host.capture(&rect, FrameFormat::Jpeg, 80).is_ok());
}

#[test]
fn stuck_resources_release_at_their_caps() {
    let scene = SimulatedScene {
        images: vec![None, Some(0)],
        fonts_stuck: true,
        ..Default::default()
    };
    let mut host = SimulatedHost::new(scene, canvas());
    let caps = quick_caps();
    let started = Instant::now();
    let report = host.await_ready(&caps).unwrap();
    let took = started.elapsed();
    assert_eq!(report.images, 2);
    assert_eq!(report.images_timed_out, 1);
    assert_eq!(report.fonts, FontState::Timeout);
    assert!(took >= Duration::from_millis(50));
    assert!(took < caps.total_bound() + Duration::from_millis(500));
}

#[test]
fn seeking_after_resume_is_rejected() {
    let mut host = SimulatedHost::new(SimulatedScene::default(), canvas());
    host.resume_animations().unwrap();
    assert!(host.sync_to(ms(1)).is_err());
}

#[test]
fn factory_requires_a_document_and_journals_calls() {
    let factory = SimulatedHostFactory::new(SimulatedScene::default());
    let missing = std::env::temp_dir().join("scenecast-missing-doc.html");
    assert!(matches!(
        factory.open(&missing, canvas()),
        Err(CastError::Environment(_))
    ));

    let doc = std::env::temp_dir().join(format!("scenecast-sim-{}.html", std::process::id()));
    std::fs::write(&doc, "<p>hi</p>").unwrap();
    let mut host = factory.open(&doc, canvas()).unwrap();
    host.set_capture_mode(true).unwrap();
    host.sync_to(ms(0)).unwrap();
    std::fs::remove_file(&doc).unwrap();

    assert_eq!(
        factory.journal(),
        [HostEvent::CaptureMode(true), HostEvent::Seek(VirtualTime::ZERO)]
    );

    let unavailable = SimulatedHostFactory::new(SimulatedScene {
        unavailable: true,
        ..Default::default()
    });
    assert!(unavailable.open(&missing, canvas()).is_err());
}
