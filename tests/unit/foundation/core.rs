use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
    assert!(Fps::whole(30).is_ok());
}

#[test]
fn fps_ffmpeg_rate_is_compact_for_whole_rates() {
    assert_eq!(Fps::whole(30).unwrap().to_ffmpeg_rate(), "30");
    assert_eq!(Fps::new(30000, 1001).unwrap().to_ffmpeg_rate(), "30000/1001");
}

#[test]
fn secs_to_frames_floors() {
    let fps = Fps::whole(30).unwrap();
    assert_eq!(fps.secs_to_frames_floor(15.0), 450);
    assert_eq!(fps.secs_to_frames_floor(1.99), 59);
    assert_eq!(fps.secs_to_frames_floor(-1.0), 0);
}

#[test]
fn frame_times_match_fractional_millis() {
    let fps = Fps::whole(30).unwrap();
    assert_eq!(VirtualTime::for_frame(FrameIndex(0), fps), VirtualTime::ZERO);
    assert_eq!(VirtualTime::for_frame(FrameIndex(1), fps).as_micros(), 33_333);
    assert_eq!(VirtualTime::for_frame(FrameIndex(2), fps).as_micros(), 66_666);
    assert_eq!(VirtualTime::for_frame(FrameIndex(59), fps).as_micros(), 1_966_666);
    assert_eq!(VirtualTime::for_frame(FrameIndex(30), fps), VirtualTime::from_millis(1000));
}

#[test]
fn virtual_time_conversions() {
    let t = VirtualTime::from_millis_f64(33.3339);
    assert_eq!(t.as_micros(), 33_333);
    assert!((t.as_millis_f64() - 33.333).abs() < 1e-9);
    assert_eq!(VirtualTime::from_millis_f64(f64::NAN), VirtualTime::ZERO);
    assert_eq!(VirtualTime::from_millis(2).to_string(), "2.000ms");
}

#[test]
fn frame_range_basics() {
    assert!(FrameRange::new(FrameIndex(3), FrameIndex(2)).is_err());
    let r = FrameRange::new(FrameIndex(2), FrameIndex(5)).unwrap();
    assert_eq!(r.len_frames(), 3);
    assert!(r.contains(FrameIndex(4)));
    assert!(!r.contains(FrameIndex(5)));
    assert_eq!(
        r.iter().collect::<Vec<_>>(),
        vec![FrameIndex(2), FrameIndex(3), FrameIndex(4)]
    );
    assert!(FrameRange::new(FrameIndex(1), FrameIndex(1)).unwrap().is_empty());
}
