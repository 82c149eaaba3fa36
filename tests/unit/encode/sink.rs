use super::*;

fn frame(i: u64) -> EncodedFrame {
    EncodedFrame {
        idx: FrameIndex(i),
        time: VirtualTime::from_millis(i * 100),
        bytes: vec![i as u8; 4],
        placeholder: false,
    }
}

#[test]
fn order_check_rejects_gaps_and_repeats() {
    let mut order = OrderCheck::default();
    order.accept(FrameIndex(0)).unwrap();
    order.accept(FrameIndex(1)).unwrap();
    assert!(order.accept(FrameIndex(3)).is_err());
    assert!(order.accept(FrameIndex(1)).is_err());
    assert_eq!(order.received(), 2);
    order.reset();
    order.accept(FrameIndex(0)).unwrap();
}

#[test]
fn in_memory_sink_requires_begin_and_clears_on_abort() {
    let mut sink = InMemorySink::new();
    assert!(sink.push_frame(&frame(0)).is_err());

    sink.begin(SinkConfig {
        width: 4,
        height: 2,
        fps: Fps::whole(10).unwrap(),
        frame_format: FrameFormat::Png,
        total_frames: 2,
    })
    .unwrap();
    sink.push_frame(&frame(0)).unwrap();
    sink.push_frame(&frame(1)).unwrap();
    assert_eq!(sink.frames().len(), 2);
    assert_eq!(sink.config().unwrap().total_frames, 2);

    sink.abort();
    assert!(sink.is_aborted());
    assert!(!sink.is_finished());
    assert!(sink.frames().is_empty());
}
