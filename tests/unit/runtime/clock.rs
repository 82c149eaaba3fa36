use super::*;

fn ms(v: u64) -> VirtualTime {
    VirtualTime::from_millis(v)
}

#[test]
fn starts_at_zero_and_never_moves_on_its_own() {
    let mut clock = VirtualClock::<&str>::new();
    assert_eq!(clock.now(), VirtualTime::ZERO);
    clock.set_timeout(ms(10), "a");
    assert_eq!(clock.now(), VirtualTime::ZERO);
    assert_eq!(clock.pending_len(), 1);
}

#[test]
fn runs_due_work_in_time_order() {
    let mut clock = VirtualClock::new();
    clock.set_timeout(ms(30), "late");
    clock.set_timeout(ms(10), "early");
    clock.set_timeout(ms(10), "early-second");
    clock.set_timeout(ms(100), "future");

    let mut seen = Vec::new();
    let report = clock
        .advance(ms(50), |_, _, p| {
            seen.push(*p);
            Ok(())
        })
        .unwrap();
    assert_eq!(seen, ["early", "early-second", "late"]);
    assert_eq!(report.executed, 3);
    assert_eq!(clock.pending_len(), 1);
}

#[test]
fn intervals_reschedule_at_due_plus_period() {
    let mut clock = VirtualClock::new();
    clock.set_interval(ms(10), "tick");
    let mut fired = 0;
    for t in [5, 10, 15, 20, 45] {
        let r = clock.advance(ms(t), |_, _, _| Ok(())).unwrap();
        fired += r.executed;
    }
    // 10, 20, then one catch-up at 30 when jumping to 45.
    assert_eq!(fired, 3);
    let r = clock.advance(ms(45), |_, _, _| Ok(())).unwrap();
    assert_eq!(r.executed, 1);
}

#[test]
fn callback_failures_do_not_abort_the_advance() {
    let mut clock = VirtualClock::new();
    clock.set_timeout(ms(1), 1);
    clock.set_timeout(ms(2), 2);
    clock.set_timeout(ms(3), 3);
    let mut ran = Vec::new();
    let report = clock
        .advance(ms(5), |_, _, p| {
            ran.push(*p);
            if *p == 2 { Err("boom".to_string()) } else { Ok(()) }
        })
        .unwrap();
    assert_eq!(ran, [1, 2, 3]);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("boom"));
}

#[test]
fn going_backwards_is_rejected() {
    let mut clock = VirtualClock::<()>::new();
    clock.advance(ms(100), |_, _, _| Ok(())).unwrap();
    let err = clock.advance(ms(99), |_, _, _| Ok(())).unwrap_err();
    assert!(matches!(err, CastError::Timeline(_)));
    assert!(clock.advance(ms(100), |_, _, _| Ok(())).is_ok());
}

#[test]
fn frame_callbacks_scheduled_during_advance_wait_for_the_next_one() {
    let mut clock = VirtualClock::new();
    clock.request_frame(0u32);
    let mut depth = Vec::new();
    for t in [16, 33, 50] {
        clock
            .advance(ms(t), |c, _, p| {
                depth.push(*p);
                c.request_frame(p + 1);
                Ok(())
            })
            .unwrap();
    }
    assert_eq!(depth, [0, 1, 2]);
}

#[test]
fn cancel_within_a_batch_suppresses_later_entries() {
    let mut clock = VirtualClock::new();
    clock.set_timeout(ms(1), "canceller");
    let victim = clock.set_timeout(ms(2), "victim");
    let mut ran = Vec::new();
    clock
        .advance(ms(10), |c, _, p| {
            ran.push(*p);
            if *p == "canceller" {
                c.cancel(victim);
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(ran, ["canceller"]);
}

#[test]
fn cancelled_interval_stops_repeating() {
    let mut clock = VirtualClock::new();
    let id = clock.set_interval(ms(10), ());
    let r = clock.advance(ms(10), |_, _, _| Ok(())).unwrap();
    assert_eq!(r.executed, 1);
    clock.cancel(id);
    let r = clock.advance(ms(100), |_, _, _| Ok(())).unwrap();
    assert_eq!(r.executed, 0);
    assert_eq!(clock.pending_len(), 0);
}
