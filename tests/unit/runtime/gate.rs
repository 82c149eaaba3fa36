use super::*;

#[test]
fn total_bound_sums_every_cap() {
    let caps = ReadinessCaps::default();
    assert_eq!(caps.total_bound(), Duration::from_millis(5_000 + 2_000 + 300 + 50));
}

#[test]
fn script_passes_caps_in_page_field_names() {
    let s = ReadinessCaps::default().script();
    assert!(s.starts_with("window.__scenecast.ready({"));
    assert!(s.contains("\"imageTimeoutMs\":2000"));
    assert!(s.contains("\"paintCycles\":3"));
}

#[test]
fn report_parses_gate_output() {
    let r = ReadinessReport::from_json_str(r#"{"fonts":"timeout","images":4,"imagesTimedOut":1}"#)
        .unwrap();
    assert_eq!(r.fonts, FontState::Timeout);
    assert_eq!(r.images, 4);
    assert!(r.degraded());
    assert!(!ReadinessReport::default().degraded());
}

#[test]
fn gate_script_uses_the_real_scheduler() {
    assert!(GATE_JS.contains("sc.real.setTimeout"));
    assert!(!GATE_JS.contains("window.setTimeout("));
}
