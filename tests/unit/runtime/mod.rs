use super::*;

#[test]
fn payload_installs_clock_before_everything_else() {
    let p = payload(&AnimationSynchronizer::standard());
    let clock = p.find("sc.clock = Object.freeze({").unwrap();
    let hooks = p.find("window.registerAnimation").unwrap();
    let gate = p.find("sc.ready = function").unwrap();
    let seek = p.find("sc.seek = function").unwrap();
    assert!(clock < hooks && hooks < gate && gate < seek);
}

#[test]
fn payload_never_closes_a_script_element() {
    let p = payload(&AnimationSynchronizer::standard());
    assert!(!p.to_ascii_lowercase().contains("</script"));
}
