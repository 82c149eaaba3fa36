use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CastError::config("x")
            .to_string()
            .contains("configuration error:")
    );
    assert!(
        CastError::environment("x")
            .to_string()
            .contains("environment error:")
    );
    assert!(CastError::capture("x").to_string().contains("capture error:"));
    assert!(CastError::timeline("x").to_string().contains("timeline error:"));
    assert!(CastError::encode("x").to_string().contains("encode error:"));
    assert!(
        CastError::resource_exhausted("x")
            .to_string()
            .contains("resource exhausted:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CastError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn only_capture_errors_are_recoverable() {
    assert!(CastError::capture("raster failed").is_recoverable());
    assert!(!CastError::encode("exit 1").is_recoverable());
    assert!(!CastError::environment("no chrome").is_recoverable());
    assert!(!CastError::timeline("backwards").is_recoverable());
}

#[test]
fn oom_stderr_becomes_resource_exhausted() {
    let err = classify_encoder_failure("exit status: 1", "x264 [error]: malloc of size 123 failed\nCannot allocate memory");
    assert!(matches!(err, CastError::ResourceExhausted(_)));
    assert!(err.user_message().contains("shorter duration"));

    let err = classify_encoder_failure("exit status: 137", "Aborted (OOM)");
    assert!(matches!(err, CastError::ResourceExhausted(_)));
}

#[test]
fn generic_failures_stay_encode_errors() {
    let err = classify_encoder_failure("exit status: 1", "pipe:0: Invalid data found when processing input");
    assert!(matches!(err, CastError::Encode(_)));
    assert!(err.to_string().contains("Invalid data"));

    // "room" must not be mistaken for an out-of-memory marker.
    let err = classify_encoder_failure("exit status: 1", "no room left in buffer");
    assert!(matches!(err, CastError::Encode(_)));
}
