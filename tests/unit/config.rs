use super::*;

#[test]
fn defaults_mirror_deployment_defaults() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.limits.max_fps, 60);
    assert_eq!(cfg.limits.max_duration_secs, 60);
    assert_eq!(cfg.limits.max_markup_bytes, 500_000);
    assert_eq!(cfg.encoder.seconds_per_part, 4);
    assert_eq!(cfg.encoder.strategy, EncodeStrategy::Direct);
    assert_eq!(cfg.job_grace(), Duration::from_secs(60));
    assert!(cfg.validate().is_ok());
}

#[test]
fn partial_json_keeps_defaults() {
    let cfg = EngineConfig::from_json_str(
        r#"{ "limits": { "max_duration_secs": 20 }, "encoder": { "strategy": "auto" } }"#,
    )
    .unwrap();
    assert_eq!(cfg.limits.max_duration_secs, 20);
    assert_eq!(cfg.limits.max_fps, 60);
    assert_eq!(cfg.encoder.strategy, EncodeStrategy::Auto);
    assert_eq!(cfg.encoder.channel_capacity, 4);
}

#[test]
fn malformed_json_is_a_serde_error() {
    let err = EngineConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, CastError::Serde(_)));
}

#[test]
fn env_overrides_apply() {
    let mut cfg = EngineConfig::default();
    cfg.apply_vars(|key| match key {
        "MAX_DURATION" => Some("20".to_string()),
        "MAX_FPS" => Some("30".to_string()),
        "FFMPEG_PATH" => Some("/opt/ffmpeg/bin/ffmpeg".to_string()),
        "CHROMIUM_PATH" => Some(String::new()),
        _ => None,
    })
    .unwrap();
    assert_eq!(cfg.limits.max_duration_secs, 20);
    assert_eq!(cfg.limits.max_fps, 30);
    assert_eq!(cfg.encoder.ffmpeg, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    assert_eq!(cfg.chrome.executable, None);
}

#[test]
fn env_overrides_reject_garbage() {
    let mut cfg = EngineConfig::default();
    let err = cfg
        .apply_vars(|key| (key == "MAX_FPS").then(|| "fast".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains("MAX_FPS"));

    let err = cfg
        .apply_vars(|key| (key == "MAX_DURATION").then(|| "0".to_string()))
        .unwrap_err();
    assert!(matches!(err, CastError::Config(_)));
}

#[test]
fn auto_strategy_switches_on_threshold() {
    let opts = EncoderOpts {
        strategy: EncodeStrategy::Auto,
        parts_threshold_frames: 600,
        ..Default::default()
    };
    assert_eq!(opts.resolve_strategy(600), EncodeStrategy::Direct);
    assert_eq!(opts.resolve_strategy(601), EncodeStrategy::Parts);

    let direct = EncoderOpts::default();
    assert_eq!(direct.resolve_strategy(1_000_000), EncodeStrategy::Direct);
}

#[test]
fn launch_args_append_extras() {
    let opts = ChromeOpts {
        extra_args: vec!["--lang=ar".to_string()],
        ..Default::default()
    };
    let args = opts.launch_args();
    assert!(args.iter().any(|a| a == "--disable-gpu"));
    assert_eq!(args.last().map(String::as_str), Some("--lang=ar"));
}
