use super::*;

fn request() -> RenderRequest {
    RenderRequest {
        scene_markup: "<div class=\"reel-container\">hi</div>".to_string(),
        ..Default::default()
    }
}

#[test]
fn defaults_validate() {
    let plan = request().validate(&RenderLimits::default()).unwrap();
    assert_eq!(plan.canvas, Canvas { width: 1080, height: 1920 });
    assert_eq!(plan.timetable.len(), 450);
    assert_eq!(plan.clamped_from_secs, None);
    assert!(plan.clamp_notice().is_none());
}

#[test]
fn over_long_duration_is_clamped_and_reported() {
    let limits = RenderLimits {
        max_duration_secs: 20,
        ..Default::default()
    };
    let plan = RenderRequest {
        duration_secs: 60.0,
        ..request()
    }
    .validate(&limits)
    .unwrap();
    assert_eq!(plan.duration_secs, 20.0);
    assert_eq!(plan.clamped_from_secs, Some(60.0));
    assert_eq!(plan.timetable.len(), 600);
    assert!(plan.clamp_notice().unwrap().contains("60s"));

    let plan = RenderRequest {
        duration_secs: 999.0,
        ..request()
    }
    .validate(&limits)
    .unwrap();
    assert_eq!(plan.timetable.len(), 600);
}

#[test]
fn out_of_range_values_are_config_errors() {
    let limits = RenderLimits::default();
    for bad in [
        RenderRequest {
            frame_rate: 0,
            ..request()
        },
        RenderRequest {
            frame_rate: 61,
            ..request()
        },
        RenderRequest {
            duration_secs: 0.5,
            ..request()
        },
        RenderRequest {
            duration_secs: f64::NAN,
            ..request()
        },
        RenderRequest {
            resolution: Resolution::Custom {
                width: 1081,
                height: 1920,
            },
            ..request()
        },
        RenderRequest {
            scene_markup: "   ".to_string(),
            ..request()
        },
    ] {
        let err = bad.validate(&limits).unwrap_err();
        assert!(matches!(err, CastError::Config(_)), "{err}");
    }
}

#[test]
fn markup_size_is_bounded() {
    let limits = RenderLimits {
        max_markup_bytes: 16,
        ..Default::default()
    };
    let err = RenderRequest {
        scene_markup: "x".repeat(17),
        ..request()
    }
    .validate(&limits)
    .unwrap_err();
    assert!(err.to_string().contains("17 bytes"));
}

#[test]
fn parses_front_end_field_names() {
    let req = RenderRequest::from_json_str(
        r#"{
            "html": "<h1>hello</h1>",
            "css": "h1 { color: red }",
            "js": "console.log(1)",
            "resolution": "Square",
            "format": "GIF",
            "duration": 5,
            "fps": 24,
            "quality": "medium"
        }"#,
    )
    .unwrap();
    assert_eq!(req.scene_markup, "<h1>hello</h1>");
    assert_eq!(req.resolution.canvas(), Canvas { width: 1080, height: 1080 });
    assert_eq!(req.output_format, OutputFormat::Gif);
    assert_eq!(req.quality_tier, QualityTier::Medium);
    assert_eq!(req.frame_rate, 24);
    assert_eq!(req.duration_secs, 5.0);
}

#[test]
fn parses_custom_resolution() {
    let req = RenderRequest::from_json_str(
        r#"{ "html": "<p/>", "resolution": { "width": 640, "height": 360 } }"#,
    )
    .unwrap();
    assert_eq!(req.resolution.canvas(), Canvas { width: 640, height: 360 });
    assert_eq!(req.frame_rate, 30);
}
