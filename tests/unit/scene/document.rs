use super::*;

fn request() -> RenderRequest {
    RenderRequest {
        scene_markup: "<div class=\"reel-container\"><h1>Hi</h1></div>".to_string(),
        style_sheet: "h1 { color: gold; }".to_string(),
        script_body: "document.querySelector('h1').textContent = 'Hey';".to_string(),
        ..Default::default()
    }
}

#[test]
fn runtime_runs_before_scene_code() {
    let doc = SceneDocument::build(&request(), "window.__runtime = 1;");
    let html = doc.as_str();
    let runtime = html.find("window.__runtime = 1;").unwrap();
    let markup = html.find("reel-container").unwrap();
    let script = html.find("textContent = 'Hey'").unwrap();
    assert!(runtime < html.find("</head>").unwrap());
    assert!(runtime < markup && markup < script);
}

#[test]
fn scene_script_is_wrapped() {
    let doc = SceneDocument::build(&request(), "");
    assert!(doc.as_str().contains("try {\ndocument.querySelector"));
    assert!(doc.as_str().contains("scene script error"));
}

#[test]
fn style_follows_reset_and_capture_mode_rules() {
    let html = SceneDocument::build(&request(), "").as_str().to_string();
    let reset = html.find("box-sizing: border-box").unwrap();
    let capture = html.find("html.capture-mode *").unwrap();
    let user = html.find("h1 { color: gold; }").unwrap();
    assert!(reset < capture && capture < user);
}

#[test]
fn closing_tags_inside_code_are_escaped() {
    let req = RenderRequest {
        script_body: "var s = '</SCRIPT><b>x</b>';".to_string(),
        style_sheet: "/* </style> */".to_string(),
        ..request()
    };
    let html = SceneDocument::build(&req, "").as_str().to_string();
    assert!(html.contains("'<\\/SCRIPT><b>x</b>'"));
    assert!(html.contains("/* <\\/style> */"));
    assert_eq!(html.matches("</script>").count(), 2);
}

#[test]
fn writes_index_html() {
    let dir = std::env::temp_dir().join(format!("scenecast-doc-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = SceneDocument::build(&request(), "").write_to(&dir).unwrap();
    assert_eq!(path.file_name().unwrap(), DOCUMENT_FILE_NAME);
    assert!(std::fs::read_to_string(&path).unwrap().contains("reel-container"));
    std::fs::remove_dir_all(&dir).unwrap();
}
