use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::CastResult;
use crate::scene::request::RenderRequest;

const RESET_CSS: &str = "\
* { margin: 0; padding: 0; box-sizing: border-box; }
html, body {
  margin: 0;
  padding: 0;
  overflow: hidden;
  background: #000;
  font-family: 'Noto Sans Arabic', 'Noto Sans', 'Noto Color Emoji', sans-serif;
}
";

// Backdrop blur does not survive the surface capture; capture mode turns it off.
const CAPTURE_MODE_CSS: &str = "\
html.capture-mode *,
html.capture-mode [class*=\"glass\"],
html.capture-mode [class*=\"blur\"] {
  backdrop-filter: none !important;
  -webkit-backdrop-filter: none !important;
}
";

/// File name used inside a job work directory.
pub const DOCUMENT_FILE_NAME: &str = "index.html";

/// A complete HTML page ready to load into a scene host.
///
/// The runtime payload is the first script in `<head>`, so it runs before anything the scene
/// ships. The scene script runs last, wrapped so that a throwing scene still renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneDocument {
    html: String,
}

impl SceneDocument {
    /// Assemble the page for `request` with `payload` as the runtime.
    pub fn build(request: &RenderRequest, payload: &str) -> Self {
        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
<script>\n{runtime}\n</script>\n\
<style>\n{RESET_CSS}{CAPTURE_MODE_CSS}{style}\n</style>\n\
</head>\n<body>\n{markup}\n\
<script>\ntry {{\n{script}\n}} catch (e) {{\n  console.error('scene script error:', e);\n}}\n</script>\n\
</body>\n</html>\n",
            runtime = escape_script(payload),
            style = escape_style(&request.style_sheet),
            markup = request.scene_markup,
            script = escape_script(&request.script_body),
        );
        Self { html }
    }

    /// Page source.
    pub fn as_str(&self) -> &str {
        &self.html
    }

    /// Write the page as `index.html` under `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> CastResult<PathBuf> {
        let path = dir.join(DOCUMENT_FILE_NAME);
        std::fs::write(&path, &self.html)
            .with_context(|| format!("write scene document '{}'", path.display()))?;
        Ok(path)
    }
}

/// Keep inline script text from closing its own element.
fn escape_script(src: &str) -> String {
    escape_close_tag(src, "</script")
}

fn escape_style(src: &str) -> String {
    escape_close_tag(src, "</style")
}

fn escape_close_tag(src: &str, tag: &str) -> String {
    let lower = src.to_ascii_lowercase();
    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    for (i, _) in lower.match_indices(tag) {
        out.push_str(&src[last..i]);
        out.push_str("<\\/");
        last = i + 2;
    }
    out.push_str(&src[last..]);
    out
}

#[cfg(test)]
#[path = "../../tests/unit/scene/document.rs"]
mod tests;
