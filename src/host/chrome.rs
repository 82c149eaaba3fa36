//! Headless Chrome scene host.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport};
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};

use crate::config::ChromeOpts;
use crate::foundation::core::{Canvas, VirtualTime};
use crate::foundation::error::{CastError, CastResult};
use crate::host::{CaptureTarget, FrameFormat, HostFactory, SceneHost, TargetRect};
use crate::runtime::gate::{ReadinessCaps, ReadinessReport};
use crate::runtime::sync::{AnimationSynchronizer, SyncReport};

/// One browser process with one tab holding the scene.
pub struct ChromeHost {
    // Dropping the browser kills the process.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeHost {
    /// Launch a browser and load `document` at a `canvas`-sized viewport.
    pub fn launch(opts: &ChromeOpts, document: &Path, canvas: Canvas) -> CastResult<Self> {
        let browser = launch_browser(opts, Some((canvas.width, canvas.height)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| CastError::environment(format!("failed to open a browser tab: {e:#}")))?;
        tab.set_default_timeout(opts.page_load_timeout());

        let abs = document
            .canonicalize()
            .with_context(|| format!("resolve scene document '{}'", document.display()))?;
        let url = format!("file://{}", abs.display());
        tab.navigate_to(&url)
            .and_then(|t| t.wait_until_navigated())
            .with_context(|| format!("load scene document '{url}'"))?;

        let host = Self {
            _browser: browser,
            tab,
        };
        let installed =
            host.evaluate("!!(window.__scenecast && window.__scenecast.seek)", false)?;
        if installed != serde_json::Value::Bool(true) {
            return Err(CastError::environment(
                "scene runtime is missing from the loaded document",
            ));
        }
        Ok(host)
    }

    /// Evaluate `expr` in the scene page and return its JSON value.
    pub fn evaluate(&self, expr: &str, await_promise: bool) -> CastResult<serde_json::Value> {
        let remote = self
            .tab
            .evaluate(expr, await_promise)
            .with_context(|| format!("evaluate `{}`", short(expr)))?;
        Ok(remote.value.unwrap_or(serde_json::Value::Null))
    }

    fn eval_string(&self, expr: &str, await_promise: bool) -> CastResult<String> {
        runtime_string(expr, self.evaluate(expr, await_promise)?)
    }
}

// Runtime calls answer with JSON text; anything else means the injected runtime is broken.
fn runtime_string(expr: &str, value: serde_json::Value) -> CastResult<String> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        other => Err(CastError::environment(format!(
            "scene runtime call `{}` returned {other} instead of a string",
            short(expr)
        ))),
    }
}

fn launch_browser(opts: &ChromeOpts, window: Option<(u32, u32)>) -> CastResult<Browser> {
    let args = opts.launch_args();
    let launch = LaunchOptionsBuilder::default()
        .headless(true)
        .sandbox(false)
        .path(opts.executable.clone())
        .window_size(window)
        .idle_browser_timeout(Duration::from_secs(600))
        .args(args.iter().map(OsStr::new).collect())
        .build()
        .map_err(|e| CastError::environment(format!("invalid browser launch options: {e}")))?;
    Browser::new(launch)
        .map_err(|e| CastError::environment(format!("failed to launch headless Chrome: {e:#}")))
}

fn short(expr: &str) -> &str {
    let end = expr
        .char_indices()
        .nth(60)
        .map(|(i, _)| i)
        .unwrap_or(expr.len());
    &expr[..end]
}

impl SceneHost for ChromeHost {
    fn set_capture_mode(&mut self, on: bool) -> CastResult<()> {
        self.evaluate(&format!("window.__scenecast.setCaptureMode({on})"), false)?;
        Ok(())
    }

    fn lock_target(&mut self, target: &CaptureTarget, canvas: Canvas) -> CastResult<TargetRect> {
        let selectors = serde_json::Value::from(target.selectors.clone());
        let json = self.eval_string(
            &format!(
                "window.__scenecast.lockTarget({selectors}, {}, {})",
                canvas.width, canvas.height
            ),
            false,
        )?;
        TargetRect::from_json_str(&json)
    }

    fn sync_to(&mut self, t: VirtualTime) -> CastResult<SyncReport> {
        let json = self.eval_string(&AnimationSynchronizer::seek_expr(t), false)?;
        SyncReport::from_json_str(&json)
    }

    fn await_ready(&mut self, caps: &ReadinessCaps) -> CastResult<ReadinessReport> {
        let json = self.eval_string(&caps.script(), true)?;
        ReadinessReport::from_json_str(&json)
    }

    fn capture(
        &mut self,
        rect: &TargetRect,
        format: FrameFormat,
        quality: u8,
    ) -> CastResult<Vec<u8>> {
        let (fmt, quality) = match format {
            FrameFormat::Jpeg => (
                CaptureScreenshotFormatOption::Jpeg,
                Some(u32::from(quality.clamp(1, 100))),
            ),
            FrameFormat::Png => (CaptureScreenshotFormatOption::Png, None),
        };
        let clip = Viewport {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            scale: 1.0,
        };
        self.tab
            .capture_screenshot(fmt, quality, Some(clip), true)
            .map_err(|e| CastError::capture(format!("screenshot of '{}' failed: {e:#}", rect.selector)))
    }

    fn resume_animations(&mut self) -> CastResult<()> {
        self.evaluate("window.__scenecast.resume()", false)?;
        Ok(())
    }
}

/// Launches one [`ChromeHost`] per job.
#[derive(Clone, Debug)]
pub struct ChromeHostFactory {
    opts: ChromeOpts,
}

impl ChromeHostFactory {
    /// Factory using `opts` for every launch.
    pub fn new(opts: ChromeOpts) -> Self {
        Self { opts }
    }

    /// Launch and immediately close a browser.
    pub fn probe(&self) -> CastResult<()> {
        let browser = launch_browser(&self.opts, None)?;
        let version = browser
            .get_version()
            .map_err(|e| CastError::environment(format!("browser did not answer: {e:#}")))?;
        tracing::debug!(product = %version.product, "browser available");
        Ok(())
    }
}

impl HostFactory for ChromeHostFactory {
    fn name(&self) -> &'static str {
        "chrome"
    }

    fn open(&self, document: &Path, canvas: Canvas) -> CastResult<Box<dyn SceneHost>> {
        Ok(Box::new(ChromeHost::launch(&self.opts, document, canvas)?))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/host/chrome.rs"]
mod tests;
