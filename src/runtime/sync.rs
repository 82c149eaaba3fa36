//! Animation synchronizer.
//!
//! An ordered list of capability probes. Each probe is a `(detect, apply)` pair of page-side
//! snippets; every seek runs the clock advance and then, in order, `apply(t)` of every probe
//! whose `detect` holds. An absent subsystem is skipped.

use serde::Deserialize;

use crate::foundation::core::VirtualTime;
use crate::foundation::error::{CastError, CastResult};

/// One animation subsystem the synchronizer knows how to pin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncProbe {
    /// Short name, reported back in [`SyncReport::applied`].
    pub name: String,
    /// JS expression, truthy when the subsystem is present.
    pub detect: String,
    /// JS function body; `t` is the virtual time in milliseconds.
    pub apply: String,
    /// JS function body that hands the subsystem back to real time.
    pub resume: Option<String>,
}

impl SyncProbe {
    /// Probe without a resume step.
    pub fn new(
        name: impl Into<String>,
        detect: impl Into<String>,
        apply: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            detect: detect.into(),
            apply: apply.into(),
            resume: None,
        }
    }

    /// Attach a resume step.
    pub fn with_resume(mut self, resume: impl Into<String>) -> Self {
        self.resume = Some(resume.into());
        self
    }
}

const CALLBACKS_APPLY: &str = r#"
sc.callbacks.forEach(function (cb) {
  try { cb(t); } catch (e) { sc.clock.noteError('registerAnimation', e); }
});"#;

const CSS_APPLY: &str = r#"
var els = document.querySelectorAll('*');
for (var i = 0; i < els.length; i++) {
  var el = els[i];
  var st = getComputedStyle(el);
  if (!st.animationName || st.animationName === 'none') continue;
  var saved = sc.cssSaved.get(el);
  if (!saved) {
    saved = {
      delays: st.animationDelay.split(',').map(sc.cssTime),
      inlineDelay: el.style.animationDelay,
      inlinePlayState: el.style.animationPlayState,
    };
    sc.cssSaved.set(el, saved);
    sc.cssList.push(el);
  }
  el.style.animationPlayState = 'paused';
  el.style.animationDelay = saved.delays
    .map(function (d) { return (d - t / 1000) + 's'; })
    .join(', ');
}
if (typeof document.getAnimations === 'function' && typeof CSSAnimation !== 'undefined') {
  document.getAnimations().forEach(function (a) {
    if (a instanceof CSSAnimation) a.currentTime = 0;
  });
}"#;

const CSS_RESUME: &str = r#"
sc.cssList.forEach(function (el) {
  var saved = sc.cssSaved.get(el);
  if (!saved) return;
  el.style.animationDelay = saved.inlineDelay;
  el.style.animationPlayState = saved.inlinePlayState;
  sc.cssSaved.delete(el);
});
sc.cssList = [];"#;

const TWEEN_APPLY: &str = r#"
gsap.globalTimeline.pause();
gsap.globalTimeline.seek(t / 1000, false);"#;

const VECTOR_APPLY: &str = r#"
sc.lottiePlayers().forEach(function (anim) {
  var fr = anim.frameRate || (anim.animationData && anim.animationData.fr) || 30;
  anim.goToAndStop((t * fr) / 1000, true);
});"#;

const VECTOR_RESUME: &str = r#"
sc.lottiePlayers().forEach(function (anim) { anim.play(); });"#;

const NATIVE_APPLY: &str = r#"
document.getAnimations().forEach(function (a) {
  if (typeof CSSAnimation !== 'undefined' && a instanceof CSSAnimation) return;
  if (typeof CSSTransition !== 'undefined' && a instanceof CSSTransition) return;
  a.pause();
  a.currentTime = t;
});"#;

const NATIVE_RESUME: &str = r#"
document.getAnimations().forEach(function (a) {
  if (typeof CSSAnimation !== 'undefined' && a instanceof CSSAnimation) return;
  if (typeof CSSTransition !== 'undefined' && a instanceof CSSTransition) return;
  a.play();
});"#;

/// Ordered probe list plus the page-side `seek`/`resume` it generates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationSynchronizer {
    probes: Vec<SyncProbe>,
}

impl Default for AnimationSynchronizer {
    fn default() -> Self {
        Self::standard()
    }
}

impl AnimationSynchronizer {
    /// No probes; a seek only advances the clock.
    pub fn empty() -> Self {
        Self { probes: Vec::new() }
    }

    /// Registered callbacks, CSS animations, the gsap timeline, lottie players and the native
    /// animation timeline, in that order.
    pub fn standard() -> Self {
        Self {
            probes: vec![
                SyncProbe::new("callbacks", "sc.callbacks.length > 0", CALLBACKS_APPLY),
                SyncProbe::new("css", "!!document.body", CSS_APPLY).with_resume(CSS_RESUME),
                SyncProbe::new(
                    "tween",
                    "!!(window.gsap && window.gsap.globalTimeline)",
                    TWEEN_APPLY,
                )
                .with_resume("gsap.globalTimeline.resume();"),
                SyncProbe::new("vector", "sc.lottiePlayers().length > 0", VECTOR_APPLY)
                    .with_resume(VECTOR_RESUME),
                SyncProbe::new(
                    "native",
                    "typeof document.getAnimations === 'function'",
                    NATIVE_APPLY,
                )
                .with_resume(NATIVE_RESUME),
            ],
        }
    }

    /// Append a probe; it runs after every existing one.
    pub fn push(&mut self, probe: SyncProbe) -> &mut Self {
        self.probes.push(probe);
        self
    }

    /// Probes in application order.
    pub fn probes(&self) -> &[SyncProbe] {
        &self.probes
    }

    /// Page-side script installing `__scenecast.seek`, `__scenecast.resume` and the
    /// `seekToTime`/`resumeAnimations` globals. Needs the clock and hooks payloads first.
    pub fn script(&self) -> String {
        let mut out = String::from(SYNC_PRELUDE);
        for p in &self.probes {
            let name = serde_json::Value::from(p.name.as_str());
            out.push_str(&format!(
                "  probes.push({{\n    name: {name},\n    detect: function () {{ return ({}); }},\n    apply: function (t) {{{}\n    }},\n    resume: function () {{{}\n    }},\n  }});\n",
                p.detect,
                indent(&p.apply),
                indent(p.resume.as_deref().unwrap_or("")),
            ));
        }
        out.push_str(SYNC_EPILOGUE);
        out
    }

    /// Expression seeking the page to `t`; evaluates to a JSON [`SyncReport`].
    pub fn seek_expr(t: VirtualTime) -> String {
        format!("window.__scenecast.seek({})", t.as_millis_f64())
    }
}

fn indent(body: &str) -> String {
    body.lines()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("\n      {l}")
            }
        })
        .collect()
}

const SYNC_PRELUDE: &str = r#"(function () {
  var sc = window.__scenecast;
  if (sc.seek || !sc.takeClockControl) return;
  var control = sc.takeClockControl();
  sc.lottiePlayers = function () {
    var out = sc.lottie.slice();
    if (window.lottie && typeof window.lottie.getRegisteredAnimations === 'function') {
      window.lottie.getRegisteredAnimations().forEach(function (a) {
        if (out.indexOf(a) < 0) out.push(a);
      });
    }
    return out;
  };
  var probes = [];
"#;

const SYNC_EPILOGUE: &str = r#"  function applyProbes(t) {
    var applied = [];
    probes.forEach(function (p) {
      var present = false;
      try {
        present = !!p.detect();
      } catch (_) {}
      if (!present) return;
      try {
        p.apply(t);
        applied.push(p.name);
      } catch (e) {
        sc.clock.noteError('sync:' + p.name, e);
      }
    });
    return applied;
  }
  sc.seek = function (t) {
    var executed = control.advance(t);
    var applied = applyProbes(sc.clock.now());
    return JSON.stringify({
      nowMs: sc.clock.now(),
      executed: executed,
      applied: applied,
      errors: sc.clock.drainErrors(),
    });
  };
  sc.resume = function () {
    probes.forEach(function (p) {
      try {
        p.resume();
      } catch (e) {
        sc.clock.noteError('resume:' + p.name, e);
      }
    });
    control.release();
    return true;
  };
  window.seekToTime = function (t) {
    return applyProbes(Number(t) || 0);
  };
  window.resumeAnimations = sc.resume;
})();
"#;

/// What one seek did, as reported by the page.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncReport {
    /// Virtual time after the seek, in milliseconds.
    pub now_ms: f64,
    /// Clock callbacks run by the advance.
    pub executed: u32,
    /// Probes that were present and applied, in order.
    pub applied: Vec<String>,
    /// Callback and probe failures caught during the seek.
    pub errors: Vec<String>,
}

impl SyncReport {
    /// Parse the JSON string `seek` returns.
    pub fn from_json_str(s: &str) -> CastResult<Self> {
        serde_json::from_str(s).map_err(|e| CastError::serde(format!("sync report: {e}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/sync.rs"]
mod tests;
