use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{CastError, CastResult};

/// Injected readiness gate. Installs `window.__scenecast.ready(caps)`.
pub const GATE_JS: &str = include_str!("js/gate.js");

/// Bounds of the per-frame readiness wait.
///
/// Every wait is capped independently, so the gate always returns within [`Self::total_bound`]
/// even when every awaited resource hangs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessCaps {
    /// Cap on `document.fonts.ready`.
    pub font_timeout_ms: u64,
    /// Cap per image element. Images are awaited concurrently.
    pub image_timeout_ms: u64,
    /// Paint cycles yielded after the DOM update.
    pub paint_cycles: u32,
    /// Cap on each paint cycle (background tabs may never paint).
    pub paint_timeout_ms: u64,
    /// Final real-time settle margin.
    pub settle_delay_ms: u64,
}

impl Default for ReadinessCaps {
    fn default() -> Self {
        Self {
            font_timeout_ms: 5_000,
            image_timeout_ms: 2_000,
            paint_cycles: 3,
            paint_timeout_ms: 100,
            settle_delay_ms: 50,
        }
    }
}

impl ReadinessCaps {
    /// Longest the gate can take with every resource stuck.
    pub fn total_bound(&self) -> Duration {
        let paint = u64::from(self.paint_cycles).saturating_mul(self.paint_timeout_ms);
        Duration::from_millis(
            self.font_timeout_ms
                .saturating_add(self.image_timeout_ms)
                .saturating_add(paint)
                .saturating_add(self.settle_delay_ms),
        )
    }

    /// Expression evaluating to the gate promise for these caps.
    pub fn script(&self) -> String {
        let caps = serde_json::json!({
            "fontTimeoutMs": self.font_timeout_ms,
            "imageTimeoutMs": self.image_timeout_ms,
            "paintCycles": self.paint_cycles,
            "paintTimeoutMs": self.paint_timeout_ms,
            "settleDelayMs": self.settle_delay_ms,
        });
        format!("window.__scenecast.ready({caps})")
    }
}

/// How the font wait ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontState {
    /// Fonts finished loading (or there were none).
    #[default]
    Ready,
    /// The font set reported a load failure.
    Failed,
    /// The cap expired first.
    Timeout,
}

/// What one gate pass observed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReadinessReport {
    /// Font wait outcome.
    pub fonts: FontState,
    /// Image elements present when the gate ran.
    pub images: u32,
    /// Images released by their cap rather than by load/error.
    pub images_timed_out: u32,
}

impl ReadinessReport {
    /// Parse the JSON string the injected gate resolves with.
    pub fn from_json_str(s: &str) -> CastResult<Self> {
        serde_json::from_str(s).map_err(|e| CastError::serde(format!("readiness report: {e}")))
    }

    /// `true` when something was released by a cap.
    pub fn degraded(&self) -> bool {
        self.fonts != FontState::Ready || self.images_timed_out > 0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/gate.rs"]
mod tests;
