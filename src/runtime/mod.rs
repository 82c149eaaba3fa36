//! Page-side runtime: the scripts injected into every scene document and their Rust mirrors.

pub mod clock;
/// Per-frame readiness gate.
pub mod gate;
pub mod sync;

use self::sync::AnimationSynchronizer;

/// Scene-facing hooks (`registerAnimation`, capture mode, target locking).
pub const HOOKS_JS: &str = include_str!("js/hooks.js");

/// Full runtime payload. Must run before any scene script.
pub fn payload(sync: &AnimationSynchronizer) -> String {
    [clock::CLOCK_JS, HOOKS_JS, gate::GATE_JS, &sync.script()].join("\n")
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/mod.rs"]
mod tests;
