use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Job stage, in pipeline order. `Error` and `Cancelled` are terminal siblings of `Complete`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Accepted, not started.
    Waiting,
    /// Work directory and scene document being set up.
    Starting,
    /// Scene loaded, capture mode and first readiness pass.
    Preparing,
    /// Frame loop running.
    Capturing,
    /// Encoder finishing the container.
    Encoding,
    /// Teardown and output placement.
    Finalizing,
    /// Output ready.
    Complete,
    /// Failed.
    Error,
    /// Stopped on request.
    Cancelled,
}

impl Stage {
    /// `true` for `Complete`, `Error` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Cancelled)
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Starting => "starting",
            Self::Preparing => "preparing",
            Self::Capturing => "capturing",
            Self::Encoding => "encoding",
            Self::Finalizing => "finalizing",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage the job is in.
    pub stage: Stage,
    /// Overall completion, 0-100.
    pub percent: f32,
    /// Human-readable detail.
    pub message: String,
}

/// Receiver of progress updates.
pub trait ProgressSink: Send + Sync {
    /// Record that the job is in `stage` at `percent` (0-100).
    fn report(&self, stage: Stage, message: &str, percent: f32);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn report(&self, stage: Stage, message: &str, percent: f32) {
        self(&ProgressEvent {
            stage,
            percent: percent.clamp(0.0, 100.0),
            message: message.to_string(),
        });
    }
}

/// Progress sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _stage: Stage, _message: &str, _percent: f32) {}
}

/// Cooperative cancellation flag, checked once per frame.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `true` once [`Self::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/progress.rs"]
mod tests;
