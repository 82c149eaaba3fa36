//! Virtual clock.
//!
//! The scene side is [`CLOCK_JS`], injected ahead of every scene script. [`VirtualClock`] is the
//! same pending-work model in Rust; the in-process host drives scene work through it, and it is
//! the reference the injected script is tested against.

use crate::foundation::core::VirtualTime;
use crate::foundation::error::{CastError, CastResult};

/// Injected clock payload. Installs the read-only `window.__scenecast.clock`; advancing and
/// releasing it is handed once to the sync layer.
pub const CLOCK_JS: &str = include_str!("js/clock.js");

/// Identifier handed back by the scheduling calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// What kind of deferred work an entry is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// Fires once after a delay.
    Timeout,
    /// Fires repeatedly; rescheduled at `due + period`.
    Interval {
        /// Repeat period.
        period: VirtualTime,
    },
    /// "Next paint" callback, due at the time it was requested.
    Frame,
}

#[derive(Debug)]
struct Pending<T> {
    id: TaskId,
    kind: TaskKind,
    due: VirtualTime,
    seq: u64,
    payload: T,
}

/// Result of one [`VirtualClock::advance`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Callbacks that ran (including ones that failed).
    pub executed: usize,
    /// Failure messages from callbacks, tagged with the task id.
    pub errors: Vec<String>,
}

/// Explicitly advanced clock holding tagged pending work.
///
/// Time never moves on its own. `advance(t)` snapshots every entry due at or before `t`, runs the
/// snapshot in `(due, scheduling order)` order and returns. Work scheduled by a callback during
/// the advance is never run by that same advance.
#[derive(Debug)]
pub struct VirtualClock<T> {
    now: VirtualTime,
    next_id: u64,
    seq: u64,
    pending: Vec<Pending<T>>,
    cancelled_in_batch: Vec<TaskId>,
}

impl<T> Default for VirtualClock<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> VirtualClock<T> {
    /// A clock reading zero with nothing pending.
    pub fn new() -> Self {
        Self {
            now: VirtualTime::ZERO,
            next_id: 1,
            seq: 0,
            pending: Vec::new(),
            cancelled_in_batch: Vec::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Number of entries waiting to fire.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Schedule `payload` once, `delay` after now.
    pub fn set_timeout(&mut self, delay: VirtualTime, payload: T) -> TaskId {
        let due = VirtualTime(self.now.0.saturating_add(delay.0));
        self.push(TaskKind::Timeout, due, payload)
    }

    /// Schedule `payload` every `period`, first at `now + period`.
    pub fn set_interval(&mut self, period: VirtualTime, payload: T) -> TaskId {
        let due = VirtualTime(self.now.0.saturating_add(period.0));
        self.push(TaskKind::Interval { period }, due, payload)
    }

    /// Schedule `payload` for the next advance.
    pub fn request_frame(&mut self, payload: T) -> TaskId {
        self.push(TaskKind::Frame, self.now, payload)
    }

    /// Drop a pending entry. Also suppresses it if it is part of the batch currently running.
    pub fn cancel(&mut self, id: TaskId) {
        self.pending.retain(|p| p.id != id);
        self.cancelled_in_batch.push(id);
    }

    fn push(&mut self, kind: TaskKind, due: VirtualTime, payload: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.pending.push(Pending {
            id,
            kind,
            due,
            seq: self.seq,
            payload,
        });
        self.seq += 1;
        id
    }
}

impl<T: Clone> VirtualClock<T> {
    /// Move to `to` and run everything due.
    ///
    /// `run` receives the clock itself, so callbacks may schedule or cancel work. A callback
    /// error is recorded in the report and the advance carries on.
    pub fn advance<F>(&mut self, to: VirtualTime, mut run: F) -> CastResult<AdvanceReport>
    where
        F: FnMut(&mut Self, TaskId, &T) -> Result<(), String>,
    {
        if to < self.now {
            return Err(CastError::timeline(format!(
                "virtual time must not decrease: {to} < {}",
                self.now
            )));
        }
        self.now = to;

        let (mut due, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| p.due <= to);
        self.pending = rest;
        due.sort_by_key(|p| (p.due, p.seq));

        for p in &due {
            if let TaskKind::Interval { period } = p.kind {
                let next = VirtualTime(p.due.0.saturating_add(period.0));
                self.pending.push(Pending {
                    id: p.id,
                    kind: p.kind,
                    due: next,
                    seq: self.seq,
                    payload: p.payload.clone(),
                });
                self.seq += 1;
            }
        }

        self.cancelled_in_batch.clear();
        let mut report = AdvanceReport::default();
        for p in &due {
            if self.cancelled_in_batch.contains(&p.id) {
                continue;
            }
            report.executed += 1;
            if let Err(e) = run(self, p.id, &p.payload) {
                report.errors.push(format!("task#{}: {e}", p.id.0));
            }
        }
        self.cancelled_in_batch.clear();
        Ok(report)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/clock.rs"]
mod tests;
