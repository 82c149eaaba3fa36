//! Explicit job registry.
//!
//! Holds the live state of every job, fans updates out to listeners and forgets finished jobs
//! once nobody has listened to them for a grace period.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::job::progress::{ProgressEvent, ProgressSink, Stage};
use crate::job::render::RenderOutput;

/// Point-in-time view of one job.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobSnapshot {
    /// Job id.
    pub id: String,
    /// Current stage.
    pub stage: Stage,
    /// Completion, 0-100.
    pub percent: f32,
    /// Latest message.
    pub message: String,
    /// Output metadata once complete.
    pub output: Option<RenderOutput>,
}

struct Listener {
    id: u64,
    tx: mpsc::Sender<JobSnapshot>,
}

struct JobEntry {
    snapshot: JobSnapshot,
    listeners: Vec<Listener>,
    idle_since: Option<Instant>,
}

impl JobEntry {
    fn fan_out(&mut self) {
        let snap = &self.snapshot;
        self.listeners.retain(|l| l.tx.send(snap.clone()).is_ok());
        if self.snapshot.stage.is_terminal() && self.listeners.is_empty() {
            self.idle_since.get_or_insert_with(Instant::now);
        }
    }
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, JobEntry>,
    next_listener: u64,
}

/// Shared registry handle. Clones refer to the same registry.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<Mutex<Inner>>,
    grace: Duration,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.len())
            .field("grace", &self.grace)
            .finish()
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobRegistry {
    /// Registry keeping idle finished jobs for `grace`.
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Arc::default(),
            grace,
        }
    }

    /// Register `id` in the `Waiting` stage.
    pub fn create(&self, id: &str) {
        let mut inner = lock(&self.inner);
        inner.jobs.insert(
            id.to_string(),
            JobEntry {
                snapshot: JobSnapshot {
                    id: id.to_string(),
                    stage: Stage::Waiting,
                    percent: 0.0,
                    message: "waiting".to_string(),
                    output: None,
                },
                listeners: Vec::new(),
                idle_since: None,
            },
        );
    }

    /// Apply a progress update and notify listeners. Terminal states are final.
    pub fn update(&self, id: &str, event: &ProgressEvent) {
        let mut inner = lock(&self.inner);
        let Some(entry) = inner.jobs.get_mut(id) else {
            return;
        };
        if entry.snapshot.stage.is_terminal() {
            return;
        }
        entry.snapshot.stage = event.stage;
        entry.snapshot.percent = event.percent;
        entry.snapshot.message.clone_from(&event.message);
        entry.fan_out();
    }

    /// Mark `id` complete with `output`.
    pub fn complete(&self, id: &str, output: RenderOutput, message: &str) {
        let mut inner = lock(&self.inner);
        let Some(entry) = inner.jobs.get_mut(id) else {
            return;
        };
        if entry.snapshot.stage.is_terminal() {
            return;
        }
        entry.snapshot.stage = Stage::Complete;
        entry.snapshot.percent = 100.0;
        entry.snapshot.message = message.to_string();
        entry.snapshot.output = Some(output);
        entry.fan_out();
    }

    /// Current state of `id`.
    pub fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        lock(&self.inner).jobs.get(id).map(|e| e.snapshot.clone())
    }

    /// Listen to `id`. The current state is delivered immediately.
    pub fn subscribe(&self, id: &str) -> Option<Subscription> {
        let mut inner = lock(&self.inner);
        let listener_id = inner.next_listener;
        inner.next_listener += 1;
        let entry = inner.jobs.get_mut(id)?;
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(entry.snapshot.clone());
        entry.listeners.push(Listener {
            id: listener_id,
            tx,
        });
        entry.idle_since = None;
        Some(Subscription {
            job_id: id.to_string(),
            listener_id,
            rx,
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Drop finished jobs that have had no listeners for the grace period, as of `now`.
    ///
    /// Returns how many were removed.
    pub fn collect_garbage(&self, now: Instant) -> usize {
        let grace = self.grace;
        let mut inner = lock(&self.inner);
        let before = inner.jobs.len();
        inner.jobs.retain(|_, e| {
            let expired = e.snapshot.stage.is_terminal()
                && e.listeners.is_empty()
                && e.idle_since
                    .is_some_and(|since| now.saturating_duration_since(since) >= grace);
            !expired
        });
        before - inner.jobs.len()
    }

    /// Number of jobs held.
    pub fn len(&self) -> usize {
        lock(&self.inner).jobs.len()
    }

    /// `true` when no jobs are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Progress sink feeding updates for `id` into this registry.
    pub fn progress_for(&self, id: &str) -> JobProgress {
        JobProgress {
            registry: self.clone(),
            id: id.to_string(),
        }
    }
}

/// A listener on one job. Dropping it unsubscribes.
pub struct Subscription {
    job_id: String,
    listener_id: u64,
    rx: mpsc::Receiver<JobSnapshot>,
    registry: Weak<Mutex<Inner>>,
}

impl Subscription {
    /// Job this subscription listens to.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Next update, waiting up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<JobSnapshot> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Every update already delivered.
    pub fn drain(&self) -> Vec<JobSnapshot> {
        self.rx.try_iter().collect()
    }

    /// Block until the job reaches a terminal stage or `timeout` passes without an update.
    pub fn wait_terminal(&self, timeout: Duration) -> Option<JobSnapshot> {
        while let Some(snap) = self.recv_timeout(timeout) {
            if snap.stage.is_terminal() {
                return Some(snap);
            }
        }
        None
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let mut inner = lock(&inner);
        if let Some(entry) = inner.jobs.get_mut(&self.job_id) {
            entry.listeners.retain(|l| l.id != self.listener_id);
            if entry.listeners.is_empty() && entry.snapshot.stage.is_terminal() {
                entry.idle_since.get_or_insert_with(Instant::now);
            }
        }
    }
}

/// [`ProgressSink`] writing into a [`JobRegistry`].
#[derive(Clone, Debug)]
pub struct JobProgress {
    registry: JobRegistry,
    id: String,
}

impl ProgressSink for JobProgress {
    fn report(&self, stage: Stage, message: &str, percent: f32) {
        self.registry.update(
            &self.id,
            &ProgressEvent {
                stage,
                percent: percent.clamp(0.0, 100.0),
                message: message.to_string(),
            },
        );
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/registry.rs"]
mod tests;
