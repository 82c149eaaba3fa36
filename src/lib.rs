//! scenecast renders HTML/CSS/JS scenes into video, frame by frame, on a virtual clock.
//!
//! A job goes through these steps:
//!
//! - Validate a [`RenderRequest`] into a [`RenderPlan`]
//! - Build a [`SceneDocument`] with the page runtime injected ahead of the scene
//! - Drive a [`SceneHost`] through the [`FrameTimetable`] with a [`FrameDriver`]
//! - Stream every frame into a [`FrameSink`] (ffmpeg pipe or part-then-concat)
//!
//! [`JobRunner`] wraps these steps behind job ids, progress subscriptions and cancellation.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Frame schedule, driver and placeholders.
pub mod capture;
/// Engine configuration.
pub mod config;
/// Encoder adapters.
pub mod encode;
/// Scene hosts (headless Chrome, in-process simulation).
pub mod host;
/// Jobs, progress and cancellation.
pub mod job;
/// Page-side runtime scripts.
pub mod runtime;
/// Render requests and scene documents.
pub mod scene;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange, VirtualTime};
pub use crate::foundation::error::{CastError, CastResult};

pub use crate::capture::driver::{CaptureStats, DriverOpts, DriverOutcome, FrameDriver};
pub use crate::capture::timetable::FrameTimetable;
pub use crate::config::{EncodeStrategy, EngineConfig};
pub use crate::encode::sink::{EncodedFrame, FrameSink, InMemorySink, SinkConfig};
pub use crate::host::{FrameFormat, HostFactory, SceneHost};
pub use crate::job::progress::{CancelToken, ProgressEvent, ProgressSink, Stage};
pub use crate::job::registry::{JobRegistry, JobSnapshot, Subscription};
pub use crate::job::render::{JobHandle, JobRunner, RenderOutcome, RenderOutput};
pub use crate::runtime::sync::AnimationSynchronizer;
pub use crate::scene::document::SceneDocument;
pub use crate::scene::request::{OutputFormat, QualityTier, RenderRequest, RenderPlan, Resolution};
