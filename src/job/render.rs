//! Job execution.
//!
//! `start_render` validates a request synchronously, registers a job and runs it on its own
//! thread with an isolated work directory, scene host and encoder session.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::capture::driver::{DriverOpts, DriverOutcome, FrameDriver};
use crate::config::{EncodeStrategy, EngineConfig};
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, ensure_parent_dir};
use crate::encode::gif::transcode_gif;
use crate::encode::params::EncodeParams;
use crate::encode::parts::{FfmpegPartEncoder, PartsSink};
use crate::encode::sink::FrameSink;
use crate::encode::workdir::JobWorkDir;
use crate::foundation::error::{CastError, CastResult};
use crate::host::{CaptureTarget, HostFactory};
use crate::job::progress::{CancelToken, ProgressSink, Stage};
use crate::job::registry::{JobRegistry, Subscription};
use crate::runtime::sync::AnimationSynchronizer;
use crate::scene::document::SceneDocument;
use crate::scene::request::{OutputFormat, RenderRequest, RenderPlan};

/// Metadata of a finished output file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderOutput {
    /// File name inside the output directory.
    pub file_name: String,
    /// Full path.
    pub path: PathBuf,
    /// Container format.
    pub format: OutputFormat,
    /// File size in bytes.
    pub byte_size: u64,
    /// Frames captured.
    pub frames: u64,
    /// Frames substituted after capture failures.
    pub placeholders: u64,
    /// Requested duration when it was clamped.
    pub clamped_from_secs: Option<f64>,
}

/// Terminal result of a job that did not fail.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderOutcome {
    /// Output written.
    Completed(RenderOutput),
    /// Stopped on request; nothing was written.
    Cancelled,
}

/// `video_<job>_<unix-ms>.<ext>`.
pub fn output_file_name(job_id: &str, format: OutputFormat, at: SystemTime) -> String {
    let ms = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("video_{job_id}_{ms}.{}", format.extension())
}

/// Deletes a path on drop unless kept.
struct OutputGuard {
    path: Option<PathBuf>,
}

impl OutputGuard {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Everything a job needs besides its request.
#[derive(Clone)]
pub struct JobContext {
    /// Engine configuration.
    pub config: Arc<EngineConfig>,
    /// Scene host provider.
    pub hosts: Arc<dyn HostFactory>,
    /// Animation probes injected into every scene.
    pub sync: Arc<AnimationSynchronizer>,
}

/// Run one validated job to a terminal outcome.
///
/// Scratch files are removed on every path out of this function; the output file only survives
/// a completed run.
#[tracing::instrument(skip_all, fields(job = %job_id))]
pub fn execute(
    ctx: &JobContext,
    job_id: &str,
    plan: &RenderPlan,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> CastResult<RenderOutcome> {
    let cfg = &ctx.config;
    progress.report(Stage::Starting, "setting up scene", 5.0);
    if let Some(notice) = plan.clamp_notice() {
        warn!(%notice, "duration clamped");
        progress.report(Stage::Starting, &notice, 5.0);
    }

    let work = JobWorkDir::create(&cfg.temp_root, job_id)?;
    let payload = crate::runtime::payload(&ctx.sync);
    let doc_path = SceneDocument::build(&plan.request, &payload).write_to(work.path())?;
    let mut host = ctx.hosts.open(&doc_path, plan.canvas)?;

    let format = plan.request.output_format;
    let file_name = output_file_name(job_id, format, SystemTime::now());
    let out_path = cfg.output_dir.join(&file_name);
    ensure_parent_dir(&out_path)?;
    let out_guard = OutputGuard::new(&out_path);
    let video_path = match format {
        OutputFormat::Mp4 => out_path.clone(),
        OutputFormat::Gif => work.join("intermediate.mp4"),
    };

    let total = plan.timetable.len();
    let params = EncodeParams::for_tier(plan.request.quality_tier);
    let strategy = cfg.encoder.resolve_strategy(total);
    info!(
        host = ctx.hosts.name(),
        frames = total,
        fps = %plan.fps.to_ffmpeg_rate(),
        size = %plan.canvas.to_ffmpeg_size(),
        ?strategy,
        %format,
        "render started"
    );
    let mut sink: Box<dyn FrameSink> = match strategy {
        EncodeStrategy::Parts => Box::new(PartsSink::new(
            Box::new(FfmpegPartEncoder::new(&cfg.encoder.ffmpeg, params)),
            work.path(),
            &video_path,
            plan.timetable.frames_per_part(cfg.encoder.seconds_per_part),
        )),
        EncodeStrategy::Direct | EncodeStrategy::Auto => Box::new(FfmpegSink::new(FfmpegSinkOpts {
            ffmpeg: cfg.encoder.ffmpeg.clone(),
            out_path: video_path.clone(),
            params,
        })),
    };

    let opts = DriverOpts {
        target: CaptureTarget::default(),
        readiness: cfg.readiness.clone(),
        frame_format: cfg.encoder.frame_format,
        jpeg_quality: cfg.encoder.jpeg_quality,
        channel_capacity: cfg.encoder.channel_capacity,
    };
    let outcome = FrameDriver::new(
        host.as_mut(),
        plan.timetable,
        plan.canvas,
        &opts,
        progress,
        cancel,
    )
    .run(sink.as_mut())?;
    drop(sink);
    drop(host);

    let stats = match outcome {
        DriverOutcome::Cancelled(stats) => {
            info!(frames = stats.frames_captured, "render cancelled");
            work.remove()?;
            return Ok(RenderOutcome::Cancelled);
        }
        DriverOutcome::Completed(stats) => stats,
    };

    if format == OutputFormat::Gif {
        progress.report(Stage::Finalizing, "building GIF palette", 96.0);
        transcode_gif(
            &cfg.encoder.ffmpeg,
            &cfg.encoder.gif,
            plan.fps,
            plan.canvas.width,
            &video_path,
            &out_path,
        )?;
    }

    let byte_size = std::fs::metadata(&out_path)
        .with_context(|| format!("stat output '{}'", out_path.display()))?
        .len();
    if byte_size == 0 {
        return Err(CastError::encode("encoder produced an empty file"));
    }
    work.remove()?;
    out_guard.keep();

    info!(
        frames = stats.frames_captured,
        placeholders = stats.placeholders,
        scene_errors = stats.scene_errors,
        max_in_flight = stats.max_in_flight,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        byte_size,
        "render complete"
    );
    Ok(RenderOutcome::Completed(RenderOutput {
        file_name,
        path: out_path,
        format,
        byte_size,
        frames: stats.frames_captured,
        placeholders: stats.placeholders,
        clamped_from_secs: plan.clamped_from_secs,
    }))
}

/// Accepts render requests and runs each as an independent job.
#[derive(Clone)]
pub struct JobRunner {
    ctx: JobContext,
    registry: JobRegistry,
}

impl JobRunner {
    /// Runner over `hosts` with the standard animation probes.
    pub fn new(config: EngineConfig, hosts: Arc<dyn HostFactory>) -> Self {
        let registry = JobRegistry::new(config.job_grace());
        Self {
            ctx: JobContext {
                config: Arc::new(config),
                hosts,
                sync: Arc::new(AnimationSynchronizer::standard()),
            },
            registry,
        }
    }

    /// Replace the animation probes.
    pub fn with_synchronizer(mut self, sync: AnimationSynchronizer) -> Self {
        self.ctx.sync = Arc::new(sync);
        self
    }

    /// Job registry shared by every job of this runner.
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Validate `request` and start it on a new thread.
    ///
    /// Configuration errors are returned here and no job is created. Finished jobs that have
    /// been idle for the grace period are forgotten first.
    pub fn start_render(&self, request: RenderRequest) -> CastResult<JobHandle> {
        sweep(&self.registry);
        let plan = request.validate(&self.ctx.config.limits)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.registry.create(&id);
        let cancel = CancelToken::new();

        let ctx = self.ctx.clone();
        let registry = self.registry.clone();
        let job_id = id.clone();
        let job_cancel = cancel.clone();
        let thread = std::thread::Builder::new()
            .name(format!("render-{}", &id[..8]))
            .spawn(move || {
                let progress = registry.progress_for(&job_id);
                let res = execute(&ctx, &job_id, &plan, &progress, &job_cancel);
                match &res {
                    Ok(RenderOutcome::Completed(out)) => {
                        let msg = plan
                            .clamp_notice()
                            .unwrap_or_else(|| format!("saved {}", out.file_name));
                        registry.complete(&job_id, out.clone(), &msg);
                    }
                    Ok(RenderOutcome::Cancelled) => {
                        progress.report(Stage::Cancelled, "cancelled", 0.0);
                    }
                    Err(e) => {
                        error!(job = %job_id, error = %e, "render failed");
                        progress.report(Stage::Error, &e.user_message(), 0.0);
                    }
                }
                sweep(&registry);
                res
            })
            .context("spawn render thread")?;

        Ok(JobHandle {
            id,
            cancel,
            registry: self.registry.clone(),
            thread: Some(thread),
        })
    }
}

fn sweep(registry: &JobRegistry) {
    let removed = registry.collect_garbage(Instant::now());
    if removed > 0 {
        debug!(removed, remaining = registry.len(), "forgot idle finished jobs");
    }
}

/// Handle to a running job.
pub struct JobHandle {
    id: String,
    cancel: CancelToken,
    registry: JobRegistry,
    thread: Option<JoinHandle<CastResult<RenderOutcome>>>,
}

impl JobHandle {
    /// Job id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ask the job to stop after its current frame.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Listen to the job's progress.
    pub fn subscribe(&self) -> Option<Subscription> {
        self.registry.subscribe(&self.id)
    }

    /// Wait for the job to end.
    pub fn join(mut self) -> CastResult<RenderOutcome> {
        let thread = self
            .thread
            .take()
            .ok_or_else(|| CastError::config("job was already joined"))?;
        thread
            .join()
            .map_err(|_| CastError::Other(anyhow::anyhow!("render thread panicked")))?
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/render.rs"]
mod tests;
