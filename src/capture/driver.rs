//! Frame driver.
//!
//! Walks the timetable one frame at a time: seek, wait for readiness, capture, hand off. Capture
//! and encoding overlap across a bounded channel; nothing else runs in parallel because every
//! frame mutates the same scene.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::capture::placeholder::render_placeholder;
use crate::capture::timetable::FrameTimetable;
use crate::encode::sink::{EncodedFrame, FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, FrameIndex, VirtualTime};
use crate::foundation::error::{CastError, CastResult};
use crate::host::{CaptureTarget, FrameFormat, SceneHost, TargetRect};
use crate::job::progress::{CancelToken, ProgressSink, Stage};
use crate::runtime::gate::ReadinessCaps;
use crate::runtime::sync::SyncReport;

/// Progress range covered by the frame loop.
const CAPTURE_PERCENT: (f32, f32) = (10.0, 90.0);

/// Knobs of one driver run.
#[derive(Clone, Debug)]
pub struct DriverOpts {
    /// Element to rasterize.
    pub target: CaptureTarget,
    /// Readiness gate bounds.
    pub readiness: ReadinessCaps,
    /// Compressed frame format.
    pub frame_format: FrameFormat,
    /// JPEG quality.
    pub jpeg_quality: u8,
    /// Frames allowed between capture and the encoder before capture blocks.
    pub channel_capacity: usize,
}

impl Default for DriverOpts {
    fn default() -> Self {
        Self {
            target: CaptureTarget::default(),
            readiness: ReadinessCaps::default(),
            frame_format: FrameFormat::Jpeg,
            jpeg_quality: 90,
            channel_capacity: 4,
        }
    }
}

/// Where the driver is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// Not started.
    Idle,
    /// Capture mode on, first readiness pass.
    Preparing,
    /// Working on a frame.
    Capturing(FrameIndex),
    /// Tearing down.
    Finalizing,
    /// Finished (completed or cancelled).
    Done,
    /// Stopped by an error.
    Failed,
}

/// What a driver run observed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptureStats {
    /// Frames handed to the encoder.
    pub frames_captured: u64,
    /// Frames replaced by a placeholder after a capture failure.
    pub placeholders: u64,
    /// Virtual time of every frame, in order.
    pub times: Vec<VirtualTime>,
    /// xxh3 digest of every frame's bytes, in order.
    pub digests: Vec<u64>,
    /// Scene callback failures caught while seeking.
    pub scene_errors: u64,
    /// Frames whose readiness pass was released by a cap.
    pub degraded_frames: u64,
    /// Most frames captured but not yet accepted by the sink, at any point.
    pub max_in_flight: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// How a driver run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum DriverOutcome {
    /// Every frame was captured and the sink finalized.
    Completed(CaptureStats),
    /// Cancellation was observed; the sink was aborted.
    Cancelled(CaptureStats),
}

enum EncoderMsg {
    Frame(EncodedFrame),
    Finish,
}

/// Drives one scene through its timetable into a sink.
pub struct FrameDriver<'a> {
    host: &'a mut dyn SceneHost,
    timetable: FrameTimetable,
    canvas: Canvas,
    opts: &'a DriverOpts,
    progress: &'a dyn ProgressSink,
    cancel: &'a CancelToken,
    state: DriverState,
    // Sync already applied at this time during preparing; consumed by the matching frame.
    primed: Option<(VirtualTime, SyncReport)>,
}

impl<'a> FrameDriver<'a> {
    /// Driver over an already loaded `host`.
    pub fn new(
        host: &'a mut dyn SceneHost,
        timetable: FrameTimetable,
        canvas: Canvas,
        opts: &'a DriverOpts,
        progress: &'a dyn ProgressSink,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            host,
            timetable,
            canvas,
            opts,
            progress,
            cancel,
            state: DriverState::Idle,
            primed: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Run the whole timetable into `sink`.
    ///
    /// Per-frame capture failures become placeholders. Any other failure stops the run, aborts
    /// the sink and is returned.
    pub fn run(&mut self, sink: &mut dyn FrameSink) -> CastResult<DriverOutcome> {
        let started = Instant::now();
        let res = self.run_inner(sink, started);
        match &res {
            Ok(_) => self.state = DriverState::Done,
            Err(e) => {
                self.state = DriverState::Failed;
                if let Err(te) = self.host.set_capture_mode(false) {
                    debug!(error = %te, "capture mode teardown after failure also failed");
                }
                debug!(error = %e, "frame driver failed");
            }
        }
        res
    }

    fn run_inner(
        &mut self,
        sink: &mut dyn FrameSink,
        started: Instant,
    ) -> CastResult<DriverOutcome> {
        self.state = DriverState::Preparing;
        self.progress
            .report(Stage::Preparing, "preparing scene", CAPTURE_PERCENT.0);
        self.host.set_capture_mode(true)?;
        let rect = self.host.lock_target(&self.opts.target, self.canvas)?;
        debug!(selector = %rect.selector, width = rect.width, height = rect.height, "capture target locked");
        self.host.await_ready(&self.opts.readiness)?;
        let report = self.host.sync_to(VirtualTime::ZERO)?;
        self.primed = Some((VirtualTime::ZERO, report));

        let cfg = SinkConfig {
            width: self.canvas.width,
            height: self.canvas.height,
            fps: self.timetable.fps(),
            frame_format: self.opts.frame_format,
            total_frames: self.timetable.len(),
        };
        let cap = self.opts.channel_capacity.max(1);
        let consumed = AtomicU64::new(0);
        let mut stats = CaptureStats::default();

        let (produced, finished) = std::thread::scope(|scope| {
            let (tx, rx) = mpsc::sync_channel::<EncoderMsg>(cap);
            let consumed = &consumed;

            let enc = scope.spawn(move || -> CastResult<bool> {
                sink.begin(cfg)?;
                loop {
                    match rx.recv() {
                        Ok(EncoderMsg::Frame(frame)) => {
                            if let Err(e) = sink.push_frame(&frame) {
                                sink.abort();
                                return Err(e);
                            }
                            consumed.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(EncoderMsg::Finish) => {
                            if let Err(e) = sink.end() {
                                sink.abort();
                                return Err(e);
                            }
                            return Ok(true);
                        }
                        // Producer stopped without finishing: cancellation or failure.
                        Err(_) => {
                            sink.abort();
                            return Ok(false);
                        }
                    }
                }
            });

            let produced = self.produce(&rect, &tx, consumed, &mut stats);
            if matches!(produced, Ok(Produced::AllFrames)) {
                self.state = DriverState::Finalizing;
                self.progress
                    .report(Stage::Encoding, "finishing encode", CAPTURE_PERCENT.1);
                let _ = tx.send(EncoderMsg::Finish);
            }
            drop(tx);
            let finished = enc
                .join()
                .map_err(|_| CastError::encode("encoder thread panicked"));
            (produced, finished)
        });

        let finished = finished?;
        let produced = match (produced, finished) {
            (Err(_), Err(enc_err)) => return Err(enc_err),
            (Err(e), Ok(_)) => return Err(e),
            (Ok(_), Err(enc_err)) => return Err(enc_err),
            (Ok(p), Ok(done)) => {
                if p == Produced::AllFrames && !done {
                    return Err(CastError::encode("encoder stopped before the last frame"));
                }
                p
            }
        };

        self.state = DriverState::Finalizing;
        self.progress
            .report(Stage::Finalizing, "restoring scene", 95.0);
        self.host.set_capture_mode(false)?;
        stats.elapsed = started.elapsed();

        match produced {
            Produced::AllFrames => {
                self.host.resume_animations()?;
                Ok(DriverOutcome::Completed(stats))
            }
            Produced::Cancelled => Ok(DriverOutcome::Cancelled(stats)),
        }
    }

    fn produce(
        &mut self,
        rect: &TargetRect,
        tx: &mpsc::SyncSender<EncoderMsg>,
        consumed: &AtomicU64,
        stats: &mut CaptureStats,
    ) -> CastResult<Produced> {
        let total = self.timetable.len();
        let (lo, hi) = CAPTURE_PERCENT;
        for (idx, time) in self.timetable.entries() {
            if self.cancel.is_cancelled() {
                debug!(frame = idx.0, "cancellation observed");
                return Ok(Produced::Cancelled);
            }
            self.state = DriverState::Capturing(idx);

            // Each advance moves strictly forward; frame 0 reuses the preparing seek.
            let sync = match self.primed.take() {
                Some((at, report)) if at == time => report,
                _ => self.host.sync_to(time)?,
            };
            for err in &sync.errors {
                warn!(frame = idx.0, time = %time, error = %err, "scene callback failed");
            }
            stats.scene_errors += sync.errors.len() as u64;

            let ready = self.host.await_ready(&self.opts.readiness)?;
            if ready.degraded() {
                debug!(frame = idx.0, ?ready, "readiness released by a cap");
                stats.degraded_frames += 1;
            }

            let (bytes, placeholder) =
                match self
                    .host
                    .capture(rect, self.opts.frame_format, self.opts.jpeg_quality)
                {
                    Ok(bytes) => (bytes, false),
                    Err(e) if e.is_recoverable() => {
                        warn!(frame = idx.0, error = %e, "capture failed, substituting placeholder");
                        let bytes = render_placeholder(
                            self.canvas,
                            idx,
                            self.opts.frame_format,
                            self.opts.jpeg_quality,
                        )?;
                        (bytes, true)
                    }
                    Err(e) => return Err(e),
                };

            stats.digests.push(xxhash_rust::xxh3::xxh3_64(&bytes));
            stats.times.push(time);
            stats.placeholders += u64::from(placeholder);

            tx.send(EncoderMsg::Frame(EncodedFrame {
                idx,
                time,
                bytes,
                placeholder,
            }))
            .map_err(|_| CastError::encode("encoder thread is not accepting frames"))?;
            stats.frames_captured += 1;
            let in_flight = stats
                .frames_captured
                .saturating_sub(consumed.load(Ordering::SeqCst));
            stats.max_in_flight = stats.max_in_flight.max(in_flight);

            let done = idx.0 + 1;
            let percent = lo + (hi - lo) * (done as f32 / total as f32);
            self.progress.report(
                Stage::Capturing,
                &format!("captured frame {done}/{total}"),
                percent,
            );
        }
        Ok(Produced::AllFrames)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Produced {
    AllFrames,
    Cancelled,
}

#[cfg(test)]
#[path = "../../tests/unit/capture/driver.rs"]
mod tests;
