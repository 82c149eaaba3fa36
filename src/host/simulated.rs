//! In-process scene host.
//!
//! Stands in for a browser in tests and dry runs. Scene work runs on a [`VirtualClock`], frames
//! are a synthetic raster derived only from virtual state, and faults (failing captures, slow or
//! stuck images) can be injected.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::foundation::core::{Canvas, VirtualTime};
use crate::foundation::error::{CastError, CastResult};
use crate::host::{
    CaptureTarget, FrameFormat, HostFactory, SceneHost, TargetRect, encode_raster,
};
use crate::runtime::clock::VirtualClock;
use crate::runtime::gate::{FontState, ReadinessCaps, ReadinessReport};
use crate::runtime::sync::SyncReport;

/// Fault and content knobs for a simulated scene.
#[derive(Clone, Debug, Default)]
pub struct SimulatedScene {
    /// Capture ordinals (0-based, one capture per frame) that fail.
    pub failing_captures: BTreeSet<u64>,
    /// Per image: real milliseconds after load until it settles; `None` never settles.
    pub images: Vec<Option<u64>>,
    /// Real milliseconds after load until webfonts settle; `None` means no webfonts.
    pub font_delay_ms: Option<u64>,
    /// Webfonts never settle.
    pub fonts_stuck: bool,
    /// Scene interval timer period in virtual milliseconds.
    pub tick_every_ms: Option<u64>,
    /// Virtual times (ms) at which a scene timer throws.
    pub throw_at_ms: Vec<u64>,
    /// Real time each capture takes.
    pub capture_cost: Duration,
    /// Refuse to open, as a missing browser would.
    pub unavailable: bool,
}

/// Something the driver asked a simulated host to do.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// `set_capture_mode`.
    CaptureMode(bool),
    /// `lock_target`, with the selector that matched.
    Locked(String),
    /// `sync_to`.
    Seek(VirtualTime),
    /// `await_ready`.
    Ready,
    /// `capture`, at the virtual time the scene was showing.
    Capture(VirtualTime),
    /// `resume_animations`.
    Resumed,
}

#[derive(Clone, Debug)]
enum SimTask {
    Tick,
    Throw(String),
}

/// A simulated scene loaded from a document path.
pub struct SimulatedHost {
    scene: SimulatedScene,
    canvas: Canvas,
    clock: VirtualClock<SimTask>,
    ticks: u64,
    opened_at: Instant,
    captures: u64,
    capture_mode: bool,
    released: bool,
    journal: Arc<Mutex<Vec<HostEvent>>>,
}

impl SimulatedHost {
    /// Load `scene` with a viewport of `canvas`.
    pub fn new(scene: SimulatedScene, canvas: Canvas) -> Self {
        Self::with_journal(scene, canvas, Arc::default())
    }

    fn with_journal(
        scene: SimulatedScene,
        canvas: Canvas,
        journal: Arc<Mutex<Vec<HostEvent>>>,
    ) -> Self {
        let mut clock = VirtualClock::new();
        if let Some(every) = scene.tick_every_ms.filter(|v| *v > 0) {
            clock.set_interval(VirtualTime::from_millis(every), SimTask::Tick);
        }
        for at in &scene.throw_at_ms {
            clock.set_timeout(
                VirtualTime::from_millis(*at),
                SimTask::Throw(format!("scene timer at {at}ms threw")),
            );
        }
        Self {
            scene,
            canvas,
            clock,
            ticks: 0,
            opened_at: Instant::now(),
            captures: 0,
            capture_mode: false,
            released: false,
            journal,
        }
    }

    /// Interval ticks the scene has seen.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn log(&self, event: HostEvent) {
        if let Ok(mut j) = self.journal.lock() {
            j.push(event);
        }
    }

    fn raster(&self) -> image::RgbaImage {
        let (w, h) = (self.canvas.width.max(1), self.canvas.height.max(1));
        let t_ms = self.clock.now().as_micros() / 1_000;
        let bar_w = (w / 10).max(1);
        let bar_x = ((t_ms / 5) % u64::from(w)) as u32;
        let shade = (self.ticks.wrapping_mul(37) % 200) as u8;
        let mode = if self.capture_mode { 0 } else { 40 };
        image::RgbaImage::from_fn(w, h, |x, y| {
            if x >= bar_x && x < bar_x.saturating_add(bar_w) {
                image::Rgba([255, 255, 255, 255])
            } else {
                let g = ((u64::from(y) * 255) / u64::from(h)) as u8;
                image::Rgba([shade, g, 60 + mode, 255])
            }
        })
    }
}

impl SceneHost for SimulatedHost {
    fn set_capture_mode(&mut self, on: bool) -> CastResult<()> {
        self.capture_mode = on;
        self.log(HostEvent::CaptureMode(on));
        Ok(())
    }

    fn lock_target(&mut self, target: &CaptureTarget, canvas: Canvas) -> CastResult<TargetRect> {
        let selector = target
            .selectors
            .last()
            .cloned()
            .unwrap_or_else(|| "body".to_string());
        self.log(HostEvent::Locked(selector.clone()));
        Ok(TargetRect {
            selector,
            ..TargetRect::full(canvas)
        })
    }

    fn sync_to(&mut self, t: VirtualTime) -> CastResult<SyncReport> {
        if self.released {
            return Err(CastError::timeline("scene clock was already released"));
        }
        let ticks = &mut self.ticks;
        let advance = self.clock.advance(t, |_, _, task| match task {
            SimTask::Tick => {
                *ticks += 1;
                Ok(())
            }
            SimTask::Throw(msg) => Err(msg.clone()),
        })?;
        self.log(HostEvent::Seek(t));
        Ok(SyncReport {
            now_ms: t.as_millis_f64(),
            executed: u32::try_from(advance.executed).unwrap_or(u32::MAX),
            applied: vec!["simulated".to_string()],
            errors: advance.errors,
        })
    }

    fn await_ready(&mut self, caps: &ReadinessCaps) -> CastResult<ReadinessReport> {
        let mut report = ReadinessReport {
            images: u32::try_from(self.scene.images.len()).unwrap_or(u32::MAX),
            ..Default::default()
        };

        let font_cap = Duration::from_millis(caps.font_timeout_ms);
        let font_left = if self.scene.fonts_stuck {
            None
        } else {
            let elapsed = self.opened_at.elapsed();
            Some(
                self.scene
                    .font_delay_ms
                    .map(|ms| Duration::from_millis(ms).saturating_sub(elapsed))
                    .unwrap_or_default(),
            )
        };
        match font_left {
            Some(d) if d <= font_cap => std::thread::sleep(d),
            _ => {
                report.fonts = FontState::Timeout;
                std::thread::sleep(font_cap);
            }
        }

        let image_cap = Duration::from_millis(caps.image_timeout_ms);
        let elapsed = self.opened_at.elapsed();
        let mut image_wait = Duration::ZERO;
        for delay in &self.scene.images {
            let left = delay.map(|ms| Duration::from_millis(ms).saturating_sub(elapsed));
            match left {
                Some(d) if d <= image_cap => image_wait = image_wait.max(d),
                _ => {
                    report.images_timed_out += 1;
                    image_wait = image_cap;
                }
            }
        }
        std::thread::sleep(image_wait);
        std::thread::sleep(Duration::from_millis(caps.settle_delay_ms));

        self.log(HostEvent::Ready);
        Ok(report)
    }

    fn capture(
        &mut self,
        rect: &TargetRect,
        format: FrameFormat,
        quality: u8,
    ) -> CastResult<Vec<u8>> {
        let ordinal = self.captures;
        self.captures += 1;
        if !self.scene.capture_cost.is_zero() {
            std::thread::sleep(self.scene.capture_cost);
        }
        if self.scene.failing_captures.contains(&ordinal) {
            return Err(CastError::capture(format!(
                "simulated raster failure on capture {ordinal} ({})",
                rect.selector
            )));
        }
        self.log(HostEvent::Capture(self.clock.now()));
        encode_raster(&self.raster(), format, quality)
    }

    fn resume_animations(&mut self) -> CastResult<()> {
        self.released = true;
        self.log(HostEvent::Resumed);
        Ok(())
    }
}

/// Opens [`SimulatedHost`]s for a fixed scene and keeps a shared journal of their calls.
#[derive(Clone, Debug, Default)]
pub struct SimulatedHostFactory {
    scene: SimulatedScene,
    journal: Arc<Mutex<Vec<HostEvent>>>,
}

impl SimulatedHostFactory {
    /// Factory for `scene`.
    pub fn new(scene: SimulatedScene) -> Self {
        Self {
            scene,
            journal: Arc::default(),
        }
    }

    /// Every call made to hosts opened by this factory, in order.
    pub fn journal(&self) -> Vec<HostEvent> {
        self.journal.lock().map(|j| j.clone()).unwrap_or_default()
    }
}

impl HostFactory for SimulatedHostFactory {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn open(&self, document: &Path, canvas: Canvas) -> CastResult<Box<dyn SceneHost>> {
        if self.scene.unavailable {
            return Err(CastError::environment("simulated scene host is unavailable"));
        }
        if !document.is_file() {
            return Err(CastError::environment(format!(
                "scene document '{}' does not exist",
                document.display()
            )));
        }
        Ok(Box::new(SimulatedHost::with_journal(
            self.scene.clone(),
            canvas,
            Arc::clone(&self.journal),
        )))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/host/simulated.rs"]
mod tests;
