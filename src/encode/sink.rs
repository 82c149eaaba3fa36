use std::time::Duration;

use crate::foundation::core::{Fps, FrameIndex, VirtualTime};
use crate::foundation::error::{CastError, CastResult};
use crate::host::FrameFormat;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Compressed format of every pushed frame.
    pub frame_format: FrameFormat,
    /// Total frames the job will push.
    pub total_frames: u64,
}

/// One captured, compressed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Timetable index.
    pub idx: FrameIndex,
    /// Virtual time the frame shows.
    pub time: VirtualTime,
    /// Compressed image bytes.
    pub bytes: Vec<u8>,
    /// `true` when the capture failed and this is a substitute.
    pub placeholder: bool,
}

/// Sink contract for consuming captured frames in timetable order.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order, without
/// gaps. `push_frame` may block; that is the backpressure signal to the frame driver.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> CastResult<()>;
    /// Push one frame in strictly increasing timetable order.
    fn push_frame(&mut self, frame: &EncodedFrame) -> CastResult<()>;
    /// Called once after the last frame is pushed; finalizes the output.
    fn end(&mut self) -> CastResult<()>;
    /// Stop early and discard partial output. Safe to call at any point, more than once.
    fn abort(&mut self) {}
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<EncodedFrame>,
    push_delay: Duration,
    ended: bool,
    aborted: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that takes `delay` to accept each frame, like a slow encoder.
    pub fn with_push_delay(delay: Duration) -> Self {
        Self {
            push_delay: delay,
            ..Self::default()
        }
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg.clone()
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[EncodedFrame] {
        &self.frames
    }

    /// `true` once `end` succeeded.
    pub fn is_finished(&self) -> bool {
        self.ended
    }

    /// `true` once `abort` was called.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> CastResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, frame: &EncodedFrame) -> CastResult<()> {
        if self.cfg.is_none() {
            return Err(CastError::encode("in-memory sink not started"));
        }
        if !self.push_delay.is_zero() {
            std::thread::sleep(self.push_delay);
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn end(&mut self) -> CastResult<()> {
        self.ended = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
        self.frames.clear();
    }
}

/// Tracks the no-gaps ordering contract on the sink side.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct OrderCheck {
    next: u64,
}

impl OrderCheck {
    pub(crate) fn reset(&mut self) {
        self.next = 0;
    }

    pub(crate) fn accept(&mut self, idx: FrameIndex) -> CastResult<()> {
        if idx.0 != self.next {
            return Err(CastError::encode(format!(
                "frame {} arrived out of order (expected {})",
                idx.0, self.next
            )));
        }
        self.next += 1;
        Ok(())
    }

    pub(crate) fn received(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
