use crate::foundation::core::{Fps, FrameIndex, FrameRange, VirtualTime};
use crate::foundation::error::{CastError, CastResult};

/// Read-only frame schedule of one job.
///
/// Holds `floor(fps * duration)` entries; entry `i` sits at virtual time `i * 1000 / fps` ms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTimetable {
    fps: Fps,
    total_frames: u64,
}

impl FrameTimetable {
    /// Build the timetable for an already-clamped duration.
    pub fn new(fps: Fps, duration_secs: f64) -> CastResult<Self> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(CastError::timeline("timetable duration must be positive"));
        }
        let total_frames = fps.secs_to_frames_floor(duration_secs);
        if total_frames == 0 {
            return Err(CastError::timeline("timetable would contain no frames"));
        }
        Ok(Self { fps, total_frames })
    }

    /// Frame rate.
    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Number of entries.
    pub fn len(&self) -> u64 {
        self.total_frames
    }

    /// Always `false` for a constructed timetable.
    pub fn is_empty(&self) -> bool {
        self.total_frames == 0
    }

    /// Full index range `[0, len)`.
    pub fn range(&self) -> FrameRange {
        FrameRange {
            start: FrameIndex(0),
            end: FrameIndex(self.total_frames),
        }
    }

    /// Virtual time of entry `idx`.
    pub fn time_at(&self, idx: FrameIndex) -> VirtualTime {
        VirtualTime::for_frame(idx, self.fps)
    }

    /// `(index, time)` pairs in increasing order.
    pub fn entries(&self) -> impl Iterator<Item = (FrameIndex, VirtualTime)> + '_ {
        self.range().iter().map(|i| (i, self.time_at(i)))
    }

    /// Frames per intermediate part for a window of `seconds_per_part`.
    pub fn frames_per_part(&self, seconds_per_part: u32) -> u64 {
        self.fps
            .secs_to_frames_floor(f64::from(seconds_per_part))
            .max(1)
    }

    /// Contiguous windows of at most `frames_per_part` frames covering the whole timetable.
    pub fn parts(&self, frames_per_part: u64) -> Vec<FrameRange> {
        let step = frames_per_part.max(1);
        let mut out = Vec::with_capacity(self.total_frames.div_ceil(step) as usize);
        let mut start = 0;
        while start < self.total_frames {
            let end = (start + step).min(self.total_frames);
            out.push(FrameRange {
                start: FrameIndex(start),
                end: FrameIndex(end),
            });
            start = end;
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/timetable.rs"]
mod tests;
