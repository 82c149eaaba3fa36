//! Chunked part-then-concat encoding.
//!
//! Frames of one window are written as numbered images, encoded into an intermediate part
//! as soon as the window fills, and deleted. At the end the parts are joined with a
//! stream copy. Peak scratch storage is one window of images plus the finished parts.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::encode::ffmpeg::{ensure_parent_dir, run_ffmpeg};
use crate::encode::params::{EncodeParams, concat_args, concat_list, sequence_args};
use crate::encode::sink::{EncodedFrame, FrameSink, OrderCheck, SinkConfig};
use crate::foundation::error::{CastError, CastResult};

/// Name of the concat list inside the work directory.
pub const CONCAT_LIST_NAME: &str = "list.txt";

/// Turns a directory of numbered frames into a part, and parts into one container.
pub trait PartEncoder: Send {
    /// Encode `frame_%06d.<ext>` in `frames_dir` into `out`.
    fn encode_part(&mut self, frames_dir: &Path, cfg: &SinkConfig, out: &Path) -> CastResult<()>;
    /// Join the parts named in the list file `list`, in order, into `out` without re-encoding.
    fn concat(&mut self, list: &Path, out: &Path) -> CastResult<()>;
}

/// [`PartEncoder`] backed by the `ffmpeg` binary.
#[derive(Clone, Debug)]
pub struct FfmpegPartEncoder {
    ffmpeg: PathBuf,
    params: EncodeParams,
}

impl FfmpegPartEncoder {
    /// Encoder running `ffmpeg` with `params`.
    pub fn new(ffmpeg: impl Into<PathBuf>, params: EncodeParams) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            params,
        }
    }
}

impl PartEncoder for FfmpegPartEncoder {
    fn encode_part(&mut self, frames_dir: &Path, cfg: &SinkConfig, out: &Path) -> CastResult<()> {
        run_ffmpeg(
            &self.ffmpeg,
            &sequence_args(frames_dir, cfg.frame_format, cfg.fps, &self.params, out),
        )
    }

    fn concat(&mut self, list: &Path, out: &Path) -> CastResult<()> {
        run_ffmpeg(&self.ffmpeg, &concat_args(list, out))
    }
}

/// [`FrameSink`] using the part-then-concat strategy.
pub struct PartsSink {
    encoder: Box<dyn PartEncoder>,
    work_dir: PathBuf,
    out_path: PathBuf,
    frames_per_part: u64,

    cfg: Option<SinkConfig>,
    order: OrderCheck,
    in_window: u64,
    parts: Vec<PathBuf>,
    peak_window: u64,
}

impl PartsSink {
    /// Sink writing scratch files under `work_dir` and the result to `out_path`.
    pub fn new(
        encoder: Box<dyn PartEncoder>,
        work_dir: impl Into<PathBuf>,
        out_path: impl Into<PathBuf>,
        frames_per_part: u64,
    ) -> Self {
        Self {
            encoder,
            work_dir: work_dir.into(),
            out_path: out_path.into(),
            frames_per_part: frames_per_part.max(1),
            cfg: None,
            order: OrderCheck::default(),
            in_window: 0,
            parts: Vec::new(),
            peak_window: 0,
        }
    }

    /// Most frame images that were on disk at once.
    pub fn peak_window(&self) -> u64 {
        self.peak_window
    }

    /// Parts encoded so far.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    fn frames_dir(&self) -> PathBuf {
        self.work_dir.join("frames")
    }

    fn list_path(&self) -> PathBuf {
        self.work_dir.join(CONCAT_LIST_NAME)
    }

    fn flush_window(&mut self) -> CastResult<()> {
        if self.in_window == 0 {
            return Ok(());
        }
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| CastError::encode("parts sink not started"))?;
        let part = self
            .work_dir
            .join(format!("part_{:03}.mp4", self.parts.len()));
        let frames_dir = self.frames_dir();
        self.encoder.encode_part(&frames_dir, cfg, &part)?;
        tracing::debug!(part = %part.display(), frames = self.in_window, "part encoded");

        std::fs::remove_dir_all(&frames_dir)
            .with_context(|| format!("remove part frames '{}'", frames_dir.display()))?;
        std::fs::create_dir_all(&frames_dir)
            .with_context(|| format!("recreate part frames '{}'", frames_dir.display()))?;
        self.parts.push(part);
        self.in_window = 0;
        Ok(())
    }

    fn join_parts(&mut self) -> CastResult<()> {
        ensure_parent_dir(&self.out_path)?;
        if let [only] = self.parts.as_slice() {
            if std::fs::rename(only, &self.out_path).is_err() {
                std::fs::copy(only, &self.out_path)
                    .with_context(|| format!("move part to '{}'", self.out_path.display()))?;
            }
            return Ok(());
        }
        let list = self.list_path();
        std::fs::write(&list, concat_list(&self.parts))
            .with_context(|| format!("write concat list '{}'", list.display()))?;
        self.encoder.concat(&list, &self.out_path)
    }

    fn remove_scratch(&mut self) {
        let _ = std::fs::remove_dir_all(self.frames_dir());
        let _ = std::fs::remove_file(self.list_path());
        for part in self.parts.drain(..) {
            let _ = std::fs::remove_file(part);
        }
    }
}

impl FrameSink for PartsSink {
    fn begin(&mut self, cfg: SinkConfig) -> CastResult<()> {
        let frames_dir = self.frames_dir();
        std::fs::create_dir_all(&frames_dir)
            .with_context(|| format!("create part frames '{}'", frames_dir.display()))?;
        self.cfg = Some(cfg);
        self.order.reset();
        self.in_window = 0;
        self.parts.clear();
        self.peak_window = 0;
        Ok(())
    }

    fn push_frame(&mut self, frame: &EncodedFrame) -> CastResult<()> {
        let ext = self
            .cfg
            .as_ref()
            .map(|c| c.frame_format.extension())
            .ok_or_else(|| CastError::encode("parts sink not started"))?;
        self.order.accept(frame.idx)?;
        let path = self
            .frames_dir()
            .join(format!("frame_{:06}.{ext}", self.in_window));
        std::fs::write(&path, &frame.bytes)
            .with_context(|| format!("write frame '{}'", path.display()))?;
        self.in_window += 1;
        self.peak_window = self.peak_window.max(self.in_window);
        if self.in_window >= self.frames_per_part {
            self.flush_window()?;
        }
        Ok(())
    }

    fn end(&mut self) -> CastResult<()> {
        let res = self.flush_window().and_then(|()| {
            if self.parts.is_empty() {
                return Err(CastError::encode("no frames were pushed"));
            }
            self.join_parts()
        });
        self.remove_scratch();
        if res.is_err() {
            let _ = std::fs::remove_file(&self.out_path);
        }
        self.cfg = None;
        res
    }

    fn abort(&mut self) {
        self.remove_scratch();
        let _ = std::fs::remove_file(&self.out_path);
        self.cfg = None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/parts.rs"]
mod tests;
