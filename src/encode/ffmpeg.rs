use std::ffi::OsString;
use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::Context as _;

use crate::encode::params::{EncodeParams, pipe_input_args};
use crate::encode::sink::{EncodedFrame, FrameSink, OrderCheck, SinkConfig};
use crate::foundation::error::{CastError, CastResult, classify_encoder_failure};

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// `ffmpeg` binary.
    pub ffmpeg: PathBuf,
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Quality-tier settings.
    pub params: EncodeParams,
}

/// Sink that spawns `ffmpeg` and streams compressed frames into its stdin.
///
/// `push_frame` is a blocking write into the pipe: when ffmpeg falls behind and the pipe buffer
/// is full, the caller is suspended until it drains.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    order: OrderCheck,
}

impl FfmpegSink {
    /// Create a new sink that streams into `ffmpeg`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            order: OrderCheck::default(),
        }
    }

    fn collect_stderr(&mut self) -> String {
        let bytes = match self.stderr_drain.take() {
            Some(handle) => handle.join().ok().and_then(Result::ok).unwrap_or_default(),
            None => Vec::new(),
        };
        String::from_utf8_lossy(&bytes).trim().to_string()
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> CastResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(CastError::config("ffmpeg sink width/height must be non-zero"));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(CastError::config(
                "ffmpeg sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        ensure_parent_dir(&self.opts.out_path)?;

        let mut cmd = Command::new(&self.opts.ffmpeg);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args(["-y", "-loglevel", "error"])
            .args(pipe_input_args(cfg.frame_format, cfg.fps))
            .args(self.opts.params.h264_args())
            .arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            CastError::environment(format!(
                "failed to spawn '{}' (is ffmpeg installed?): {e}",
                self.opts.ffmpeg.display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CastError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| CastError::encode("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(out = %self.opts.out_path.display(), crf = self.opts.params.crf, "ffmpeg started");
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.order.reset();
        Ok(())
    }

    fn push_frame(&mut self, frame: &EncodedFrame) -> CastResult<()> {
        self.order.accept(frame.idx)?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(CastError::encode("ffmpeg sink is not accepting frames"));
        };
        if let Err(e) = stdin.write_all(&frame.bytes) {
            // A closed pipe means ffmpeg died; its stderr says why.
            drop(self.stdin.take());
            let status = self
                .child
                .as_mut()
                .and_then(|c| c.wait().ok())
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown status".to_string());
            let stderr = self.collect_stderr();
            self.child = None;
            if stderr.is_empty() {
                return Err(CastError::encode(format!(
                    "failed to write frame {} to ffmpeg stdin: {e}",
                    frame.idx.0
                )));
            }
            return Err(classify_encoder_failure(&status, &stderr));
        }
        Ok(())
    }

    fn end(&mut self) -> CastResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| CastError::encode("ffmpeg sink not started"))?;
        let status = child
            .wait()
            .map_err(|e| CastError::encode(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr = self.collect_stderr();
        if !status.success() {
            return Err(classify_encoder_failure(&status.to_string(), &stderr));
        }
        tracing::debug!(frames = self.order.received(), "ffmpeg finished");
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = self.collect_stderr();
        if self.opts.out_path.exists() {
            let _ = std::fs::remove_file(&self.opts.out_path);
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}

/// Run `ffmpeg` to completion with `args`, classifying a failure from its stderr.
pub fn run_ffmpeg(ffmpeg: &Path, args: &[OsString]) -> CastResult<()> {
    let output = Command::new(ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            CastError::environment(format!(
                "failed to spawn '{}' (is ffmpeg installed?): {e}",
                ffmpeg.display()
            ))
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(classify_encoder_failure(
            &output.status.to_string(),
            stderr.trim(),
        ));
    }
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> CastResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` answers `-version`.
pub fn ffmpeg_available(ffmpeg: &Path) -> bool {
    Command::new(ffmpeg)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
