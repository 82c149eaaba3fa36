/// `ffmpeg` pipe sink and process helpers.
pub mod ffmpeg;
/// Two-pass palette GIF.
pub mod gif;
/// Encoder argument builders and quality tiers.
pub mod params;
/// Part-then-concat strategy.
pub mod parts;
/// Sink trait and in-memory sink.
pub mod sink;
/// Per-job scratch directories.
pub mod workdir;
