/// Convenience result type used across scenecast.
pub type CastResult<T> = Result<T, CastError>;

/// Top-level error taxonomy for render jobs.
///
/// Every fatal variant ends a job at the `error` stage. [`CastError::Capture`] is the one
/// recoverable variant: the frame driver substitutes a placeholder frame and keeps going.
#[derive(thiserror::Error, Debug)]
pub enum CastError {
    /// Bad request shape or out-of-range parameters, detected before any capture begins.
    #[error("configuration error: {0}")]
    Config(String),

    /// The rendering engine or encoder is unavailable or missing a required capability.
    #[error("environment error: {0}")]
    Environment(String),

    /// A single frame failed to rasterize.
    #[error("capture error: {0}")]
    Capture(String),

    /// Virtual clock or frame timetable invariant was violated.
    #[error("timeline error: {0}")]
    Timeline(String),

    /// The encoder failed (non-zero exit, malformed input, broken pipe).
    #[error("encode error: {0}")]
    Encode(String),

    /// The encoder ran out of memory.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CastError {
    /// Build a [`CastError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`CastError::Environment`] value.
    pub fn environment(msg: impl Into<String>) -> Self {
        Self::Environment(msg.into())
    }

    /// Build a [`CastError::Capture`] value.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// Build a [`CastError::Timeline`] value.
    pub fn timeline(msg: impl Into<String>) -> Self {
        Self::Timeline(msg.into())
    }

    /// Build a [`CastError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`CastError::ResourceExhausted`] value.
    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Build a [`CastError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` when the frame driver may recover locally instead of failing the job.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Capture(_))
    }

    /// Message suitable for the progress channel's `error` stage.
    pub fn user_message(&self) -> String {
        match self {
            Self::ResourceExhausted(_) => {
                "ran out of memory while encoding; try a shorter duration or a lower quality"
                    .to_string()
            }
            Self::Other(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

const OOM_PHRASES: &[&str] = &[
    "cannot allocate memory",
    "out of memory",
    "memory allocation failed",
];

fn mentions_oom(stderr: &str) -> bool {
    let lowered = stderr.to_ascii_lowercase();
    OOM_PHRASES.iter().any(|p| lowered.contains(p))
        || lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == "oom")
}

/// Classify a failed encoder run from its exit status text and captured stderr.
///
/// Out-of-memory signals become [`CastError::ResourceExhausted`]; everything else is a generic
/// [`CastError::Encode`].
pub fn classify_encoder_failure(status: &str, stderr: &str) -> CastError {
    if mentions_oom(stderr) {
        return CastError::resource_exhausted(format!(
            "encoder exited with status {status}: {}",
            stderr.trim()
        ));
    }
    CastError::encode(format!(
        "encoder exited with status {status}: {}",
        stderr.trim()
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
