//! Error taxonomy for the spatial audio core.
//!
//! Only construction and (de)serialization paths return [`SpatialResult`].
//! Per-frame DSP methods (`apply`, `tail`, the orchestrator tick) are
//! infallible: they always produce a frame, logging once via `log::warn!`
//! when a configuration mismatch forces them to fall back to silence.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("invalid channel count: expected {expected}, got {got}")]
    InvalidChannelCount { expected: usize, got: usize },

    #[error("invalid Ambisonic order {order} (maximum supported is {max})")]
    InvalidAmbisonicOrder { order: usize, max: usize },

    #[error("failed to load HRTF data: {0}")]
    HrtfLoad(String),

    #[error("configuration mismatch: {reason}")]
    ConfigurationMismatch { reason: String },

    #[error("buffer size mismatch: expected {expected}, got {got}")]
    BufferSizeMismatch { expected: usize, got: usize },

    #[error("source handle {0} not found")]
    SourceNotFound(u32),

    #[error("maximum number of sources ({max}) exceeded")]
    MaxSourcesExceeded { max: usize },

    #[error("malformed persisted data: {0}")]
    Deserialize(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] aural_core::CoreError),
}

pub type SpatialResult<T> = Result<T, SpatialError>;

/// Logs a configuration-mismatch warning exactly once per call site,
/// guarded by the caller's own `AtomicBool`/`Once`. Call sites own the
/// guard so that distinct mismatches (e.g. two different effects) are not
/// conflated into a single log budget.
#[macro_export]
macro_rules! warn_once {
    ($guard:expr, $($arg:tt)+) => {
        if !$guard.swap(true, std::sync::atomic::Ordering::Relaxed) {
            log::warn!($($arg)+);
        }
    };
}
