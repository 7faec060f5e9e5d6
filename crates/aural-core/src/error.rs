//! Shared error taxonomy for the engine's core crates.

use thiserror::Error;

/// Errors that can occur constructing or reconfiguring core data-model types.
///
/// Per-frame DSP methods never return this type (see the orchestrator's error
/// handling design) -- it is only returned from construction and
/// (de)serialization paths.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid channel count: expected {expected}, got {got}")]
    InvalidChannelCount { expected: usize, got: usize },

    #[error("invalid sample count: expected {expected}, got {got}")]
    InvalidSampleCount { expected: usize, got: usize },

    #[error("invalid speaker layout: {0}")]
    InvalidLayout(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
