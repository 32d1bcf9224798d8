//! Crate-wide error types.
//!
//! One enum per §7 of the design: errors are caught and converted to state
//! within a stage, and only surfaced across stage boundaries at explicit
//! checkpoints. See `pmocontrol/src/errors.rs` for the workspace-wide
//! `thiserror` convention this follows.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can cross a stage boundary.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// A decoder plugin could not decode or seek the current song.
    #[error("decoder failure: {0}")]
    DecoderFailure(String),

    /// A sink plugin threw while playing, opening, or draining.
    #[error("output failure on '{output}': {message}")]
    OutputFailure { output: String, message: String },

    /// Cooperative cancellation of a blocking plugin call via `Interrupt()`.
    /// Never surfaced to a user; caught inside the output loop.
    #[error("operation interrupted")]
    Interrupted,

    /// Invalid audio-format, filter, or route spec, raised at setup time.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl EngineError {
    pub fn decoder(msg: impl Into<String>) -> Self {
        EngineError::DecoderFailure(msg.into())
    }

    pub fn output(output: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::OutputFailure {
            output: output.into(),
            message: msg.into(),
        }
    }
}

/// A cheaply-clonable handle to a stored error, used by `DecoderControl`,
/// `OutputControl`, and `PlayerControl` to let other tasks observe a
/// failure without taking ownership of it.
pub type SharedError = Arc<EngineError>;

pub type Result<T> = std::result::Result<T, EngineError>;
