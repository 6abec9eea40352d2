// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types.

use crate::time::Tick;
use thiserror::Error;

/// Boxed error returned by user build functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Timeline result alias
pub type Result<T, E = TimelineError> = std::result::Result<T, E>;

/// Errors raised by the timeline
#[derive(Debug, Error)]
pub enum TimelineError {
    /// The build function returned an error
    #[error("Build function failed: {0}")]
    Build(#[source] BoxError),
    /// The build function returned without calling `end()`
    #[error("Build function returned without calling end()")]
    NotEnded,
    /// `end()` was called a second time
    #[error("end() already called, timeline has {0} ticks")]
    AlreadyEnded(Tick),
    /// An operation needs a built timeline
    #[error("Timeline has not been built")]
    NotBuilt,
    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Frame export failed
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

/// Errors raised while exporting frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// A frame could not be written
    #[error("Failed to write frame {index}: {reason}")]
    FrameWrite {
        /// Output frame index
        index: u32,
        /// Underlying failure
        reason: String,
    },
    /// The frame writer has already been finished or its worker is gone
    #[error("Frame writer is closed")]
    WriterClosed,
    /// The encoder rejected the job
    #[error("Encoder failed: {0}")]
    Encoder(String),
}

/// Errors raised by audio backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// Asset not found
    #[error("Audio asset not found: {0}")]
    NotFound(String),
    /// Asset could not be decoded
    #[error("Failed to decode {path}: {reason}")]
    Decode {
        /// Asset path
        path: String,
        /// Decoder message
        reason: String,
    },
}
