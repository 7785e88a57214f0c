//! Error Types
//!
//! - `EngineError`: terminates the protocol run loop
//! - `ModuleError`: a single module failed during `tick`
//!
//! Refresh failures inside a module's poll cache never reach this level; see
//! [`crate::cache::CacheError`].

use thiserror::Error;

/// Exit status used when the host closes the input stream
pub const EXIT_INPUT_CLOSED: i32 = 3;

/// Exit status for any other fatal engine error
pub const EXIT_FAILURE: i32 = 1;

/// Errors that end the protocol run loop
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input reached end-of-stream or delivered an empty line
    ///
    /// This is the expected shutdown signal from the host.
    #[error("input stream closed")]
    InputClosed,

    /// A module failed and the failure policy is strict
    #[error(transparent)]
    ModuleFatal(#[from] ModuleError),

    /// Reading input or writing output failed
    #[error("protocol I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output array could not be serialized
    #[error("failed to serialize output line: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Process exit status for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InputClosed => EXIT_INPUT_CLOSED,
            _ => EXIT_FAILURE,
        }
    }

    /// Whether this is the graceful end-of-stream shutdown
    #[must_use]
    pub fn is_input_closed(&self) -> bool {
        matches!(self, Self::InputClosed)
    }
}

/// A module failed while being ticked
#[derive(Debug, Error)]
pub enum ModuleError {
    /// `tick` returned an error
    #[error("module '{module}' failed: {source:#}")]
    Failed {
        /// Name of the failing module
        module: String,
        /// Underlying error
        source: anyhow::Error,
    },

    /// `tick` panicked
    #[error("module '{module}' panicked: {message}")]
    Panicked {
        /// Name of the failing module
        module: String,
        /// Panic payload, if it was a string
        message: String,
    },
}

impl ModuleError {
    /// Name of the module that failed
    #[must_use]
    pub fn module(&self) -> &str {
        match self {
            Self::Failed { module, .. } | Self::Panicked { module, .. } => module,
        }
    }
}
