//! Result and error types for Reformar.

use thiserror::Error;

/// Result type for Reformar operations
pub type ReformarResult<T> = Result<T, ReformarError>;

/// Errors that can occur in Reformar
#[derive(Debug, Error)]
pub enum ReformarError {
    /// Target repository root does not exist
    #[error("Repository not found: {path}")]
    RepositoryNotFound {
        /// Path that was probed
        path: String,
    },

    /// Reconnaissance error
    #[error("Reconnaissance failed: {message}")]
    ReconError {
        /// Error message
        message: String,
    },

    /// Code synthesis error
    #[error("Synthesis failed: {message}")]
    SynthesisError {
        /// Error message
        message: String,
    },

    /// Test execution could not be started
    #[error("Failed to execute test runner: {message}")]
    ExecutionError {
        /// Error message
        message: String,
    },

    /// Overall deadline exceeded; the pipeline run was aborted
    #[error("Pipeline timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Pipeline-level error wrapping any phase failure
    #[error("Pipeline error: {message}")]
    PipelineError {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReformarError {
    /// Create a reconnaissance error
    #[must_use]
    pub fn recon(message: impl Into<String>) -> Self {
        Self::ReconError {
            message: message.into(),
        }
    }

    /// Create a synthesis error
    #[must_use]
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::SynthesisError {
            message: message.into(),
        }
    }

    /// Create an execution error
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::ExecutionError {
            message: message.into(),
        }
    }
}
