//! Error types shared by the data model and every I/O service provider.

use thiserror::Error;

/// Result type alias using CdmError.
pub type CdmResult<T> = Result<T, CdmError>;

/// Primary error type for model construction and data reads.
///
/// A probe that does not match a file is not an error: providers answer
/// `false` and the registry moves on. Decode anomalies (missing radials,
/// out-of-order timestamps) are logged and never surface here.
#[derive(Debug, Error)]
pub enum CdmError {
    // === Schema Errors ===
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Model is frozen: {0}")]
    Frozen(String),

    // === Addressing Errors ===
    #[error("Range error: {0}")]
    Range(String),

    // === Format Errors ===
    #[error("Format error: {0}")]
    Format(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    // === Session Errors ===
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Read cancelled after {completed} of {total} scans")]
    Cancelled { completed: usize, total: usize },

    #[error("File session is closed: {0}")]
    Closed(String),
}

impl CdmError {
    /// Create a Schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a Range error.
    pub fn range(msg: impl Into<String>) -> Self {
        Self::Range(msg.into())
    }

    /// Create a Format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Whether the file session that produced this error must be closed.
    ///
    /// Transport failures leave the handle in an unknown position and state;
    /// every other kind is local to the call that raised it.
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self, CdmError::Io(_))
    }
}
