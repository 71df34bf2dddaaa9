//! Error types for CINRAD decoding.

use cdm_common::CdmError;
use thiserror::Error;

/// Result type for CINRAD operations.
pub type CinradResult<T> = Result<T, CinradError>;

/// Errors raised while indexing or decoding a radar volume.
#[derive(Error, Debug)]
pub enum CinradError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Fewer bytes than a fixed-size structure needs
    #[error("{what} truncated: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },

    /// Velocity radials disagree on their Doppler resolution
    #[error("Volume mixes Doppler resolution codes {0:?}")]
    MixedDopplerResolution(Vec<i16>),

    /// No digital radar data records in the file
    #[error("No radial data in {0}")]
    NoRadials(String),

    /// Shared model error
    #[error(transparent)]
    Cdm(#[from] CdmError),
}

impl From<CinradError> for CdmError {
    fn from(err: CinradError) -> Self {
        match err {
            CinradError::IoError(e) => CdmError::Io(e),
            CinradError::Cdm(e) => e,
            other => CdmError::Format(other.to_string()),
        }
    }
}
