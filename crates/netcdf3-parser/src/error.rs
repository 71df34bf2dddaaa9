//! Error types for the netCDF-3 codec.

use cdm_common::CdmError;
use thiserror::Error;

/// Result type for codec operations.
pub type Netcdf3Result<T> = Result<T, Netcdf3Error>;

/// Errors raised while encoding or decoding classic files.
#[derive(Error, Debug)]
pub enum Netcdf3Error {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Header ended before it was fully parsed
    #[error("Header truncated after {0} bytes")]
    Truncated(usize),

    /// Malformed header or data layout
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Valid file using a feature this codec does not handle
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Writer misuse: unknown names, writes in define mode and the like
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    /// Shared model error
    #[error(transparent)]
    Cdm(#[from] CdmError),
}

impl From<Netcdf3Error> for CdmError {
    fn from(err: Netcdf3Error) -> Self {
        match err {
            Netcdf3Error::IoError(e) => CdmError::Io(e),
            Netcdf3Error::Truncated(_) | Netcdf3Error::InvalidFormat(_) => {
                CdmError::Format(err.to_string())
            }
            Netcdf3Error::Unsupported(msg) => CdmError::Unsupported(msg),
            Netcdf3Error::InvalidDefinition(msg) => CdmError::Schema(msg),
            Netcdf3Error::Cdm(e) => e,
        }
    }
}
