//! Error types for the dataset facade.

use cdm_common::CdmError;
use iosp::ConfigError;
use thiserror::Error;

/// Errors raised while opening or reading a dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error(transparent)]
    Cdm(#[from] CdmError),

    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
