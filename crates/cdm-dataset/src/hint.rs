//! File type hints from file names.
//!
//! A hint only reorders the probe sequence; the providers' probes still
//! decide.

use std::path::Path;

use cinrad_parser::FILE_TYPE_ID as CINRAD_ID;
use netcdf3_parser::FILE_TYPE_ID as NETCDF3_ID;

/// Supported file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    NetCdf3,
    Cinrad,
    Unknown,
}

impl FileType {
    /// Provider id to try first, if any.
    pub fn provider_id(&self) -> Option<&'static str> {
        match self {
            FileType::NetCdf3 => Some(NETCDF3_ID),
            FileType::Cinrad => Some(CINRAD_ID),
            FileType::Unknown => None,
        }
    }
}

/// Detect file type from a path's name.
///
/// CINRAD archives follow the `Z_RADR_I_<station>_<time>_..._<radar>.bin`
/// naming and sometimes carry an `.ar2v` or `.bin` extension alone.
pub fn detect_file_type(path: impl AsRef<Path>) -> FileType {
    let Some(name) = path.as_ref().file_name().and_then(|s| s.to_str()) else {
        return FileType::Unknown;
    };
    let lower = name.to_lowercase();

    if lower.ends_with(".nc") || lower.ends_with(".cdf") || lower.ends_with(".netcdf") {
        FileType::NetCdf3
    } else if lower.starts_with("z_radr_") || lower.ends_with(".ar2v") || lower.ends_with(".bin") {
        FileType::Cinrad
    } else {
        FileType::Unknown
    }
}
