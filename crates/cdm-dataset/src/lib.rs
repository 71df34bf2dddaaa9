//! Uniform access to every supported binary format.
//!
//! [`Dataset`] opens a file through the built-in provider registry, using
//! the file name as a hint for which provider to probe first, and offers
//! raw and enhanced (scaled, missing as NaN) reads.
//!
//! ```ignore
//! use cdm_dataset::Dataset;
//!
//! let ds = Dataset::open("Z_RADR_I_Z9250_20200615100000_O_DOR_SA_CAP.bin")?;
//! let dbz = ds.read_enhanced_str("Reflectivity", "0,:,:")?;
//! ```

pub mod dataset;
pub mod error;
pub mod hint;
pub mod registry;

pub use dataset::{Dataset, EnhancedArray, OpenOptions};
pub use error::{DatasetError, Result};
pub use hint::{detect_file_type, FileType};
pub use registry::{default_registry, registry_for};
