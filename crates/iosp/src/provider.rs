//! The I/O service provider contract.

use std::sync::Arc;

use cdm_common::{Array, CdmModel, CdmResult, Section, Variable};

use crate::cancel::CancelToken;
use crate::source::ByteSource;

/// A decoder for one binary format family.
///
/// `probe` is a pure test on a header prefix and answers `false` for files it
/// does not recognise. `open` runs once per file and builds the model and any
/// record index in a single forward scan. After that, `read_data` only takes
/// `&self` and keeps all iteration state local to the call, so it may run
/// from several threads at once.
pub trait IoServiceProvider: Send + Sync {
    /// Short id, e.g. `"NetCDF3"`.
    fn file_type_id(&self) -> &'static str;

    /// One-line description of the format.
    fn description(&self) -> &'static str;

    /// Whether `header` looks like this provider's format.
    fn probe(&self, header: &[u8]) -> bool;

    /// Build the model and record index.
    fn open(&mut self, source: Arc<dyn ByteSource>, cancel: &CancelToken) -> CdmResult<CdmModel>;

    /// Decode a section of a variable built by this provider.
    fn read_data(&self, var: &Variable, section: &Section, cancel: &CancelToken)
        -> CdmResult<Array>;

    /// Pick up file growth along the unlimited dimension.
    ///
    /// Returns whether the model changed.
    fn sync(&self, _model: &CdmModel) -> CdmResult<bool> {
        Ok(false)
    }

    /// Release the source and index. Calling twice is harmless.
    fn close(&mut self) -> CdmResult<()>;
}
