//! Classic netCDF (CDF-1 / CDF-2) reader and writer.
//!
//! The reader is exposed as an [`IoServiceProvider`]; the writer covers
//! file creation and appending along the record dimension.

pub mod error;
pub mod header;
pub mod layout;
pub mod reader;
pub mod values;
pub mod writer;

use std::sync::Arc;

use cdm_common::{
    Array, CdmError, CdmModel, CdmResult, ClassicLayout, DecodeContext, Dimension, GroupId,
    ModelBuilder, Section, Variable,
};
use iosp::{ByteSource, CancelToken, IoServiceProvider, IospConfig};
use tracing::{debug, info, warn};

pub use error::{Netcdf3Error, Netcdf3Result};
use header::{parse_header, Header, MAGIC, NUMRECS_OFFSET, STREAMING};
use layout::{fixed_vsize, PaddingRule, RecordLayout, StoredRecordVar};
pub use writer::Netcdf3Writer;

/// Provider id.
pub const FILE_TYPE_ID: &str = "NetCDF3";

/// Initial number of bytes read when looking for the end of the header.
const HEADER_READ_SIZE: usize = 8192;

/// Whether `header` starts with a classic netCDF magic number.
pub fn is_valid_header(header: &[u8]) -> bool {
    header.len() >= 4 && &header[..3] == MAGIC && matches!(header[3], 1 | 2)
}

/// Read and parse the header, growing the read until it fits.
fn read_header(source: &dyn ByteSource) -> CdmResult<(Header, usize)> {
    let file_len = source.len()? as usize;
    let mut size = HEADER_READ_SIZE.min(file_len);
    loop {
        let buf = source.read_vec(0, size)?;
        match parse_header(&buf) {
            Ok(parsed) => return Ok(parsed),
            Err(Netcdf3Error::Truncated(_)) if size < file_len => {
                size = (size * 2).min(file_len);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Classic netCDF provider.
#[derive(Debug, Default)]
pub struct Netcdf3Iosp {
    source: Option<Arc<dyn ByteSource>>,
    record_size: u64,
    record_begin: Option<u64>,
    record_dimension: Option<String>,
    warn_on_layout_mismatch: bool,
}

impl Netcdf3Iosp {
    pub fn new(config: &IospConfig) -> Self {
        Self {
            warn_on_layout_mismatch: config.warn_on_layout_mismatch,
            ..Self::default()
        }
    }

    fn source(&self) -> CdmResult<&dyn ByteSource> {
        self.source
            .as_deref()
            .ok_or_else(|| CdmError::Closed("netCDF-3 provider is not open".to_string()))
    }

    /// Record count from the header, or from the file length while the
    /// writer is streaming.
    fn current_numrecs(&self, stored: Option<u64>, file_len: u64) -> u64 {
        match (stored, self.record_begin) {
            (Some(n), _) => n,
            (None, Some(begin)) if self.record_size > 0 => {
                file_len.saturating_sub(begin) / self.record_size
            }
            (None, _) => 0,
        }
    }

    /// Reject record counts whose byte offsets do not fit in 64 bits.
    fn check_record_extent(&self, numrecs: u64) -> CdmResult<()> {
        let Some(begin) = self.record_begin else {
            return Ok(());
        };
        numrecs
            .checked_mul(self.record_size)
            .and_then(|bytes| bytes.checked_add(begin))
            .map(|_| ())
            .ok_or_else(|| {
                CdmError::format(format!(
                    "{} records of {} bytes overflow 64-bit offsets",
                    numrecs, self.record_size
                ))
            })
    }

    fn report_vsize(&self, name: &str, stored: u64, computed: u64) {
        if stored == computed {
            return;
        }
        if self.warn_on_layout_mismatch {
            warn!(
                variable = name,
                stored_vsize = stored,
                computed_vsize = computed,
                "Header vsize disagrees with computed layout"
            );
        } else {
            debug!(
                variable = name,
                stored_vsize = stored,
                computed_vsize = computed,
                "Header vsize disagrees with computed layout"
            );
        }
    }
}

impl IoServiceProvider for Netcdf3Iosp {
    fn file_type_id(&self) -> &'static str {
        FILE_TYPE_ID
    }

    fn description(&self) -> &'static str {
        "NetCDF-3 classic and 64-bit offset format"
    }

    fn probe(&self, header: &[u8]) -> bool {
        is_valid_header(header)
    }

    fn open(&mut self, source: Arc<dyn ByteSource>, _cancel: &CancelToken) -> CdmResult<CdmModel> {
        let (header, header_len) = read_header(source.as_ref())?;

        // Layout: fixed variables keep their padded extent, record variables
        // follow the single/multi variable rule unless the header stores a
        // usable layout of its own.
        let mut computed = vec![0u64; header.variables.len()];
        let mut record_vars = Vec::new();
        for (i, var) in header.variables.iter().enumerate() {
            let extent = header.natural_extent(var)?;
            if header.is_record_variable(var) {
                record_vars.push((i, extent));
            } else {
                computed[i] = fixed_vsize(extent);
            }
        }
        let computed_layout = RecordLayout::compute(
            &record_vars
                .iter()
                .map(|&(i, extent)| (header.variables[i].data_type, extent))
                .collect::<Vec<_>>(),
        );
        for (k, &(i, _)) in record_vars.iter().enumerate() {
            computed[i] = computed_layout.vsizes[k];
        }
        let stored_layout = RecordLayout::from_stored(
            &record_vars
                .iter()
                .map(|&(i, extent)| StoredRecordVar {
                    begin: header.variables[i].begin,
                    vsize: header.variables[i].vsize,
                    extent,
                })
                .collect::<Vec<_>>(),
        );
        let layout = match stored_layout {
            Some(stored) => {
                if stored.record_size != computed_layout.record_size
                    || stored.vsizes != computed_layout.vsizes
                {
                    debug!(
                        location = %source.location(),
                        stored_record_size = stored.record_size,
                        computed_record_size = computed_layout.record_size,
                        "Reading record layout as stored in header"
                    );
                }
                stored
            }
            None => computed_layout,
        };
        for (var, &vsize) in header.variables.iter().zip(&computed) {
            let in_stored_layout =
                layout.rule == PaddingRule::Stored && header.is_record_variable(var);
            if !in_stored_layout {
                self.report_vsize(&var.name, var.vsize, vsize);
            }
        }

        self.record_size = layout.record_size;
        self.record_begin = record_vars
            .iter()
            .map(|&(i, _)| header.variables[i].begin)
            .min();
        let numrecs = self.current_numrecs(header.numrecs, source.len()?);
        self.check_record_extent(numrecs)?;

        let mut builder = ModelBuilder::new();
        let root = GroupId::ROOT;
        for dim in &header.dimensions {
            let d = if dim.length == 0 {
                self.record_dimension = Some(dim.name.clone());
                Dimension::unlimited(dim.name.as_str(), numrecs as usize)?
            } else {
                Dimension::new(dim.name.as_str(), dim.length as usize)?
            };
            builder.add_dimension(root, d)?;
        }
        for attr in &header.attributes {
            builder.add_attribute(root, attr.clone())?;
        }
        for (var, &vsize) in header.variables.iter().zip(&computed) {
            let dims = var
                .dim_ids
                .iter()
                .map(|&id| {
                    let name = &header.dimensions[id].name;
                    builder
                        .find_dimension(root, name)
                        .cloned()
                        .ok_or_else(|| CdmError::format(format!("dimension {} missing", name)))
                })
                .collect::<CdmResult<Vec<_>>>()?;
            let mut v = Variable::new(var.name.as_str(), var.data_type, dims);
            for attr in &var.attributes {
                v.add_attribute(attr.clone());
            }
            // Reads are bounded by the stored vsize; a writer that left it
            // at zero gets the computed one.
            let reserved = if var.vsize == 0 { vsize } else { var.vsize };
            v.set_decode_context(DecodeContext::Classic(ClassicLayout {
                begin: var.begin,
                vsize: reserved,
                is_record: header.is_record_variable(var),
            }));
            builder.add_variable(root, v)?;
        }

        info!(
            location = %source.location(),
            version = header.version.byte(),
            header_bytes = header_len,
            numrecs = numrecs,
            record_size = self.record_size,
            rule = ?layout.rule,
            "Opened classic netCDF file"
        );
        self.source = Some(source);
        Ok(builder.freeze())
    }

    fn read_data(&self, var: &Variable, section: &Section, cancel: &CancelToken) -> CdmResult<Array> {
        let layout = var.decode_context().as_classic().ok_or_else(|| {
            CdmError::Unsupported(format!("{} was not built by the netCDF-3 provider", var.name()))
        })?;
        reader::read_section(self.source()?, var, layout, self.record_size, section, cancel)
    }

    fn sync(&self, model: &CdmModel) -> CdmResult<bool> {
        let Some(name) = &self.record_dimension else {
            return Ok(false);
        };
        let source = self.source()?;
        let raw = source.read_vec(NUMRECS_OFFSET, 4)?;
        let stored = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let stored = (stored != STREAMING).then_some(stored as u64);
        let numrecs = self.current_numrecs(stored, source.len()?);
        self.check_record_extent(numrecs)?;
        let numrecs = numrecs as usize;

        let current = model
            .unlimited_dimension()
            .map_or(0, |d| d.extent());
        if numrecs <= current {
            return Ok(false);
        }
        model.grow_unlimited(name, numrecs)?;
        info!(
            location = %source.location(),
            from = current,
            to = numrecs,
            "Picked up appended records"
        );
        Ok(true)
    }

    fn close(&mut self) -> CdmResult<()> {
        self.source = None;
        Ok(())
    }
}
