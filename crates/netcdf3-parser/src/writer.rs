//! Minimal classic file writer: define, write, append records.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use cdm_common::{Array, Attribute, DataType, Section};
use tracing::{debug, info};

use crate::error::{Netcdf3Error, Netcdf3Result};
use crate::header::{
    nc_type_code, DimensionEntry, Header, VariableEntry, Version, NUMRECS_OFFSET,
};
use crate::layout::{fixed_vsize, RecordLayout};
use crate::values::encode_be;

/// Writes a classic file.
///
/// Dimensions, variables and attributes are declared first; `end_define`
/// lays out the file and writes the header. Writes along the record
/// dimension past the current record count append records.
#[derive(Debug)]
pub struct Netcdf3Writer {
    path: PathBuf,
    file: File,
    version: Version,
    dimensions: Vec<DimensionEntry>,
    attributes: Vec<Attribute>,
    variables: Vec<VariableEntry>,
    defining: bool,
    numrecs: u64,
    record_size: u64,
}

impl Netcdf3Writer {
    /// Create (or truncate) a file in define mode.
    pub fn create(path: impl AsRef<Path>) -> Netcdf3Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            file,
            version: Version::Classic,
            dimensions: Vec::new(),
            attributes: Vec::new(),
            variables: Vec::new(),
            defining: true,
            numrecs: 0,
            record_size: 0,
        })
    }

    /// Use 64-bit `begin` offsets.
    pub fn with_64bit_offsets(mut self) -> Self {
        self.version = Version::Offset64;
        self
    }

    fn require_define(&self) -> Netcdf3Result<()> {
        if self.defining {
            Ok(())
        } else {
            Err(Netcdf3Error::InvalidDefinition(
                "file is no longer in define mode".to_string(),
            ))
        }
    }

    fn add_dimension_entry(&mut self, name: &str, length: u64) -> Netcdf3Result<()> {
        self.require_define()?;
        if self.dimensions.iter().any(|d| d.name == name) {
            return Err(Netcdf3Error::InvalidDefinition(format!(
                "duplicate dimension {}",
                name
            )));
        }
        self.dimensions.push(DimensionEntry {
            name: name.to_string(),
            length,
        });
        Ok(())
    }

    pub fn add_dimension(&mut self, name: &str, length: usize) -> Netcdf3Result<()> {
        if length == 0 {
            return Err(Netcdf3Error::InvalidDefinition(format!(
                "dimension {} must have length >= 1",
                name
            )));
        }
        self.add_dimension_entry(name, length as u64)
    }

    /// Declare the record dimension. A file has at most one.
    pub fn add_unlimited_dimension(&mut self, name: &str) -> Netcdf3Result<()> {
        if self.dimensions.iter().any(|d| d.length == 0) {
            return Err(Netcdf3Error::InvalidDefinition(
                "file already has an unlimited dimension".to_string(),
            ));
        }
        self.add_dimension_entry(name, 0)
    }

    pub fn add_global_attribute(&mut self, attribute: Attribute) -> Netcdf3Result<()> {
        self.require_define()?;
        self.attributes.retain(|a| a.name != attribute.name);
        self.attributes.push(attribute);
        Ok(())
    }

    /// Declare a variable over whitespace-separated dimension names.
    pub fn add_variable(&mut self, name: &str, data_type: DataType, dims: &str) -> Netcdf3Result<()> {
        self.require_define()?;
        if nc_type_code(data_type).is_none() {
            return Err(Netcdf3Error::Unsupported(format!(
                "{} cannot be stored in a classic file",
                data_type
            )));
        }
        if self.variables.iter().any(|v| v.name == name) {
            return Err(Netcdf3Error::InvalidDefinition(format!(
                "duplicate variable {}",
                name
            )));
        }
        let dim_ids = dims
            .split_whitespace()
            .map(|d| {
                self.dimensions
                    .iter()
                    .position(|e| e.name == d)
                    .ok_or_else(|| Netcdf3Error::InvalidDefinition(format!("unknown dimension {}", d)))
            })
            .collect::<Netcdf3Result<Vec<_>>>()?;
        if dim_ids.iter().skip(1).any(|&id| self.dimensions[id].length == 0) {
            return Err(Netcdf3Error::InvalidDefinition(format!(
                "{}: the unlimited dimension must come first",
                name
            )));
        }
        self.variables.push(VariableEntry {
            name: name.to_string(),
            dim_ids,
            attributes: Vec::new(),
            data_type,
            vsize: 0,
            begin: 0,
        });
        Ok(())
    }

    pub fn add_variable_attribute(&mut self, var: &str, attribute: Attribute) -> Netcdf3Result<()> {
        self.require_define()?;
        let entry = self
            .variables
            .iter_mut()
            .find(|v| v.name == var)
            .ok_or_else(|| Netcdf3Error::InvalidDefinition(format!("unknown variable {}", var)))?;
        entry.attributes.retain(|a| a.name != attribute.name);
        entry.attributes.push(attribute);
        Ok(())
    }

    fn header(&self) -> Header {
        Header {
            version: self.version,
            numrecs: Some(self.numrecs),
            dimensions: self.dimensions.clone(),
            attributes: self.attributes.clone(),
            variables: self.variables.clone(),
        }
    }

    /// Compute the layout and write the header. Leaves define mode.
    pub fn end_define(&mut self) -> Netcdf3Result<()> {
        self.require_define()?;

        let header_len = self.header().encode().len() as u64;
        let template = self.header();
        template.validate()?;

        let mut cursor = header_len;
        let mut record_vars = Vec::new();
        for (i, var) in template.variables.iter().enumerate() {
            let extent = template.natural_extent(var)?;
            if template.is_record_variable(var) {
                record_vars.push((i, var.data_type, extent));
            } else {
                self.variables[i].begin = cursor;
                self.variables[i].vsize = fixed_vsize(extent);
                cursor = cursor.checked_add(self.variables[i].vsize).ok_or_else(|| {
                    Netcdf3Error::InvalidDefinition("data size overflows 64 bits".to_string())
                })?;
            }
        }

        let layout = RecordLayout::compute(
            &record_vars
                .iter()
                .map(|&(_, t, extent)| (t, extent))
                .collect::<Vec<_>>(),
        );
        for (k, &(i, _, _)) in record_vars.iter().enumerate() {
            self.variables[i].begin = cursor + layout.offsets[k];
            self.variables[i].vsize = layout.vsizes[k];
        }
        self.record_size = layout.record_size;

        if self.version == Version::Classic && cursor > u32::MAX as u64 {
            return Err(Netcdf3Error::Unsupported(
                "data offsets exceed 32 bits; use 64-bit offsets".to_string(),
            ));
        }

        let bytes = self.header().encode();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&bytes)?;
        self.file.set_len(cursor)?;
        self.defining = false;

        debug!(
            path = %self.path.display(),
            header_bytes = bytes.len(),
            record_size = self.record_size,
            rule = ?layout.rule,
            "Wrote classic header"
        );
        Ok(())
    }

    pub fn numrecs(&self) -> u64 {
        self.numrecs
    }

    pub fn record_size(&self) -> u64 {
        self.record_size
    }

    fn record_begin(&self) -> Option<u64> {
        let template = self.header();
        template
            .variables
            .iter()
            .filter(|v| template.is_record_variable(v))
            .map(|v| v.begin)
            .min()
    }

    /// Grow the file to `numrecs` records and store the new count.
    fn extend_records(&mut self, numrecs: u64) -> Netcdf3Result<()> {
        let Some(record_begin) = self.record_begin() else {
            return Ok(());
        };
        self.file.set_len(record_begin + numrecs * self.record_size)?;
        self.file.seek(SeekFrom::Start(NUMRECS_OFFSET))?;
        self.file.write_all(&(numrecs as u32).to_be_bytes())?;
        debug!(from = self.numrecs, to = numrecs, "Appended records");
        self.numrecs = numrecs;
        Ok(())
    }

    /// Write `array` into `var` starting at `origin`.
    ///
    /// Along the record dimension the write may run past the current record
    /// count, which appends records.
    pub fn write(&mut self, var: &str, origin: &[usize], array: &Array) -> Netcdf3Result<()> {
        if self.defining {
            return Err(Netcdf3Error::InvalidDefinition(
                "call end_define before writing data".to_string(),
            ));
        }
        let index = self
            .variables
            .iter()
            .position(|v| v.name == var)
            .ok_or_else(|| Netcdf3Error::InvalidDefinition(format!("unknown variable {}", var)))?;
        let entry = self.variables[index].clone();
        if array.data_type() != entry.data_type {
            return Err(Netcdf3Error::InvalidDefinition(format!(
                "{} is {}, got {} data",
                var,
                entry.data_type,
                array.data_type()
            )));
        }

        let template = self.header();
        let is_record = template.is_record_variable(&entry);
        let section = Section::from_origin_shape(origin, array.shape())?;

        let mut shape: Vec<usize> = entry
            .dim_ids
            .iter()
            .map(|&id| self.dimensions[id].length as usize)
            .collect();
        let needed = if is_record {
            section
                .range(0)
                .map_or(0, |r| (r.start() + r.count()) as u64)
        } else {
            0
        };
        if is_record {
            shape[0] = self.numrecs.max(needed) as usize;
        }
        section.validate(&shape).map_err(Netcdf3Error::Cdm)?;
        if needed > self.numrecs {
            self.extend_records(needed)?;
        }

        let elem = entry.data_type.size() as u64;
        let inner = if is_record { &shape[1..] } else { &shape[..] };
        let mut strides = vec![1u64; inner.len()];
        for i in (0..inner.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * inner[i + 1] as u64;
        }
        let offset = |coords: &[usize]| -> u64 {
            let (record, inner) = if is_record {
                (coords[0] as u64, &coords[1..])
            } else {
                (0, coords)
            };
            let linear: u64 = inner.iter().zip(&strides).map(|(&c, &s)| c as u64 * s).sum();
            entry.begin + record * self.record_size + linear * elem
        };

        let mut bytes = Vec::with_capacity(array.len() * elem as usize);
        encode_be(array.data(), &mut bytes).map_err(Netcdf3Error::Cdm)?;

        let run_contiguous = !(is_record && shape.len() == 1);
        let runs: Vec<(u64, std::ops::Range<usize>)> = match section.split_last() {
            None => vec![(entry.begin, 0..bytes.len())],
            Some((outer, last)) if run_contiguous => {
                let run = last.count() * elem as usize;
                outer
                    .iter()
                    .enumerate()
                    .map(|(k, mut coords)| {
                        coords.push(last.start());
                        (offset(&coords), k * run..(k + 1) * run)
                    })
                    .collect()
            }
            Some(_) => section
                .iter()
                .enumerate()
                .map(|(k, coords)| {
                    let e = elem as usize;
                    (offset(&coords), k * e..(k + 1) * e)
                })
                .collect(),
        };

        for (at, range) in runs {
            self.file.seek(SeekFrom::Start(at))?;
            self.file.write_all(&bytes[range])?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Netcdf3Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Flush and close, ending define mode first if needed.
    pub fn close(mut self) -> Netcdf3Result<()> {
        if self.defining {
            self.end_define()?;
        }
        self.file.flush()?;
        self.file.sync_all()?;
        info!(
            path = %self.path.display(),
            numrecs = self.numrecs,
            variables = self.variables.len(),
            "Closed classic file"
        );
        Ok(())
    }
}
