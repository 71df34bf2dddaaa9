//! Classic netCDF header codec.
//!
//! ```text
//! header   := magic numrecs dim_list gatt_list var_list
//! magic    := 'C' 'D' 'F' VERSION            (1 = 32-bit offsets, 2 = 64-bit)
//! numrecs  := NON_NEG | STREAMING            (STREAMING = 0xFFFFFFFF)
//! dim_list := ABSENT | NC_DIMENSION nelems [dim ...]
//! dim      := name dim_length                (0 = the record dimension)
//! attr     := name nc_type nelems [values ...] padding
//! var      := name nelems [dimid ...] vatt_list nc_type vsize begin
//! name     := nelems chars padding
//! ABSENT   := ZERO ZERO
//! ```
//!
//! All integers are big-endian and every variable-length field is padded
//! with zero bytes to a 4-byte boundary.

use cdm_common::{Attribute, AttributeValue, DataType};
use nom::bytes::complete::{tag, take};
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u32, be_u64, be_u8};
use nom::IResult;

use crate::error::{Netcdf3Error, Netcdf3Result};

type PResult<'a, T> = IResult<&'a [u8], T>;

pub const MAGIC: &[u8; 3] = b"CDF";
pub const STREAMING: u32 = 0xFFFF_FFFF;
pub const NC_DIMENSION: u32 = 0x0A;
pub const NC_VARIABLE: u32 = 0x0B;
pub const NC_ATTRIBUTE: u32 = 0x0C;

/// Byte offset of the `numrecs` field.
pub const NUMRECS_OFFSET: u64 = 4;

/// Format version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// 32-bit `begin` offsets.
    Classic,
    /// 64-bit `begin` offsets.
    Offset64,
}

impl Version {
    pub fn byte(&self) -> u8 {
        match self {
            Version::Classic => 1,
            Version::Offset64 => 2,
        }
    }
}

/// A dimension entry; length 0 marks the record dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionEntry {
    pub name: String,
    pub length: u64,
}

/// A variable entry.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    pub name: String,
    pub dim_ids: Vec<usize>,
    pub attributes: Vec<Attribute>,
    pub data_type: DataType,
    pub vsize: u64,
    pub begin: u64,
}

/// Parsed classic header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: Version,
    /// Record count; `None` while a writer is streaming.
    pub numrecs: Option<u64>,
    pub dimensions: Vec<DimensionEntry>,
    pub attributes: Vec<Attribute>,
    pub variables: Vec<VariableEntry>,
}

/// nc_type code for a data type, if classic files can store it.
pub fn nc_type_code(data_type: DataType) -> Option<u32> {
    match data_type {
        DataType::Byte => Some(1),
        DataType::Char => Some(2),
        DataType::Short => Some(3),
        DataType::Int => Some(4),
        DataType::Float => Some(5),
        DataType::Double => Some(6),
        _ => None,
    }
}

pub fn data_type_from_code(code: u32) -> Option<DataType> {
    match code {
        1 => Some(DataType::Byte),
        2 => Some(DataType::Char),
        3 => Some(DataType::Short),
        4 => Some(DataType::Int),
        5 => Some(DataType::Float),
        6 => Some(DataType::Double),
        _ => None,
    }
}

/// Zero bytes needed to pad `n` to a 4-byte boundary.
fn pad_len(n: usize) -> usize {
    (4 - n % 4) % 4
}

fn fail<T>(input: &[u8], kind: ErrorKind) -> PResult<'_, T> {
    Err(nom::Err::Failure(NomError::new(input, kind)))
}

fn be_array<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(chunk);
    out
}

// ===== Parsers =====

fn version(input: &[u8]) -> PResult<'_, Version> {
    let (i, _) = tag(&MAGIC[..])(input)?;
    let (rest, v) = be_u8(i)?;
    match v {
        1 => Ok((rest, Version::Classic)),
        2 => Ok((rest, Version::Offset64)),
        _ => fail(i, ErrorKind::Tag),
    }
}

fn name(input: &[u8]) -> PResult<'_, String> {
    let (i, n) = be_u32(input)?;
    let n = n as usize;
    let (i, raw) = take(n)(i)?;
    let (i, _) = take(pad_len(n))(i)?;
    match std::str::from_utf8(raw) {
        Ok(s) => Ok((i, s.to_string())),
        Err(_) => fail(raw, ErrorKind::Char),
    }
}

fn nc_type(input: &[u8]) -> PResult<'_, DataType> {
    let (rest, code) = be_u32(input)?;
    match data_type_from_code(code) {
        Some(t) => Ok((rest, t)),
        None => fail(input, ErrorKind::Switch),
    }
}

fn decode_values(data_type: DataType, raw: &[u8]) -> AttributeValue {
    match data_type {
        DataType::Byte => AttributeValue::Bytes(raw.iter().map(|&b| b as i8).collect()),
        DataType::Char => {
            AttributeValue::Text(String::from_utf8_lossy(raw).trim_end_matches('\0').to_string())
        }
        DataType::Short => AttributeValue::Shorts(
            raw.chunks_exact(2)
                .map(|c| i16::from_be_bytes(be_array(c)))
                .collect(),
        ),
        DataType::Int => AttributeValue::Ints(
            raw.chunks_exact(4)
                .map(|c| i32::from_be_bytes(be_array(c)))
                .collect(),
        ),
        DataType::Float => AttributeValue::Floats(
            raw.chunks_exact(4)
                .map(|c| f32::from_be_bytes(be_array(c)))
                .collect(),
        ),
        DataType::Double => AttributeValue::Doubles(
            raw.chunks_exact(8)
                .map(|c| f64::from_be_bytes(be_array(c)))
                .collect(),
        ),
        _ => AttributeValue::UBytes(raw.to_vec()),
    }
}

fn attribute(input: &[u8]) -> PResult<'_, Attribute> {
    let (i, name) = name(input)?;
    let (i, data_type) = nc_type(i)?;
    let (i, nelems) = be_u32(i)?;
    let len = nelems as usize * data_type.size();
    let (i, raw) = take(len)(i)?;
    let (i, _) = take(pad_len(len))(i)?;
    Ok((
        i,
        Attribute {
            name,
            value: decode_values(data_type, raw),
        },
    ))
}

/// A tagged list, or ABSENT.
fn list<'a, T>(
    input: &'a [u8],
    expected: u32,
    item: impl Fn(&'a [u8]) -> PResult<'a, T>,
) -> PResult<'a, Vec<T>> {
    let (i, list_tag) = be_u32(input)?;
    let (mut i, nelems) = be_u32(i)?;
    if nelems == 0 && (list_tag == 0 || list_tag == expected) {
        return Ok((i, Vec::new()));
    }
    if list_tag != expected {
        return fail(input, ErrorKind::Tag);
    }
    let mut out = Vec::with_capacity((nelems as usize).min(1024));
    for _ in 0..nelems {
        let (rest, value) = item(i)?;
        out.push(value);
        i = rest;
    }
    Ok((i, out))
}

fn dimension(input: &[u8]) -> PResult<'_, DimensionEntry> {
    let (i, name) = name(input)?;
    let (i, length) = be_u32(i)?;
    Ok((
        i,
        DimensionEntry {
            name,
            length: length as u64,
        },
    ))
}

fn variable(input: &[u8], version: Version) -> PResult<'_, VariableEntry> {
    let (i, name) = name(input)?;
    let (mut i, ndims) = be_u32(i)?;
    let mut dim_ids = Vec::with_capacity((ndims as usize).min(64));
    for _ in 0..ndims {
        let (rest, id) = be_u32(i)?;
        dim_ids.push(id as usize);
        i = rest;
    }
    let (i, attributes) = list(i, NC_ATTRIBUTE, attribute)?;
    let (i, data_type) = nc_type(i)?;
    let (i, vsize) = be_u32(i)?;
    let (i, begin) = match version {
        Version::Classic => {
            let (i, b) = be_u32(i)?;
            (i, b as u64)
        }
        Version::Offset64 => be_u64(i)?,
    };
    Ok((
        i,
        VariableEntry {
            name,
            dim_ids,
            attributes,
            data_type,
            vsize: vsize as u64,
            begin,
        },
    ))
}

fn header(input: &[u8]) -> PResult<'_, Header> {
    let (i, version) = version(input)?;
    let (i, numrecs) = be_u32(i)?;
    let (i, dimensions) = list(i, NC_DIMENSION, dimension)?;
    let (i, attributes) = list(i, NC_ATTRIBUTE, attribute)?;
    let (i, variables) = list(i, NC_VARIABLE, |i| variable(i, version))?;
    Ok((
        i,
        Header {
            version,
            numrecs: (numrecs != STREAMING).then_some(numrecs as u64),
            dimensions,
            attributes,
            variables,
        },
    ))
}

fn describe(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Tag => "bad magic, version or list tag",
        ErrorKind::Switch => "unknown nc_type",
        ErrorKind::Char => "name is not valid UTF-8",
        _ => "malformed header",
    }
}

/// Parse a header from the start of `data`.
///
/// Returns the header and its encoded length. A header that runs past the
/// end of `data` yields [`Netcdf3Error::Truncated`] so callers can retry
/// with more bytes.
pub fn parse_header(data: &[u8]) -> Netcdf3Result<(Header, usize)> {
    match header(data) {
        Ok((rest, h)) => {
            h.validate()?;
            Ok((h, data.len() - rest.len()))
        }
        Err(nom::Err::Incomplete(_)) => Err(Netcdf3Error::Truncated(data.len())),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = data.len() - e.input.len();
            if e.code == ErrorKind::Eof {
                Err(Netcdf3Error::Truncated(offset))
            } else {
                Err(Netcdf3Error::InvalidFormat(format!(
                    "{} at byte {}",
                    describe(e.code),
                    offset
                )))
            }
        }
    }
}

// ===== Queries =====

impl Header {
    /// Index of the record (unlimited) dimension.
    pub fn record_dimension(&self) -> Option<usize> {
        self.dimensions.iter().position(|d| d.length == 0)
    }

    pub fn is_record_variable(&self, var: &VariableEntry) -> bool {
        match (var.dim_ids.first(), self.record_dimension()) {
            (Some(&first), Some(record)) => first == record,
            _ => false,
        }
    }

    /// Bytes of one record's worth of data (the whole variable for
    /// non-record variables), before padding.
    pub fn natural_extent(&self, var: &VariableEntry) -> Netcdf3Result<u64> {
        let skip = usize::from(self.is_record_variable(var));
        var.dim_ids[skip..]
            .iter()
            .map(|&id| self.dimensions[id].length)
            .try_fold(var.data_type.size() as u64, u64::checked_mul)
            .ok_or_else(|| {
                Netcdf3Error::InvalidFormat(format!("variable {} extent overflows 64 bits", var.name))
            })
    }

    /// Check the layout arithmetic the reader and writer rely on: every
    /// extent, its padding and the summed data size fit in 64 bits.
    fn validate_extents(&self) -> Netcdf3Result<()> {
        let mut total = 0u64;
        for var in &self.variables {
            total = self
                .natural_extent(var)?
                .checked_add(3)
                .and_then(|padded| total.checked_add(padded))
                .ok_or_else(|| {
                    Netcdf3Error::InvalidFormat(format!(
                        "data size overflows 64 bits at variable {}",
                        var.name
                    ))
                })?;
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Netcdf3Result<()> {
        let record_dims = self.dimensions.iter().filter(|d| d.length == 0).count();
        if record_dims > 1 {
            return Err(Netcdf3Error::InvalidFormat(format!(
                "{} record dimensions, at most one allowed",
                record_dims
            )));
        }
        let record = self.record_dimension();
        for var in &self.variables {
            for (pos, &id) in var.dim_ids.iter().enumerate() {
                if id >= self.dimensions.len() {
                    return Err(Netcdf3Error::InvalidFormat(format!(
                        "variable {} refers to dimension id {} of {}",
                        var.name,
                        id,
                        self.dimensions.len()
                    )));
                }
                if pos > 0 && Some(id) == record {
                    return Err(Netcdf3Error::InvalidFormat(format!(
                        "variable {} uses the record dimension past position 0",
                        var.name
                    )));
                }
            }
        }
        self.validate_extents()
    }

    // ===== Encoding =====

    /// Encode the header.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(MAGIC);
        buf.push(self.version.byte());
        let numrecs = match self.numrecs {
            Some(n) => n as u32,
            None => STREAMING,
        };
        put_u32(&mut buf, numrecs);

        put_list_tag(&mut buf, NC_DIMENSION, self.dimensions.len());
        for dim in &self.dimensions {
            put_name(&mut buf, &dim.name);
            put_u32(&mut buf, dim.length as u32);
        }

        put_attributes(&mut buf, &self.attributes);

        put_list_tag(&mut buf, NC_VARIABLE, self.variables.len());
        for var in &self.variables {
            put_name(&mut buf, &var.name);
            put_u32(&mut buf, var.dim_ids.len() as u32);
            for &id in &var.dim_ids {
                put_u32(&mut buf, id as u32);
            }
            put_attributes(&mut buf, &var.attributes);
            put_u32(&mut buf, nc_type_code(var.data_type).unwrap_or(1));
            put_u32(&mut buf, var.vsize.min(u32::MAX as u64) as u32);
            match self.version {
                Version::Classic => put_u32(&mut buf, var.begin as u32),
                Version::Offset64 => buf.extend_from_slice(&var.begin.to_be_bytes()),
            }
        }
        buf
    }
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_padding(buf: &mut Vec<u8>, n: usize) {
    buf.resize(buf.len() + pad_len(n), 0);
}

fn put_name(buf: &mut Vec<u8>, name: &str) {
    put_u32(buf, name.len() as u32);
    buf.extend_from_slice(name.as_bytes());
    put_padding(buf, name.len());
}

fn put_list_tag(buf: &mut Vec<u8>, list_tag: u32, n: usize) {
    if n == 0 {
        put_u32(buf, 0);
        put_u32(buf, 0);
    } else {
        put_u32(buf, list_tag);
        put_u32(buf, n as u32);
    }
}

fn put_attributes(buf: &mut Vec<u8>, attrs: &[Attribute]) {
    put_list_tag(buf, NC_ATTRIBUTE, attrs.len());
    for attr in attrs {
        put_name(buf, &attr.name);
        let start = buf.len() + 8;
        let (code, n) = match &attr.value {
            AttributeValue::Text(s) => (2, s.len()),
            AttributeValue::Bytes(v) => (1, v.len()),
            AttributeValue::UBytes(v) => (1, v.len()),
            AttributeValue::Shorts(v) => (3, v.len()),
            AttributeValue::Ints(v) => (4, v.len()),
            AttributeValue::Floats(v) => (5, v.len()),
            AttributeValue::Doubles(v) => (6, v.len()),
        };
        put_u32(buf, code);
        put_u32(buf, n as u32);
        match &attr.value {
            AttributeValue::Text(s) => buf.extend_from_slice(s.as_bytes()),
            AttributeValue::Bytes(v) => buf.extend(v.iter().map(|&b| b as u8)),
            AttributeValue::UBytes(v) => buf.extend_from_slice(v),
            AttributeValue::Shorts(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes())),
            AttributeValue::Ints(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes())),
            AttributeValue::Floats(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes())),
            AttributeValue::Doubles(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes())),
        }
        let written = buf.len() - start;
        put_padding(buf, written);
    }
}
