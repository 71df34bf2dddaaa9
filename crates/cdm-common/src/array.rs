//! In-memory, row-major N-dimensional arrays returned by data reads.
//!
//! Arrays are plain values: they hold no reference to the file or the
//! variable they were read from.

use crate::datatype::DataType;
use crate::error::{CdmError, CdmResult};
use crate::section::Section;

/// Typed element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Byte(Vec<i8>),
    UByte(Vec<u8>),
    Char(Vec<u8>),
    Short(Vec<i16>),
    UShort(Vec<u16>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

macro_rules! for_each_vec {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Byte($v) => $body,
            ArrayData::UByte($v) => $body,
            ArrayData::Char($v) => $body,
            ArrayData::Short($v) => $body,
            ArrayData::UShort($v) => $body,
            ArrayData::Int($v) => $body,
            ArrayData::UInt($v) => $body,
            ArrayData::Long($v) => $body,
            ArrayData::Float($v) => $body,
            ArrayData::Double($v) => $body,
        }
    };
}

impl ArrayData {
    pub fn len(&self) -> usize {
        for_each_vec!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ArrayData::Byte(_) => DataType::Byte,
            ArrayData::UByte(_) => DataType::UByte,
            ArrayData::Char(_) => DataType::Char,
            ArrayData::Short(_) => DataType::Short,
            ArrayData::UShort(_) => DataType::UShort,
            ArrayData::Int(_) => DataType::Int,
            ArrayData::UInt(_) => DataType::UInt,
            ArrayData::Long(_) => DataType::Long,
            ArrayData::Float(_) => DataType::Float,
            ArrayData::Double(_) => DataType::Double,
        }
    }

    /// Gather the elements at the given linear positions into new storage.
    fn gather(&self, positions: impl Iterator<Item = usize>) -> ArrayData {
        match self {
            ArrayData::Byte(v) => ArrayData::Byte(positions.map(|i| v[i]).collect()),
            ArrayData::UByte(v) => ArrayData::UByte(positions.map(|i| v[i]).collect()),
            ArrayData::Char(v) => ArrayData::Char(positions.map(|i| v[i]).collect()),
            ArrayData::Short(v) => ArrayData::Short(positions.map(|i| v[i]).collect()),
            ArrayData::UShort(v) => ArrayData::UShort(positions.map(|i| v[i]).collect()),
            ArrayData::Int(v) => ArrayData::Int(positions.map(|i| v[i]).collect()),
            ArrayData::UInt(v) => ArrayData::UInt(positions.map(|i| v[i]).collect()),
            ArrayData::Long(v) => ArrayData::Long(positions.map(|i| v[i]).collect()),
            ArrayData::Float(v) => ArrayData::Float(positions.map(|i| v[i]).collect()),
            ArrayData::Double(v) => ArrayData::Double(positions.map(|i| v[i]).collect()),
        }
    }
}

/// An N-dimensional array of one element type.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    shape: Vec<usize>,
    data: ArrayData,
}

impl Array {
    /// Create an array, checking that the storage matches the shape.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> CdmResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(CdmError::range(format!(
                "shape {:?} needs {} elements, storage holds {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// A rank-0 array holding one element.
    pub fn scalar(data: ArrayData) -> CdmResult<Self> {
        Self::new(Vec::new(), data)
    }

    /// A one-dimensional char array from a string.
    pub fn from_text(text: &str) -> Self {
        Self {
            shape: vec![text.len()],
            data: ArrayData::Char(text.as_bytes().to_vec()),
        }
    }

    /// Evenly spaced float values, `start + i * increment`.
    pub fn linear_f32(n: usize, start: f64, increment: f64) -> Self {
        let values = (0..n).map(|i| (start + i as f64 * increment) as f32).collect();
        Self {
            shape: vec![n],
            data: ArrayData::Float(values),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    /// Element `i` (row-major) widened to f64; `None` past the end.
    pub fn get_f64(&self, i: usize) -> Option<f64> {
        match &self.data {
            ArrayData::Byte(v) => v.get(i).map(|&x| x as f64),
            ArrayData::UByte(v) => v.get(i).map(|&x| x as f64),
            ArrayData::Char(v) => v.get(i).map(|&x| x as f64),
            ArrayData::Short(v) => v.get(i).map(|&x| x as f64),
            ArrayData::UShort(v) => v.get(i).map(|&x| x as f64),
            ArrayData::Int(v) => v.get(i).map(|&x| x as f64),
            ArrayData::UInt(v) => v.get(i).map(|&x| x as f64),
            ArrayData::Long(v) => v.get(i).map(|&x| x as f64),
            ArrayData::Float(v) => v.get(i).map(|&x| x as f64),
            ArrayData::Double(v) => v.get(i).copied(),
        }
    }

    /// All elements widened to f64.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|i| self.get_f64(i)).collect()
    }

    pub fn as_bytes(&self) -> Option<&[i8]> {
        match &self.data {
            ArrayData::Byte(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ubytes(&self) -> Option<&[u8]> {
        match &self.data {
            ArrayData::UByte(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_chars(&self) -> Option<&[u8]> {
        match &self.data {
            ArrayData::Char(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_shorts(&self) -> Option<&[i16]> {
        match &self.data {
            ArrayData::Short(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i32]> {
        match &self.data {
            ArrayData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match &self.data {
            ArrayData::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_doubles(&self) -> Option<&[f64]> {
        match &self.data {
            ArrayData::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Decode a char array as fixed-width strings, one per element of the
    /// outer dimensions; the last dimension is the string width.
    ///
    /// Each string stops at the first NUL byte.
    pub fn strings(&self) -> CdmResult<Vec<String>> {
        let chars = self
            .as_chars()
            .ok_or_else(|| CdmError::Unsupported(format!("strings() on {} array", self.data_type())))?;
        let width = self.shape.last().copied().unwrap_or(chars.len());
        if width == 0 {
            let count = self.shape[..self.shape.len().saturating_sub(1)].iter().product();
            return Ok(vec![String::new(); count]);
        }
        Ok(chars
            .chunks(width)
            .map(|chunk| {
                let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
                String::from_utf8_lossy(&chunk[..end]).into_owned()
            })
            .collect())
    }

    /// Extract a rectangular subset of this array.
    pub fn section(&self, section: &Section) -> CdmResult<Array> {
        section.validate(&self.shape)?;
        let data = self.data.gather(section.linear_indices(&self.shape));
        Array::new(section.shape(), data)
    }
}
