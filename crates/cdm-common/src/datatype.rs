//! Element data types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a variable, attribute or array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Byte,
    UByte,
    Char,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    Float,
    Double,
    String,
}

impl DataType {
    /// Size in bytes of one element as stored on disk.
    ///
    /// Strings have no fixed width and report 1 (one byte per character).
    pub fn size(&self) -> usize {
        match self {
            DataType::Byte | DataType::UByte | DataType::Char | DataType::String => 1,
            DataType::Short | DataType::UShort => 2,
            DataType::Int | DataType::UInt | DataType::Float => 4,
            DataType::Long | DataType::Double => 8,
        }
    }

    /// Whether values of this type participate in arithmetic.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DataType::Char | DataType::String)
    }

    /// Whether this is a floating point type.
    pub fn is_floating_point(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    /// Get the CDL keyword for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Byte => "byte",
            DataType::UByte => "ubyte",
            DataType::Char => "char",
            DataType::Short => "short",
            DataType::UShort => "ushort",
            DataType::Int => "int",
            DataType::UInt => "uint",
            DataType::Long => "int64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
