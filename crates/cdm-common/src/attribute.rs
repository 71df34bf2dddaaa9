//! Named, typed attribute values attached to groups and variables.

use crate::datatype::DataType;

/// Well-known attribute names.
pub mod names {
    pub const UNITS: &str = "units";
    pub const LONG_NAME: &str = "long_name";
    pub const MISSING_VALUE: &str = "missing_value";
    pub const FILL_VALUE: &str = "_FillValue";
    pub const SCALE_FACTOR: &str = "scale_factor";
    pub const ADD_OFFSET: &str = "add_offset";
    pub const VALID_RANGE: &str = "valid_range";
    pub const CONVENTIONS: &str = "Conventions";
    pub const HISTORY: &str = "history";
    pub const FEATURE_TYPE: &str = "featureType";
    pub const COORDINATE_AXES: &str = "_CoordinateAxes";
    pub const COORDINATE_AXIS_TYPE: &str = "_CoordinateAxisType";
}

/// A scalar or vector attribute payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Bytes(Vec<i8>),
    UBytes(Vec<u8>),
    Shorts(Vec<i16>),
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Doubles(Vec<f64>),
}

impl AttributeValue {
    /// Element type of the payload.
    pub fn data_type(&self) -> DataType {
        match self {
            AttributeValue::Text(_) => DataType::Char,
            AttributeValue::Bytes(_) => DataType::Byte,
            AttributeValue::UBytes(_) => DataType::UByte,
            AttributeValue::Shorts(_) => DataType::Short,
            AttributeValue::Ints(_) => DataType::Int,
            AttributeValue::Floats(_) => DataType::Float,
            AttributeValue::Doubles(_) => DataType::Double,
        }
    }

    /// Number of elements (characters for text).
    pub fn len(&self) -> usize {
        match self {
            AttributeValue::Text(s) => s.len(),
            AttributeValue::Bytes(v) => v.len(),
            AttributeValue::UBytes(v) => v.len(),
            AttributeValue::Shorts(v) => v.len(),
            AttributeValue::Ints(v) => v.len(),
            AttributeValue::Floats(v) => v.len(),
            AttributeValue::Doubles(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric element `i` widened to f64, `None` for text or out of range.
    pub fn numeric(&self, i: usize) -> Option<f64> {
        match self {
            AttributeValue::Text(_) => None,
            AttributeValue::Bytes(v) => v.get(i).map(|&x| x as f64),
            AttributeValue::UBytes(v) => v.get(i).map(|&x| x as f64),
            AttributeValue::Shorts(v) => v.get(i).map(|&x| x as f64),
            AttributeValue::Ints(v) => v.get(i).map(|&x| x as f64),
            AttributeValue::Floats(v) => v.get(i).map(|&x| x as f64),
            AttributeValue::Doubles(v) => v.get(i).copied(),
        }
    }

    /// All numeric elements widened to f64 (empty for text).
    pub fn numeric_values(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|i| self.numeric(i)).collect()
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

macro_rules! scalar_attribute {
    ($t:ty, $variant:ident) => {
        impl From<$t> for AttributeValue {
            fn from(v: $t) -> Self {
                AttributeValue::$variant(vec![v])
            }
        }

        impl From<Vec<$t>> for AttributeValue {
            fn from(v: Vec<$t>) -> Self {
                AttributeValue::$variant(v)
            }
        }
    };
}

scalar_attribute!(i8, Bytes);
scalar_attribute!(u8, UBytes);
scalar_attribute!(i16, Shorts);
scalar_attribute!(i32, Ints);
scalar_attribute!(f32, Floats);
scalar_attribute!(f64, Doubles);

/// A named attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// First numeric element, if any.
    pub fn as_f64(&self) -> Option<f64> {
        self.value.numeric(0)
    }

    pub fn as_text(&self) -> Option<&str> {
        self.value.as_text()
    }
}

/// Find an attribute by name in a slice.
pub fn find_attribute<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attrs.iter().find(|a| a.name == name)
}
