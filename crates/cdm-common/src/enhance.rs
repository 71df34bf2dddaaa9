//! Scale/offset and missing-value conversion of raw stored values.

use crate::array::Array;
use crate::attribute::{find_attribute, names, Attribute};

/// Converts packed values to physical values, mapping missing data to NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Enhancer {
    scale: f64,
    offset: f64,
    fill_value: Option<f64>,
    missing_values: Vec<f64>,
    valid_min: Option<f64>,
    valid_max: Option<f64>,
}

impl Default for Enhancer {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
            fill_value: None,
            missing_values: Vec::new(),
            valid_min: None,
            valid_max: None,
        }
    }
}

impl Enhancer {
    /// Read `scale_factor`, `add_offset`, `_FillValue`, `missing_value` and
    /// `valid_range` from a variable's attributes.
    pub fn from_attributes(attrs: &[Attribute]) -> Self {
        let number = |name: &str| find_attribute(attrs, name).and_then(Attribute::as_f64);

        let (valid_min, valid_max) = match find_attribute(attrs, names::VALID_RANGE) {
            Some(a) if a.value.len() >= 2 => (a.value.numeric(0), a.value.numeric(1)),
            _ => (None, None),
        };

        Self {
            scale: number(names::SCALE_FACTOR).unwrap_or(1.0),
            offset: number(names::ADD_OFFSET).unwrap_or(0.0),
            fill_value: number(names::FILL_VALUE),
            missing_values: find_attribute(attrs, names::MISSING_VALUE)
                .map(|a| a.value.numeric_values())
                .unwrap_or_default(),
            valid_min,
            valid_max,
        }
    }

    /// Whether applying this enhancer changes nothing.
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0
            && self.offset == 0.0
            && self.fill_value.is_none()
            && self.missing_values.is_empty()
            && self.valid_min.is_none()
            && self.valid_max.is_none()
    }

    /// Whether a raw stored value denotes missing data.
    pub fn is_missing(&self, raw: f64) -> bool {
        if raw.is_nan() {
            return true;
        }
        if self.fill_value == Some(raw) || self.missing_values.contains(&raw) {
            return true;
        }
        self.valid_min.map_or(false, |min| raw < min) || self.valid_max.map_or(false, |max| raw > max)
    }

    /// Convert one raw value.
    pub fn convert(&self, raw: f64) -> f64 {
        if self.is_missing(raw) {
            f64::NAN
        } else {
            raw * self.scale + self.offset
        }
    }

    /// Convert every element of an array, row-major.
    pub fn apply(&self, array: &Array) -> Vec<f64> {
        array
            .to_f64_vec()
            .into_iter()
            .map(|raw| self.convert(raw))
            .collect()
    }
}
