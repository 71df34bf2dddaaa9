//! Variables and their per-format decode context.

use crate::array::Array;
use crate::attribute::{find_attribute, Attribute};
use crate::datatype::DataType;
use crate::dimension::{make_dimensions_string, Dimension};
use crate::error::{CdmError, CdmResult};
use crate::model::GroupId;

/// Byte placement of a classic-format variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassicLayout {
    /// File offset of the variable's first byte (first record for record
    /// variables).
    pub begin: u64,
    /// Bytes consumed per record (record variables) or in total.
    pub vsize: u64,
    /// Whether the variable is interleaved along the unlimited dimension.
    pub is_record: bool,
}

/// Locator of a radar moment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadialLayout {
    /// Which scan table the variable is indexed by.
    pub table: usize,
    /// Which moment within a radial record.
    pub moment: usize,
}

/// Format-specific decode context, set by the provider that built the
/// variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeContext {
    #[default]
    None,
    Classic(ClassicLayout),
    Radial(RadialLayout),
}

impl DecodeContext {
    pub fn as_classic(&self) -> Option<&ClassicLayout> {
        match self {
            DecodeContext::Classic(layout) => Some(layout),
            _ => None,
        }
    }

    pub fn as_radial(&self) -> Option<&RadialLayout> {
        match self {
            DecodeContext::Radial(layout) => Some(layout),
            _ => None,
        }
    }
}

/// A named, typed N-dimensional variable.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    data_type: DataType,
    dimensions: Vec<Dimension>,
    attributes: Vec<Attribute>,
    cache: Option<Array>,
    decode: DecodeContext,
    group: Option<GroupId>,
}

impl Variable {
    pub fn new(name: impl Into<String>, data_type: DataType, dimensions: Vec<Dimension>) -> Self {
        Self {
            name: name.into(),
            data_type,
            dimensions,
            attributes: Vec::new(),
            cache: None,
            decode: DecodeContext::None,
            group: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimensions_string(&self) -> String {
        make_dimensions_string(&self.dimensions)
    }

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// Current shape. Unlimited dimensions report their current length.
    pub fn shape(&self) -> Vec<usize> {
        self.dimensions.iter().map(Dimension::extent).collect()
    }

    /// Total number of elements in the current shape.
    pub fn size(&self) -> usize {
        self.shape().iter().product()
    }

    /// Whether the outermost dimension is unlimited.
    pub fn is_unlimited(&self) -> bool {
        self.dimensions
            .first()
            .map_or(false, Dimension::is_unlimited)
    }

    pub fn element_size(&self) -> usize {
        self.data_type.size()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        find_attribute(&self.attributes, name)
    }

    /// Add an attribute, replacing any attribute of the same name.
    pub fn add_attribute(&mut self, attribute: Attribute) {
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.add_attribute(attribute);
        self
    }

    pub fn cached_data(&self) -> Option<&Array> {
        self.cache.as_ref()
    }

    /// Attach in-memory data. The array shape must match the variable shape.
    pub fn set_cached_data(&mut self, array: Array) -> CdmResult<()> {
        let shape = self.shape();
        if array.shape() != shape.as_slice() {
            return Err(CdmError::range(format!(
                "cached array shape {:?} does not match {} shape {:?}",
                array.shape(),
                self.name,
                shape
            )));
        }
        self.cache = Some(array);
        Ok(())
    }

    pub fn decode_context(&self) -> &DecodeContext {
        &self.decode
    }

    pub fn set_decode_context(&mut self, decode: DecodeContext) {
        self.decode = decode;
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub(crate) fn set_group(&mut self, group: GroupId) {
        self.group = Some(group);
    }

    pub(crate) fn dimensions_mut(&mut self) -> &mut [Dimension] {
        &mut self.dimensions
    }
}
