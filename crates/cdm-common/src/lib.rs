//! Common data model shared by the I/O service providers.
//!
//! This crate provides:
//! - The group / dimension / variable / attribute graph ([`ModelBuilder`], [`CdmModel`])
//! - Section and range algebra for addressing subsets of a variable
//! - In-memory arrays returned by data reads
//! - Scale/offset and missing-value enhancement
//! - The error type used by every provider

pub mod array;
pub mod attribute;
pub mod datatype;
pub mod dimension;
pub mod enhance;
pub mod error;
pub mod model;
pub mod section;
pub mod variable;

pub use array::{Array, ArrayData};
pub use attribute::{names, Attribute, AttributeValue};
pub use datatype::DataType;
pub use dimension::{make_dimensions_anon, make_dimensions_string, Dimension, DimensionFlags};
pub use enhance::Enhancer;
pub use error::{CdmError, CdmResult};
pub use model::{CdmModel, Group, GroupId, ModelBuilder};
pub use section::{Range, Section, SectionIter};
pub use variable::{ClassicLayout, DecodeContext, RadialLayout, Variable};
