//! Dimensions: named or anonymous axes of a variable's shape.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::error::{CdmError, CdmResult};
use crate::model::GroupId;

/// Length reported by variable-length dimensions.
pub const VLEN_LENGTH: i64 = -1;

/// Dimension kind flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DimensionFlags {
    pub shared: bool,
    pub unlimited: bool,
    pub variable_length: bool,
}

impl DimensionFlags {
    pub const SHARED: Self = Self {
        shared: true,
        unlimited: false,
        variable_length: false,
    };
    pub const UNLIMITED: Self = Self {
        shared: true,
        unlimited: true,
        variable_length: false,
    };
    pub const PRIVATE: Self = Self {
        shared: false,
        unlimited: false,
        variable_length: false,
    };
    pub const VARIABLE_LENGTH: Self = Self {
        shared: false,
        unlimited: false,
        variable_length: true,
    };
}

/// A dimension.
///
/// The length is held in a cell shared by every clone of the dimension, so
/// growing an unlimited dimension after the model is frozen is seen by all
/// variables and readers holding it.
///
/// Two dimensions are equal when owning group, name, length and flags all
/// match. [`Dimension::name_order`] orders by name only and therefore
/// disagrees with `==` for same-named dimensions of different length;
/// `Ord` is deliberately not implemented.
#[derive(Debug, Clone)]
pub struct Dimension {
    name: Option<String>,
    length: Arc<AtomicI64>,
    flags: DimensionFlags,
    group: Option<GroupId>,
}

impl Dimension {
    /// Create a dimension, checking the length rules for its flags.
    pub fn with_flags(name: Option<String>, length: i64, flags: DimensionFlags) -> CdmResult<Self> {
        if flags.variable_length {
            if flags.shared || flags.unlimited {
                return Err(CdmError::schema(
                    "variable-length dimension cannot be shared or unlimited",
                ));
            }
            if length != VLEN_LENGTH {
                return Err(CdmError::range(format!(
                    "variable-length dimension must have length -1, got {}",
                    length
                )));
            }
        } else if flags.unlimited {
            if length < 0 {
                return Err(CdmError::range(format!(
                    "unlimited dimension length must be >= 0, got {}",
                    length
                )));
            }
        } else if length < 1 {
            return Err(CdmError::range(format!(
                "dimension length must be >= 1, got {}",
                length
            )));
        }

        if flags.shared && name.as_deref().map_or(true, str::is_empty) {
            return Err(CdmError::schema("shared dimension must have a name"));
        }

        Ok(Self {
            name,
            length: Arc::new(AtomicI64::new(length)),
            flags,
            group: None,
        })
    }

    /// A shared, fixed-length, named dimension.
    pub fn new(name: impl Into<String>, length: usize) -> CdmResult<Self> {
        Self::with_flags(Some(name.into()), length as i64, DimensionFlags::SHARED)
    }

    /// A shared unlimited dimension with its current length.
    pub fn unlimited(name: impl Into<String>, length: usize) -> CdmResult<Self> {
        Self::with_flags(Some(name.into()), length as i64, DimensionFlags::UNLIMITED)
    }

    /// A private, unnamed dimension.
    pub fn anonymous(length: usize) -> CdmResult<Self> {
        Self::with_flags(None, length as i64, DimensionFlags::PRIVATE)
    }

    /// A variable-length dimension.
    pub fn vlen() -> Self {
        Self {
            name: None,
            length: Arc::new(AtomicI64::new(VLEN_LENGTH)),
            flags: DimensionFlags::VARIABLE_LENGTH,
            group: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current length; -1 for variable-length dimensions.
    pub fn length(&self) -> i64 {
        self.length.load(AtomicOrdering::Acquire)
    }

    /// Current length as an index extent (0 for variable-length).
    pub fn extent(&self) -> usize {
        self.length().max(0) as usize
    }

    pub fn flags(&self) -> DimensionFlags {
        self.flags
    }

    pub fn is_shared(&self) -> bool {
        self.flags.shared
    }

    pub fn is_unlimited(&self) -> bool {
        self.flags.unlimited
    }

    pub fn is_variable_length(&self) -> bool {
        self.flags.variable_length
    }

    /// The owning group, set when the dimension is added to a model.
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub(crate) fn set_group(&mut self, group: GroupId) {
        self.group = Some(group);
    }

    /// Grow an unlimited dimension. Shrinking is an error.
    pub(crate) fn grow(&self, new_length: usize) -> CdmResult<()> {
        if !self.flags.unlimited {
            return Err(CdmError::Frozen(format!(
                "dimension {} is not unlimited",
                self.display_name()
            )));
        }
        let new_length = new_length as i64;
        let previous = self.length.fetch_max(new_length, AtomicOrdering::AcqRel);
        if new_length < previous {
            return Err(CdmError::range(format!(
                "cannot shrink unlimited dimension {} from {} to {}",
                self.display_name(),
                previous,
                new_length
            )));
        }
        Ok(())
    }

    /// Order by name only (unnamed dimensions first).
    pub fn name_order(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }

    /// One-line CDL declaration.
    pub fn write_cdl(&self) -> String {
        let name = self.display_name();
        if self.flags.unlimited {
            format!("{} = UNLIMITED;   // ({} currently)", name, self.length())
        } else if self.flags.variable_length {
            format!("{} = UNKNOWN;", name)
        } else {
            format!("{} = {};", name, self.length())
        }
    }

    fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.dimension_token(),
        }
    }

    /// Token used in dimension strings: name, length or `*`.
    pub fn dimension_token(&self) -> String {
        if self.flags.variable_length {
            "*".to_string()
        } else if self.flags.shared {
            self.name.clone().unwrap_or_default()
        } else {
            self.length().to_string()
        }
    }
}

impl PartialEq for Dimension {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group
            && self.name == other.name
            && self.length() == other.length()
            && self.flags == other.flags
    }
}

impl Eq for Dimension {}

impl Hash for Dimension {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group.hash(state);
        self.name.hash(state);
        self.length().hash(state);
        self.flags.hash(state);
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dimension_token())
    }
}

/// Render a dimension list as a dimension string.
///
/// Shared dimensions render as their name, private ones as their length and
/// variable-length ones as `*`.
pub fn make_dimensions_string(dims: &[Dimension]) -> String {
    dims.iter()
        .map(Dimension::dimension_token)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Anonymous dimensions for a shape; negative entries become variable-length.
pub fn make_dimensions_anon(shape: &[i64]) -> CdmResult<Vec<Dimension>> {
    shape
        .iter()
        .map(|&len| {
            if len < 0 {
                Ok(Dimension::vlen())
            } else {
                Dimension::with_flags(None, len, DimensionFlags::PRIVATE)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_visible_through_clones() {
        let d = Dimension::unlimited("time", 2).unwrap();
        let clone = d.clone();
        d.grow(5).unwrap();
        assert_eq!(clone.length(), 5);
    }

    #[test]
    fn test_shrink_rejected() {
        let d = Dimension::unlimited("time", 4).unwrap();
        assert!(matches!(d.grow(3), Err(CdmError::Range(_))));
        assert_eq!(d.length(), 4);
    }

    #[test]
    fn test_grow_fixed_rejected() {
        let d = Dimension::new("x", 4).unwrap();
        assert!(matches!(d.grow(8), Err(CdmError::Frozen(_))));
    }

    #[test]
    fn test_write_cdl() {
        assert_eq!(
            Dimension::unlimited("time", 3).unwrap().write_cdl(),
            "time = UNLIMITED;   // (3 currently)"
        );
        assert_eq!(Dimension::new("lat", 10).unwrap().write_cdl(), "lat = 10;");
    }
}
