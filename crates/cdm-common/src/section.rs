//! Index algebra for rectangular subsets of a variable's shape.
//!
//! A [`Range`] selects `count` indices along one dimension starting at
//! `start` and stepping by `stride`. A [`Section`] holds one range per
//! dimension. Iteration is row-major: the outermost dimension varies
//! slowest, which is the order decoders fill their output buffers in.

use std::fmt;

use crate::error::{CdmError, CdmResult};

/// Strided index range over a single dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    start: usize,
    count: usize,
    stride: usize,
}

impl Range {
    /// Create a range of `count` indices from `start` stepping by `stride`.
    ///
    /// The last index must be addressable, so [`Range::last`] and the
    /// iterators never overflow.
    pub fn new(start: usize, count: usize, stride: usize) -> CdmResult<Self> {
        if stride == 0 {
            return Err(CdmError::range("stride must be >= 1"));
        }
        if count > 0 {
            (count - 1)
                .checked_mul(stride)
                .and_then(|span| span.checked_add(start))
                .ok_or_else(|| {
                    CdmError::range(format!(
                        "range of {} from {} by {} overflows the index space",
                        count, start, stride
                    ))
                })?;
        }
        Ok(Self {
            start,
            count,
            stride,
        })
    }

    /// Create a range from inclusive bounds, `first..=last` by `stride`.
    pub fn from_bounds(first: usize, last: usize, stride: usize) -> CdmResult<Self> {
        if stride == 0 {
            return Err(CdmError::range("stride must be >= 1"));
        }
        if last < first {
            return Err(CdmError::range(format!(
                "range last {} is before first {}",
                last, first
            )));
        }
        Ok(Self {
            start: first,
            count: (last - first) / stride + 1,
            stride,
        })
    }

    /// Every index of a dimension of length `len`.
    pub fn full(len: usize) -> Self {
        Self {
            start: 0,
            count: len,
            stride: 1,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Last selected index (inclusive), `None` when the range is empty.
    pub fn last(&self) -> Option<usize> {
        if self.count == 0 {
            None
        } else {
            Some(self.start + (self.count - 1) * self.stride)
        }
    }

    /// The `i`-th selected index.
    pub fn element(&self, i: usize) -> usize {
        self.start + i * self.stride
    }

    /// Selected indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + Clone {
        let Range {
            start,
            count,
            stride,
        } = *self;
        (0..count).map(move |i| start + i * stride)
    }

    /// Check the range fits inside a dimension of length `len`.
    pub fn validate(&self, len: usize) -> CdmResult<()> {
        match self.last() {
            Some(last) if last >= len => Err(CdmError::range(format!(
                "range {} exceeds dimension length {}",
                self, len
            ))),
            None if self.start > len => Err(CdmError::range(format!(
                "empty range starts at {} past dimension length {}",
                self.start, len
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last() {
            None => write!(f, "{}:empty", self.start),
            Some(last) if self.stride == 1 => write!(f, "{}:{}", self.start, last),
            Some(last) => write!(f, "{}:{}:{}", self.start, last, self.stride),
        }
    }
}

/// Ordered list of ranges, one per dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Section {
    ranges: Vec<Range>,
}

impl Section {
    pub fn new(ranges: Vec<Range>) -> Self {
        Self { ranges }
    }

    /// Build from `(start, count, stride)` tuples.
    pub fn from_tuples(tuples: &[(usize, usize, usize)]) -> CdmResult<Self> {
        let ranges = tuples
            .iter()
            .map(|&(start, count, stride)| Range::new(start, count, stride))
            .collect::<CdmResult<Vec<_>>>()?;
        Ok(Self { ranges })
    }

    /// The whole of `shape`.
    pub fn full(shape: &[usize]) -> Self {
        Self {
            ranges: shape.iter().map(|&len| Range::full(len)).collect(),
        }
    }

    /// Unit-stride section from an origin and a shape.
    pub fn from_origin_shape(origin: &[usize], shape: &[usize]) -> CdmResult<Self> {
        if origin.len() != shape.len() {
            return Err(CdmError::range(format!(
                "origin rank {} does not match shape rank {}",
                origin.len(),
                shape.len()
            )));
        }
        let ranges = origin
            .iter()
            .zip(shape)
            .map(|(&start, &count)| Range::new(start, count, 1))
            .collect::<CdmResult<Vec<_>>>()?;
        Ok(Self { ranges })
    }

    /// Parse the textual form `start:stop[:stride],...` against a shape.
    ///
    /// `stop` is inclusive. A lone `:` selects the whole dimension and a lone
    /// integer selects that single index.
    pub fn parse(text: &str, shape: &[usize]) -> CdmResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::full(shape));
        }
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if parts.len() != shape.len() {
            return Err(CdmError::range(format!(
                "section '{}' has {} ranges for rank {}",
                text,
                parts.len(),
                shape.len()
            )));
        }

        let mut ranges = Vec::with_capacity(parts.len());
        for (part, &len) in parts.iter().zip(shape) {
            let range = if *part == ":" {
                Range::full(len)
            } else {
                let fields = part
                    .split(':')
                    .map(|f| {
                        f.trim().parse::<usize>().map_err(|_| {
                            CdmError::range(format!("invalid range '{}' in section '{}'", part, text))
                        })
                    })
                    .collect::<CdmResult<Vec<_>>>()?;
                match fields.as_slice() {
                    [single] => Range::new(*single, 1, 1)?,
                    [first, last] => Range::from_bounds(*first, *last, 1)?,
                    [first, last, stride] => Range::from_bounds(*first, *last, *stride)?,
                    _ => {
                        return Err(CdmError::range(format!(
                            "invalid range '{}' in section '{}'",
                            part, text
                        )))
                    }
                }
            };
            ranges.push(range);
        }

        let section = Self { ranges };
        section.validate(shape)?;
        Ok(section)
    }

    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn range(&self, i: usize) -> Option<&Range> {
        self.ranges.get(i)
    }

    /// Number of indices selected along each dimension.
    pub fn shape(&self) -> Vec<usize> {
        self.ranges.iter().map(Range::count).collect()
    }

    /// Total number of selected elements, saturating at `usize::MAX`.
    pub fn size(&self) -> usize {
        self.ranges
            .iter()
            .fold(1usize, |acc, r| acc.saturating_mul(r.count))
    }

    /// Split off the innermost range.
    pub fn split_last(&self) -> Option<(Section, Range)> {
        let (last, outer) = self.ranges.split_last()?;
        Some((
            Section {
                ranges: outer.to_vec(),
            },
            *last,
        ))
    }

    /// Check every range lies inside `shape`.
    pub fn validate(&self, shape: &[usize]) -> CdmResult<()> {
        if self.ranges.len() != shape.len() {
            return Err(CdmError::range(format!(
                "section rank {} does not match shape rank {}",
                self.ranges.len(),
                shape.len()
            )));
        }
        for (i, (range, &len)) in self.ranges.iter().zip(shape).enumerate() {
            range
                .validate(len)
                .map_err(|e| CdmError::range(format!("dimension {}: {}", i, e)))?;
        }
        Ok(())
    }

    /// Iterate the selected coordinates in row-major order.
    ///
    /// Each call starts a fresh iterator; no state is shared between them.
    pub fn iter(&self) -> SectionIter {
        SectionIter::new(self.ranges.clone())
    }

    /// Row-major linear offsets of the selected elements within a full
    /// array of `shape`.
    pub fn linear_indices(&self, shape: &[usize]) -> impl Iterator<Item = usize> {
        let mut strides = vec![1usize; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        self.iter()
            .map(move |coords| coords.iter().zip(&strides).map(|(c, s)| c * s).sum())
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", range)?;
        }
        Ok(())
    }
}

/// Lazy row-major iterator over the coordinates of a [`Section`].
#[derive(Debug, Clone)]
pub struct SectionIter {
    ranges: Vec<Range>,
    counter: Vec<usize>,
    done: bool,
}

impl SectionIter {
    fn new(ranges: Vec<Range>) -> Self {
        let done = ranges.iter().any(|r| r.count == 0);
        let counter = vec![0; ranges.len()];
        Self {
            ranges,
            counter,
            done,
        }
    }
}

impl Iterator for SectionIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let coords = self
            .ranges
            .iter()
            .zip(&self.counter)
            .map(|(r, &i)| r.element(i))
            .collect();

        // Odometer increment, innermost first.
        self.done = true;
        for dim in (0..self.ranges.len()).rev() {
            self.counter[dim] += 1;
            if self.counter[dim] < self.ranges[dim].count {
                self.done = false;
                break;
            }
            self.counter[dim] = 0;
        }
        Some(coords)
    }
}
