//! Section reads over the classic data layout.

use cdm_common::{Array, CdmError, CdmResult, ClassicLayout, Section, Variable};
use iosp::{ByteSource, CancelToken};

use crate::values::decode_be;

/// Above this many bytes between strided elements, read elements one by one
/// instead of the whole span.
const MAX_STRIDE_GAP: u64 = 256;

/// Byte offsets of variable elements.
struct Locator {
    begin: u64,
    record_size: u64,
    is_record: bool,
    /// Row-major element strides of the addressed (per-record) shape.
    strides: Vec<u64>,
    elem: u64,
}

impl Locator {
    fn new(var: &Variable, layout: &ClassicLayout, record_size: u64) -> Self {
        let shape = var.shape();
        let inner = if layout.is_record { &shape[1..] } else { &shape[..] };
        let mut strides = vec![1u64; inner.len()];
        for i in (0..inner.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * inner[i + 1] as u64;
        }
        Self {
            begin: layout.begin,
            record_size,
            is_record: layout.is_record,
            strides,
            elem: var.element_size() as u64,
        }
    }

    fn offset(&self, coords: &[usize]) -> u64 {
        let (record, inner) = if self.is_record {
            (coords[0] as u64, &coords[1..])
        } else {
            (0, coords)
        };
        let linear: u64 = inner
            .iter()
            .zip(&self.strides)
            .map(|(&c, &s)| c as u64 * s)
            .sum();
        self.begin + record * self.record_size + linear * self.elem
    }
}

/// Read `section` of a classic variable.
///
/// Each innermost run is fetched with one positioned read; strided runs
/// with wide gaps are read element by element.
pub fn read_section(
    source: &dyn ByteSource,
    var: &Variable,
    layout: &ClassicLayout,
    record_size: u64,
    section: &Section,
    cancel: &CancelToken,
) -> CdmResult<Array> {
    let shape = var.shape();
    section.validate(&shape)?;

    let elem = var.element_size() as u64;
    let per_record: u64 = if layout.is_record {
        shape[1..].iter().map(|&n| n as u64).product::<u64>() * elem
    } else {
        shape.iter().map(|&n| n as u64).product::<u64>() * elem
    };
    if per_record > layout.vsize {
        return Err(CdmError::range(format!(
            "{} needs {} bytes per record but only {} are reserved",
            var.name(),
            per_record,
            layout.vsize
        )));
    }

    let locator = Locator::new(var, layout, record_size);
    let mut raw = Vec::with_capacity(section.size() * elem as usize);

    match section.split_last() {
        None => {
            let mut buf = vec![0u8; elem as usize];
            source.read_at(locator.begin, &mut buf)?;
            raw.extend_from_slice(&buf);
        }
        Some((_, last)) if last.count() == 0 => {}
        Some((outer, last)) => {
            let total = outer.size();
            // A rank-1 record variable steps whole records along its only axis.
            let unit = if layout.is_record && shape.len() == 1 {
                record_size
            } else {
                elem
            };
            let stride_bytes = last.stride() as u64 * unit;
            for (row, mut coords) in outer.iter().enumerate() {
                cancel.check(row, total)?;
                coords.push(last.start());
                let start = locator.offset(&coords);

                if stride_bytes == elem {
                    let mut buf = vec![0u8; (last.count() as u64 * elem) as usize];
                    source.read_at(start, &mut buf)?;
                    raw.extend_from_slice(&buf);
                } else if stride_bytes <= MAX_STRIDE_GAP {
                    let span = (last.count() as u64 - 1) * stride_bytes + elem;
                    let buf = source.read_vec(start, span as usize)?;
                    for k in 0..last.count() as u64 {
                        let at = (k * stride_bytes) as usize;
                        raw.extend_from_slice(&buf[at..at + elem as usize]);
                    }
                } else {
                    let mut buf = vec![0u8; elem as usize];
                    for k in 0..last.count() as u64 {
                        source.read_at(start + k * stride_bytes, &mut buf)?;
                        raw.extend_from_slice(&buf);
                    }
                }
            }
        }
    }

    let data = decode_be(var.data_type(), &raw)?;
    Array::new(section.shape(), data)
}
