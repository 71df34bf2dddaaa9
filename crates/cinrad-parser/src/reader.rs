//! Gate decoding for moment variables.

use cdm_common::{Array, ArrayData, CdmError, CdmResult, Range, Section};
use iosp::{ByteSource, CancelToken};

use crate::index::{ScanTable, VolumeIndex};
use crate::variant::{Moment, VariantSpec};

/// Output buffer typed after the variant's gate type.
enum Gates {
    UByte(Vec<u8>),
    Short(Vec<i16>),
}

impl Gates {
    fn with_capacity(spec: &VariantSpec, n: usize) -> Self {
        if spec.gate_width() == 2 {
            Gates::Short(Vec::with_capacity(n))
        } else {
            Gates::UByte(Vec::with_capacity(n))
        }
    }

    fn push_missing(&mut self, spec: &VariantSpec, n: usize) {
        match self {
            Gates::UByte(v) => v.extend(std::iter::repeat(spec.missing as u8).take(n)),
            Gates::Short(v) => v.extend(std::iter::repeat(spec.missing).take(n)),
        }
    }

    /// Push gate `gate` of `raw`, where `raw` starts at gate `first`.
    fn push_raw(&mut self, raw: &[u8], first: usize, gate: usize) {
        let k = gate - first;
        match self {
            Gates::UByte(v) => v.push(raw[k]),
            Gates::Short(v) => v.push(i16::from_le_bytes([raw[2 * k], raw[2 * k + 1]])),
        }
    }

    fn into_data(self) -> ArrayData {
        match self {
            Gates::UByte(v) => ArrayData::UByte(v),
            Gates::Short(v) => ArrayData::Short(v),
        }
    }
}

/// Decode `section` (scan, radial, gate) of `moment` from `table`.
///
/// Iterates scans, then radials, then gates. A radial with no record, and
/// gates past a record's gate count, get the variant's missing value.
pub fn read_moment(
    source: &dyn ByteSource,
    spec: &VariantSpec,
    index: &VolumeIndex,
    table: &ScanTable,
    moment: Moment,
    section: &Section,
    cancel: &CancelToken,
) -> CdmResult<Array> {
    let [scans, radials, gates] = section.ranges() else {
        return Err(CdmError::range(format!(
            "{} needs a rank 3 section, got rank {}",
            moment.short_name(),
            section.rank()
        )));
    };

    let moment_spec = spec.moment(moment);
    let width = spec.gate_width();
    let mut out = Gates::with_capacity(spec, section.size());

    for (k, scan) in scans.iter().enumerate() {
        cancel.check(k, scans.count())?;
        for radial in radials.iter() {
            let Some(i) = table.locators.get(scan, radial) else {
                out.push_missing(spec, gates.count());
                continue;
            };
            let record = &index.records[i];
            let available = record.gate_count(moment).min(moment_spec.max_gates);
            let wanted = requested_span(gates, available);

            let raw = match wanted {
                Some((first, last)) => {
                    let offset = record.offset + (moment_spec.offset + first * width) as u64;
                    source.read_vec(offset, (last - first + 1) * width)?
                }
                None => Vec::new(),
            };
            for gate in gates.iter() {
                match wanted {
                    Some((first, _)) if gate < available => out.push_raw(&raw, first, gate),
                    _ => out.push_missing(spec, 1),
                }
            }
        }
    }

    Array::new(section.shape(), out.into_data())
}

/// First and last requested gate that the record actually holds.
fn requested_span(gates: &Range, available: usize) -> Option<(usize, usize)> {
    let first = gates.start();
    if gates.count() == 0 || first >= available {
        return None;
    }
    let last = gates.iter().take_while(|&g| g < available).last()?;
    Some((first, last))
}
