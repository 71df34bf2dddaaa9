//! Record layout and vsize computation.
//!
//! Two historical rules decide how many bytes a record variable consumes per
//! record, chosen from how many record variables the file has:
//!
//! - one record variable: its per-record extent is padded up to a 4-byte
//!   boundary when the element type is one byte wide, and left as is for
//!   wider types;
//! - several record variables: each keeps its natural extent and only the
//!   summed record is padded to 4 bytes.
//!
//! Writers that pad every record variable on its own produce headers whose
//! stored vsizes and offsets differ from the computed ones. When such a
//! header is self-consistent its layout is read as stored.

use cdm_common::DataType;

/// Round `n` up to a multiple of 4.
pub fn pad4(n: u64) -> u64 {
    (n + 3) & !3
}

/// Which padding rule produced a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingRule {
    NoRecords,
    SingleVariable,
    MultiVariable,
    /// Taken from the header's vsize and begin fields.
    Stored,
}

/// A record variable as described by a parsed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredRecordVar {
    pub begin: u64,
    pub vsize: u64,
    /// Natural per-record extent in bytes.
    pub extent: u64,
}

/// Per-record placement of the record variables, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub rule: PaddingRule,
    /// Bytes consumed per record by each variable.
    pub vsizes: Vec<u64>,
    /// Byte offset of each variable inside a record.
    pub offsets: Vec<u64>,
    /// Stride between consecutive records.
    pub record_size: u64,
}

impl RecordLayout {
    /// Compute the layout from each record variable's element type and
    /// natural per-record extent in bytes.
    pub fn compute(record_vars: &[(DataType, u64)]) -> Self {
        match record_vars {
            [] => Self {
                rule: PaddingRule::NoRecords,
                vsizes: Vec::new(),
                offsets: Vec::new(),
                record_size: 0,
            },
            [(data_type, extent)] => {
                let vsize = if data_type.size() == 1 {
                    pad4(*extent)
                } else {
                    *extent
                };
                Self {
                    rule: PaddingRule::SingleVariable,
                    vsizes: vec![vsize],
                    offsets: vec![0],
                    record_size: vsize,
                }
            }
            _ => {
                let vsizes: Vec<u64> = record_vars.iter().map(|(_, extent)| *extent).collect();
                let mut offsets = Vec::with_capacity(vsizes.len());
                let mut sum = 0;
                for vsize in &vsizes {
                    offsets.push(sum);
                    sum += vsize;
                }
                Self {
                    rule: PaddingRule::MultiVariable,
                    vsizes,
                    offsets,
                    record_size: pad4(sum),
                }
            }
        }
    }

    /// Layout of a multi-variable record as the header stores it.
    ///
    /// Returns `None` when the stored fields cannot describe the file: fewer
    /// than two record variables, a zero vsize, a vsize smaller than the
    /// variable's extent, or overlapping variables. Offsets are relative to
    /// the first variable in the record; the stride is the record span
    /// padded to 4 bytes.
    pub fn from_stored(record_vars: &[StoredRecordVar]) -> Option<Self> {
        if record_vars.len() < 2 {
            return None;
        }
        if record_vars.iter().any(|v| v.vsize == 0 || v.vsize < v.extent) {
            return None;
        }
        let mut by_begin: Vec<&StoredRecordVar> = record_vars.iter().collect();
        by_begin.sort_by_key(|v| v.begin);
        let mut end = by_begin[0].begin;
        for var in &by_begin {
            if var.begin < end {
                return None;
            }
            end = var.begin.checked_add(var.vsize)?;
        }
        let first = by_begin[0].begin;
        let span = end - first;
        let record_size = span.checked_add(3).map(|_| pad4(span))?;
        Some(Self {
            rule: PaddingRule::Stored,
            vsizes: record_vars.iter().map(|v| v.vsize).collect(),
            offsets: record_vars.iter().map(|v| v.begin - first).collect(),
            record_size,
        })
    }
}

/// Bytes reserved for a non-record variable.
pub fn fixed_vsize(extent: u64) -> u64 {
    pad4(extent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad4() {
        assert_eq!(pad4(0), 0);
        assert_eq!(pad4(1), 4);
        assert_eq!(pad4(4), 4);
        assert_eq!(pad4(6), 8);
    }

    #[test]
    fn test_lone_byte_variable() {
        let layout = RecordLayout::compute(&[(DataType::Byte, 1)]);
        assert_eq!(layout.rule, PaddingRule::SingleVariable);
        assert_eq!(layout.vsizes, vec![4]);
        assert_eq!(layout.record_size, 4);
    }

    #[test]
    fn test_lone_char_row() {
        // 5 chars per record pad to 8
        let layout = RecordLayout::compute(&[(DataType::Char, 5)]);
        assert_eq!(layout.vsizes, vec![8]);
    }

    #[test]
    fn test_two_byte_variables_share_padding() {
        let layout = RecordLayout::compute(&[(DataType::Byte, 1), (DataType::Byte, 1)]);
        assert_eq!(layout.rule, PaddingRule::MultiVariable);
        assert_eq!(layout.vsizes, vec![1, 1]);
        assert_eq!(layout.offsets, vec![0, 1]);
        assert_eq!(layout.record_size, 4);
    }

    #[test]
    fn test_lone_short_unpadded() {
        let layout = RecordLayout::compute(&[(DataType::Short, 2)]);
        assert_eq!(layout.vsizes, vec![2]);
        assert_eq!(layout.record_size, 2);
    }

    #[test]
    fn test_short_with_int_rounds_to_eight() {
        let layout = RecordLayout::compute(&[(DataType::Short, 2), (DataType::Int, 4)]);
        assert_eq!(layout.offsets, vec![0, 2]);
        assert_eq!(layout.record_size, 8);
    }

    fn stored(begin: u64, vsize: u64, extent: u64) -> StoredRecordVar {
        StoredRecordVar { begin, vsize, extent }
    }

    #[test]
    fn test_stored_individually_padded_variables() {
        // short[3] padded to 8 followed by a lone short padded to 4
        let layout = RecordLayout::from_stored(&[stored(96, 8, 6), stored(104, 4, 2)]).unwrap();
        assert_eq!(layout.rule, PaddingRule::Stored);
        assert_eq!(layout.offsets, vec![0, 8]);
        assert_eq!(layout.record_size, 12);
    }

    #[test]
    fn test_stored_matches_computed_layout() {
        let layout = RecordLayout::from_stored(&[stored(40, 1, 1), stored(41, 1, 1)]).unwrap();
        let computed = RecordLayout::compute(&[(DataType::Byte, 1), (DataType::Byte, 1)]);
        assert_eq!(layout.offsets, computed.offsets);
        assert_eq!(layout.record_size, computed.record_size);
    }

    #[test]
    fn test_unusable_stored_layouts() {
        // single variable
        assert!(RecordLayout::from_stored(&[stored(40, 4, 1)]).is_none());
        // vsize left at zero
        assert!(RecordLayout::from_stored(&[stored(40, 0, 2), stored(40, 2, 2)]).is_none());
        // vsize smaller than the data
        assert!(RecordLayout::from_stored(&[stored(40, 2, 6), stored(42, 2, 2)]).is_none());
        // overlapping
        assert!(RecordLayout::from_stored(&[stored(40, 8, 6), stored(44, 4, 2)]).is_none());
        // offsets past 64 bits
        assert!(RecordLayout::from_stored(&[stored(40, 4, 2), stored(u64::MAX - 1, 4, 2)]).is_none());
    }

    #[test]
    fn test_no_records() {
        let layout = RecordLayout::compute(&[]);
        assert_eq!(layout.rule, PaddingRule::NoRecords);
        assert_eq!(layout.record_size, 0);
    }
}
