//! Big-endian conversion between raw bytes and typed storage.

use cdm_common::{ArrayData, CdmError, CdmResult, DataType};

fn chunks<const N: usize>(raw: &[u8]) -> impl Iterator<Item = [u8; N]> + '_ {
    raw.chunks_exact(N).map(|c| {
        let mut out = [0u8; N];
        out.copy_from_slice(c);
        out
    })
}

/// Decode big-endian elements of `data_type`.
pub fn decode_be(data_type: DataType, raw: &[u8]) -> CdmResult<ArrayData> {
    let data = match data_type {
        DataType::Byte => ArrayData::Byte(raw.iter().map(|&b| b as i8).collect()),
        DataType::Char => ArrayData::Char(raw.to_vec()),
        DataType::Short => ArrayData::Short(chunks(raw).map(i16::from_be_bytes).collect()),
        DataType::Int => ArrayData::Int(chunks(raw).map(i32::from_be_bytes).collect()),
        DataType::Float => ArrayData::Float(chunks(raw).map(f32::from_be_bytes).collect()),
        DataType::Double => ArrayData::Double(chunks(raw).map(f64::from_be_bytes).collect()),
        other => {
            return Err(CdmError::Unsupported(format!(
                "{} is not a classic netCDF type",
                other
            )))
        }
    };
    Ok(data)
}

/// Append `data` to `out` as big-endian bytes.
pub fn encode_be(data: &ArrayData, out: &mut Vec<u8>) -> CdmResult<()> {
    match data {
        ArrayData::Byte(v) => out.extend(v.iter().map(|&b| b as u8)),
        ArrayData::Char(v) => out.extend_from_slice(v),
        ArrayData::Short(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
        ArrayData::Int(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
        ArrayData::Float(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
        ArrayData::Double(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
        other => {
            return Err(CdmError::Unsupported(format!(
                "{} is not a classic netCDF type",
                other.data_type()
            )))
        }
    }
    Ok(())
}
