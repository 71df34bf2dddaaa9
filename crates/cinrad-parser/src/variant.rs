//! Sub-variant detection and per-variant layout tables.
//!
//! Signature variants write a site block whose radar type string names the
//! radar model. The markers overlap (`CINRAD/CC` and `CINRADC` share a
//! prefix, every marker shares `CINRAD`), so they are tested in a fixed
//! order. Files without a signature are the base `Sa` layout when their
//! first record looks like a digital radar data message.

use cdm_common::{Attribute, AttributeValue, DataType};

/// Bytes of the file examined for a radar type signature.
pub const SIGNATURE_LEN: usize = 136;

/// Raw code of a gate whose signal is below threshold.
pub const BELOW_THRESHOLD: u8 = 0;

/// On-disk layout family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Sa,
    Sc,
    Cc,
    Cc20,
}

/// Radar moment stored per radial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Moment {
    Reflectivity,
    Velocity,
    SpectrumWidth,
}

impl Moment {
    pub const ALL: [Moment; 3] = [Moment::Reflectivity, Moment::Velocity, Moment::SpectrumWidth];

    pub fn index(&self) -> usize {
        match self {
            Moment::Reflectivity => 0,
            Moment::Velocity => 1,
            Moment::SpectrumWidth => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Moment> {
        Moment::ALL.get(index).copied()
    }

    /// Variable name of the moment.
    pub fn short_name(&self) -> &'static str {
        match self {
            Moment::Reflectivity => "Reflectivity",
            Moment::Velocity => "RadialVelocity",
            Moment::SpectrumWidth => "SpectrumWidth",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            Moment::Reflectivity => "Reflectivity",
            Moment::Velocity => "Radial Velocity",
            Moment::SpectrumWidth => "Spectrum Width",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Moment::Reflectivity => "dBz",
            Moment::Velocity | Moment::SpectrumWidth => "m/s",
        }
    }

    /// Whether the moment uses the Doppler gate geometry.
    pub fn is_doppler(&self) -> bool {
        !matches!(self, Moment::Reflectivity)
    }
}

/// Placement and packing of one moment's gates inside a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentSpec {
    /// Byte offset of the first gate from the record start.
    pub offset: usize,
    /// Gates the record has room for.
    pub max_gates: usize,
    pub scale: f32,
    pub add_offset: f32,
}

/// Everything that differs between layout families.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantSpec {
    pub variant: Variant,
    /// Value of the `format` global attribute.
    pub name: &'static str,
    pub record_len: usize,
    /// Site block preceding the first record.
    pub site_block_len: usize,
    /// Stored gate type, `UByte` or `Short`.
    pub data_type: DataType,
    /// Raw value written for gates with no data.
    pub missing: i16,
    /// Indexed by [`Moment::index`].
    pub moments: [MomentSpec; 3],
    /// Velocity packing when radials carry the low Doppler resolution code.
    pub low_resolution_velocity: Option<(f32, f32)>,
}

impl VariantSpec {
    pub fn moment(&self, moment: Moment) -> &MomentSpec {
        &self.moments[moment.index()]
    }

    /// Bytes per stored gate.
    pub fn gate_width(&self) -> usize {
        self.data_type.size()
    }

    /// Scale and offset of `moment` for a volume with the given Doppler
    /// resolution code.
    pub fn packing(&self, moment: Moment, doppler_resolution: Option<i16>) -> (f32, f32) {
        let spec = self.moment(moment);
        match (moment, doppler_resolution, self.low_resolution_velocity) {
            (Moment::Velocity, Some(DOPPLER_RESOLUTION_LOW), Some(low)) => low,
            _ => (spec.scale, spec.add_offset),
        }
    }
}

/// Doppler resolution codes: 0.5 m/s and 1.0 m/s.
pub const DOPPLER_RESOLUTION_HIGH: i16 = 2;
pub const DOPPLER_RESOLUTION_LOW: i16 = 4;

static SA_SPEC: VariantSpec = VariantSpec {
    variant: Variant::Sa,
    name: "CINRAD-SA",
    record_len: 2432,
    site_block_len: 0,
    data_type: DataType::UByte,
    missing: 1,
    moments: [
        MomentSpec { offset: 128, max_gates: 460, scale: 0.5, add_offset: -33.0 },
        MomentSpec { offset: 588, max_gates: 920, scale: 0.5, add_offset: -64.5 },
        MomentSpec { offset: 1508, max_gates: 920, scale: 0.5, add_offset: -64.5 },
    ],
    low_resolution_velocity: Some((1.0, -129.0)),
};

static SC_SPEC: VariantSpec = VariantSpec {
    variant: Variant::Sc,
    name: "CINRAD-SC",
    record_len: 3124,
    site_block_len: 1024,
    data_type: DataType::UByte,
    missing: 0,
    moments: [
        MomentSpec { offset: 128, max_gates: 998, scale: 0.5, add_offset: -32.0 },
        MomentSpec { offset: 1126, max_gates: 998, scale: 0.5, add_offset: -64.0 },
        MomentSpec { offset: 2124, max_gates: 998, scale: 0.5, add_offset: 0.0 },
    ],
    low_resolution_velocity: None,
};

static CC_SPEC: VariantSpec = VariantSpec {
    variant: Variant::Cc,
    name: "CINRAD-CC",
    record_len: 3128,
    site_block_len: 1024,
    data_type: DataType::Short,
    missing: -32768,
    moments: [
        MomentSpec { offset: 128, max_gates: 500, scale: 0.1, add_offset: 0.0 },
        MomentSpec { offset: 1128, max_gates: 500, scale: 0.1, add_offset: 0.0 },
        MomentSpec { offset: 2128, max_gates: 500, scale: 0.1, add_offset: 0.0 },
    ],
    low_resolution_velocity: None,
};

static CC20_SPEC: VariantSpec = VariantSpec {
    variant: Variant::Cc20,
    name: "CINRAD-CC2.0",
    record_len: 1628,
    site_block_len: 1024,
    data_type: DataType::UByte,
    missing: 0,
    moments: [
        MomentSpec { offset: 128, max_gates: 500, scale: 0.5, add_offset: -33.0 },
        MomentSpec { offset: 628, max_gates: 500, scale: 0.5, add_offset: -64.5 },
        MomentSpec { offset: 1128, max_gates: 500, scale: 0.5, add_offset: -64.5 },
    ],
    low_resolution_velocity: None,
};

impl Variant {
    /// Classify a signature variant from the start of the file.
    ///
    /// Returns `None` when no marker is present; the caller then decides
    /// whether the file is the base layout.
    pub fn from_signature(header: &[u8]) -> Option<Variant> {
        let end = header.len().min(SIGNATURE_LEN);
        let text = String::from_utf8_lossy(&header[..end]);
        if text.contains("CINRAD/SC") || text.contains("CINRAD/CD") {
            Some(Variant::Sc)
        } else if text.contains("CINRADC") {
            Some(Variant::Cc)
        } else if text.contains("CINRAD/CC") {
            Some(Variant::Cc20)
        } else {
            None
        }
    }

    pub fn spec(&self) -> &'static VariantSpec {
        match self {
            Variant::Sa => &SA_SPEC,
            Variant::Sc => &SC_SPEC,
            Variant::Cc => &CC_SPEC,
            Variant::Cc20 => &CC20_SPEC,
        }
    }

    /// `missing_value` attribute of a moment variable.
    pub fn missing_value_attribute(&self, short_name: &str) -> Attribute {
        let value = match missing_value_override(*self, short_name) {
            Some(v) => AttributeValue::Ints(vec![v]),
            None => match self.spec().data_type {
                DataType::Short => AttributeValue::Shorts(vec![self.spec().missing]),
                _ => AttributeValue::Bytes(vec![self.spec().missing as i8, BELOW_THRESHOLD as i8]),
            },
        };
        Attribute::new(cdm_common::names::MISSING_VALUE, value)
    }
}

/// A `missing_value` replacement for variables of one variant whose short
/// name contains a marker.
#[derive(Debug, Clone, Copy)]
struct MissingValueOverride {
    variant: Variant,
    name_contains: &'static str,
    value: i32,
}

static MISSING_VALUE_OVERRIDES: &[MissingValueOverride] = &[MissingValueOverride {
    variant: Variant::Cc20,
    name_contains: "RadialVelocity",
    value: -128,
}];

/// Look up a per-variant `missing_value` override.
pub fn missing_value_override(variant: Variant, short_name: &str) -> Option<i32> {
    MISSING_VALUE_OVERRIDES
        .iter()
        .find(|o| o.variant == variant && short_name.contains(o.name_contains))
        .map(|o| o.value)
}

/// Volume coverage pattern descriptions.
static VCP_NAMES: &[(i16, &str)] = &[
    (11, "16 elevation scans every 5 mins"),
    (12, "17 elevation scans every 4.1 mins"),
    (21, "11 elevation scans every 6 mins"),
    (31, "8 elevation scans every 10 mins"),
    (32, "7 elevation scans every 10 mins"),
    (121, "20 elevation scans every 5 mins"),
];

pub fn vcp_name(vcp: i16) -> &'static str {
    VCP_NAMES
        .iter()
        .find(|(code, _)| *code == vcp)
        .map_or("N/A", |(_, name)| name)
}
