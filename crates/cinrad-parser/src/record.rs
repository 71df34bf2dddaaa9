//! Radial record preamble and site block.
//!
//! All fields are little-endian. Preamble layout, relative to the record
//! start:
//!
//! ```text
//! 14  i16  message type (1 = digital radar data)
//! 28  i32  collection time, milliseconds of day
//! 32  i16  modified julian date (1 = 1970-01-01)
//! 34  i16  unambiguous range, 0.1 km
//! 36  u16  azimuth angle code
//! 38  i16  radial number, 1-based within the scan
//! 40  i16  radial status
//! 42  u16  elevation angle code
//! 44  i16  elevation number
//! 46  i16  first reflectivity gate range, m
//! 48  i16  first Doppler gate range, m
//! 50  i16  reflectivity gate size, m
//! 52  i16  Doppler gate size, m
//! 54  i16  reflectivity gate count
//! 56  i16  Doppler gate count
//! 70  i16  Doppler velocity resolution code
//! 72  i16  volume coverage pattern
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::{CinradError, CinradResult};
use crate::variant::Moment;

/// Bytes of a record needed to decode the preamble.
pub const PREAMBLE_LEN: usize = 74;

/// Message type of records that carry radial data.
pub const DIGITAL_RADAR_DATA: i16 = 1;

/// Milliseconds in a day; larger collection times are invalid.
pub const MSECS_PER_DAY: i32 = 86_400_000;

/// Degrees per unit of an angle code.
const ANGLE_SCALE: f64 = 180.0 / 4096.0 / 8.0;

fn le_i16(buf: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([buf[at], buf[at + 1]])
}

fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn le_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn le_f32(buf: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Convert a modified julian date and milliseconds of day to a timestamp.
pub fn date_from_julian(julian_date: i16, msecs: i32) -> Option<DateTime<Utc>> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let at = epoch
        + Duration::days(julian_date as i64 - 1)
        + Duration::milliseconds(msecs as i64);
    Some(at.and_utc())
}

/// Decoded preamble of one radial record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialRecord {
    /// File offset of the record start.
    pub offset: u64,
    pub message_type: i16,
    pub msecs: i32,
    pub julian_date: i16,
    pub unambiguous_range: i16,
    pub azimuth_code: u16,
    pub radial_number: i16,
    pub radial_status: i16,
    pub elevation_code: u16,
    pub elevation_number: i16,
    /// Reflectivity then Doppler.
    pub first_gate: [i16; 2],
    pub gate_size: [i16; 2],
    pub gate_count: [i16; 2],
    pub velocity_resolution: i16,
    pub vcp: i16,
}

impl RadialRecord {
    /// Decode the preamble at the start of `buf`.
    pub fn parse(buf: &[u8], offset: u64) -> CinradResult<Self> {
        if buf.len() < PREAMBLE_LEN {
            return Err(CinradError::Truncated {
                what: "radial preamble",
                need: PREAMBLE_LEN,
                have: buf.len(),
            });
        }
        Ok(Self {
            offset,
            message_type: le_i16(buf, 14),
            msecs: le_i32(buf, 28),
            julian_date: le_i16(buf, 32),
            unambiguous_range: le_i16(buf, 34),
            azimuth_code: le_u16(buf, 36),
            radial_number: le_i16(buf, 38),
            radial_status: le_i16(buf, 40),
            elevation_code: le_u16(buf, 42),
            elevation_number: le_i16(buf, 44),
            first_gate: [le_i16(buf, 46), le_i16(buf, 48)],
            gate_size: [le_i16(buf, 50), le_i16(buf, 52)],
            gate_count: [le_i16(buf, 54), le_i16(buf, 56)],
            velocity_resolution: le_i16(buf, 70),
            vcp: le_i16(buf, 72),
        })
    }

    pub fn is_radial_data(&self) -> bool {
        self.message_type == DIGITAL_RADAR_DATA
    }

    /// Azimuth in degrees.
    pub fn azimuth(&self) -> f32 {
        (self.azimuth_code as f64 * ANGLE_SCALE) as f32
    }

    /// Elevation angle in degrees.
    pub fn elevation(&self) -> f32 {
        (self.elevation_code as f64 * ANGLE_SCALE) as f32
    }

    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        date_from_julian(self.julian_date, self.msecs)
    }

    fn geometry_index(moment: Moment) -> usize {
        usize::from(moment.is_doppler())
    }

    /// Number of gates recorded for `moment`; 0 when the moment is absent.
    pub fn gate_count(&self, moment: Moment) -> usize {
        self.gate_count[Self::geometry_index(moment)].max(0) as usize
    }

    pub fn has_moment(&self, moment: Moment) -> bool {
        self.gate_count(moment) > 0
    }

    /// Range to the first gate, in metres.
    pub fn gate_start(&self, moment: Moment) -> f32 {
        self.first_gate[Self::geometry_index(moment)] as f32
    }

    /// Gate spacing, in metres.
    pub fn gate_size(&self, moment: Moment) -> f32 {
        self.gate_size[Self::geometry_index(moment)] as f32
    }
}

/// Radar site description from a signature variant's leading block.
///
/// ```text
/// 0    8 bytes  station id
/// 8   32 bytes  station name
/// 40  f32       latitude, degrees
/// 44  f32       longitude, degrees
/// 48  f32       antenna elevation, m
/// 100 36 bytes  radar type
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SiteInfo {
    pub station_id: String,
    pub station_name: String,
    pub latitude: f32,
    pub longitude: f32,
    pub elevation: f32,
    pub radar_type: String,
}

/// Bytes of the site block that [`SiteInfo::parse`] reads.
pub const SITE_INFO_LEN: usize = 136;

fn text_field(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).trim().to_string()
}

impl SiteInfo {
    pub fn parse(block: &[u8]) -> CinradResult<Self> {
        if block.len() < SITE_INFO_LEN {
            return Err(CinradError::Truncated {
                what: "site block",
                need: SITE_INFO_LEN,
                have: block.len(),
            });
        }
        Ok(Self {
            station_id: text_field(&block[0..8]),
            station_name: text_field(&block[8..40]),
            latitude: le_f32(block, 40),
            longitude: le_f32(block, 44),
            elevation: le_f32(block, 48),
            radar_type: text_field(&block[100..136]),
        })
    }
}
