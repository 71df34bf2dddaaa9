//! Synthetic file generators.
//!
//! [`CinradVolume`] writes small radar volumes byte by byte so decoder tests
//! do not depend on real station data. Every gate value is a pure function of
//! its (moment, scan, radial, gate) position, see [`gate_value`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::fixtures::{gates, radar_type, site, time, VCP};

/// Moment indices within a radial record.
pub const REFLECTIVITY: usize = 0;
pub const VELOCITY: usize = 1;
pub const SPECTRUM_WIDTH: usize = 2;

/// Size of the site block that precedes the records of signature variants.
pub const SITE_BLOCK_LEN: usize = 1024;

/// Doppler resolution codes.
pub const DOPPLER_HIGH: i16 = 2;
pub const DOPPLER_LOW: i16 = 4;

/// On-disk flavour of a generated volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CinradFlavor {
    Sa,
    Sc,
    Cc,
    Cc20,
}

impl CinradFlavor {
    pub fn record_len(&self) -> usize {
        match self {
            CinradFlavor::Sa => 2432,
            CinradFlavor::Sc => 3124,
            CinradFlavor::Cc => 3128,
            CinradFlavor::Cc20 => 1628,
        }
    }

    /// Byte offset of each moment's gate array inside a record.
    pub fn moment_offsets(&self) -> [usize; 3] {
        match self {
            CinradFlavor::Sa => [128, 588, 1508],
            CinradFlavor::Sc => [128, 1126, 2124],
            CinradFlavor::Cc => [128, 1128, 2128],
            CinradFlavor::Cc20 => [128, 628, 1128],
        }
    }

    /// Maximum gates each moment can hold.
    pub fn moment_capacity(&self) -> [usize; 3] {
        match self {
            CinradFlavor::Sa => [460, 920, 920],
            CinradFlavor::Sc => [998, 998, 998],
            CinradFlavor::Cc | CinradFlavor::Cc20 => [500, 500, 500],
        }
    }

    /// Bytes per gate.
    pub fn gate_width(&self) -> usize {
        match self {
            CinradFlavor::Cc => 2,
            _ => 1,
        }
    }

    pub fn site_block_len(&self) -> usize {
        match self {
            CinradFlavor::Sa => 0,
            _ => SITE_BLOCK_LEN,
        }
    }

    pub fn default_radar_type(&self) -> Option<&'static str> {
        match self {
            CinradFlavor::Sa => None,
            CinradFlavor::Sc => Some(radar_type::SC),
            CinradFlavor::Cc => Some(radar_type::CC),
            CinradFlavor::Cc20 => Some(radar_type::CC20),
        }
    }
}

/// Raw one-byte gate value at a position. Never 0 or 1, the missing and
/// below-threshold codes.
pub fn gate_value(moment: usize, scan: usize, radial: usize, gate: usize) -> u8 {
    ((scan * 31 + radial * 7 + gate * 3 + moment * 11) % 250 + 2) as u8
}

/// Raw two-byte gate value at a position, used by the `Cc` flavour.
pub fn gate_value_i16(moment: usize, scan: usize, radial: usize, gate: usize) -> i16 {
    gate_value(moment, scan, radial, gate) as i16 * 10 - 1000
}

/// Azimuth of radial `radial` out of `radials`, in degrees.
pub fn radial_azimuth(radial: usize, radials: usize) -> f32 {
    radial as f32 * 360.0 / radials as f32
}

/// Elevation angle of scan `scan`, in degrees.
pub fn scan_elevation(scan: usize) -> f32 {
    0.5 + scan as f32
}

/// Milliseconds of day of a radial.
pub fn radial_msecs(scan: usize, radial: usize, radials: usize) -> i32 {
    time::START_MSECS + ((scan * radials + radial) as i32) * time::RADIAL_STEP_MSECS
}

fn angle_code(degrees: f32) -> u16 {
    (degrees as f64 / (180.0 / 4096.0) * 8.0).round() as u16
}

fn julian_date() -> i16 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let day = NaiveDate::from_ymd_opt(time::YEAR, time::MONTH, time::DAY).unwrap();
    (day.signed_duration_since(epoch).num_days() + 1) as i16
}

fn put_i16(buf: &mut [u8], at: usize, v: i16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_i32(buf: &mut [u8], at: usize, v: i32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_f32(buf: &mut [u8], at: usize, v: f32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_text(buf: &mut [u8], at: usize, max: usize, text: &str) {
    let bytes = text.as_bytes();
    let n = bytes.len().min(max);
    buf[at..at + n].copy_from_slice(&bytes[..n]);
}

/// Builder for a synthetic CINRAD volume.
///
/// # Example
///
/// ```
/// use test_utils::{CinradFlavor, CinradVolume};
///
/// let bytes = CinradVolume::new(CinradFlavor::Sa).scans(2).radials(4).build();
/// assert_eq!(bytes.len(), 2 * 4 * 2432);
/// ```
#[derive(Debug, Clone)]
pub struct CinradVolume {
    flavor: CinradFlavor,
    scans: usize,
    radials: usize,
    reflectivity_gates: usize,
    doppler_gates: usize,
    velocity_resolution: i16,
    doppler_from_scan: usize,
    missing: Vec<(usize, usize)>,
    zero_radial_number: Vec<(usize, usize)>,
    out_of_order_scan: Option<usize>,
    mixed_resolution: bool,
    radar_type: Option<String>,
}

impl CinradVolume {
    pub fn new(flavor: CinradFlavor) -> Self {
        Self {
            flavor,
            scans: 2,
            radials: 6,
            reflectivity_gates: 8,
            doppler_gates: 12,
            velocity_resolution: DOPPLER_HIGH,
            doppler_from_scan: 0,
            missing: Vec::new(),
            zero_radial_number: Vec::new(),
            out_of_order_scan: None,
            mixed_resolution: false,
            radar_type: flavor.default_radar_type().map(str::to_string),
        }
    }

    pub fn flavor(&self) -> CinradFlavor {
        self.flavor
    }

    pub fn scans(mut self, n: usize) -> Self {
        self.scans = n;
        self
    }

    pub fn radials(mut self, n: usize) -> Self {
        self.radials = n;
        self
    }

    /// Reflectivity and Doppler gate counts of every radial.
    pub fn gates(mut self, reflectivity: usize, doppler: usize) -> Self {
        self.reflectivity_gates = reflectivity;
        self.doppler_gates = doppler;
        self
    }

    pub fn velocity_resolution(mut self, code: i16) -> Self {
        self.velocity_resolution = code;
        self
    }

    /// Scans before `scan` carry reflectivity only.
    pub fn doppler_from_scan(mut self, scan: usize) -> Self {
        self.doppler_from_scan = scan;
        self
    }

    /// Leave radial `radial` (0-based) of `scan` out of the file.
    pub fn skip_radial(mut self, scan: usize, radial: usize) -> Self {
        self.missing.push((scan, radial));
        self
    }

    /// Write radial number 0, which is outside the valid 1-based range.
    pub fn zero_radial_number(mut self, scan: usize, radial: usize) -> Self {
        self.zero_radial_number.push((scan, radial));
        self
    }

    /// Swap the times of the first two radials of `scan`.
    pub fn time_out_of_order(mut self, scan: usize) -> Self {
        self.out_of_order_scan = Some(scan);
        self
    }

    /// Give the last scan the low Doppler resolution code.
    pub fn mixed_resolution(mut self) -> Self {
        self.mixed_resolution = true;
        self
    }

    /// Override the radar type string of the site block.
    pub fn radar_type(mut self, text: &str) -> Self {
        self.radar_type = Some(text.to_string());
        self
    }

    pub fn scan_count(&self) -> usize {
        self.scans
    }

    pub fn radial_count(&self) -> usize {
        self.radials
    }

    pub fn reflectivity_gates(&self) -> usize {
        self.reflectivity_gates
    }

    pub fn doppler_gates(&self) -> usize {
        self.doppler_gates
    }

    fn site_block(&self) -> Vec<u8> {
        let mut block = vec![0u8; self.flavor.site_block_len()];
        if block.is_empty() {
            return block;
        }
        put_text(&mut block, 0, 8, site::STATION_ID);
        put_text(&mut block, 8, 32, site::STATION_NAME);
        put_f32(&mut block, 40, site::LATITUDE);
        put_f32(&mut block, 44, site::LONGITUDE);
        put_f32(&mut block, 48, site::ELEVATION_M);
        if let Some(text) = &self.radar_type {
            put_text(&mut block, 100, 36, text);
        }
        block
    }

    fn record(&self, scan: usize, radial: usize, first: bool, last: bool) -> Vec<u8> {
        let flavor = self.flavor;
        let mut rec = vec![0u8; flavor.record_len()];
        let has_doppler = scan >= self.doppler_from_scan;
        let doppler_gates = if has_doppler { self.doppler_gates } else { 0 };

        let mut msecs = radial_msecs(scan, radial, self.radials);
        if self.out_of_order_scan == Some(scan) && radial < 2 {
            msecs = radial_msecs(scan, 1 - radial, self.radials);
        }
        let status = match (first, last, radial) {
            (true, _, _) => 3,
            (_, true, _) => 4,
            (_, _, 0) => 0,
            (_, _, r) if r + 1 == self.radials => 2,
            _ => 1,
        };
        let radial_number = if self.zero_radial_number.contains(&(scan, radial)) {
            0
        } else {
            radial as i16 + 1
        };
        let resolution = if self.mixed_resolution && scan + 1 == self.scans {
            DOPPLER_LOW
        } else {
            self.velocity_resolution
        };

        put_i16(&mut rec, 14, 1);
        put_i32(&mut rec, 28, msecs);
        put_i16(&mut rec, 32, julian_date());
        put_i16(&mut rec, 34, 1500);
        put_u16(&mut rec, 36, angle_code(radial_azimuth(radial, self.radials)));
        put_i16(&mut rec, 38, radial_number);
        put_i16(&mut rec, 40, status);
        put_u16(&mut rec, 42, angle_code(scan_elevation(scan)));
        put_i16(&mut rec, 44, scan as i16 + 1);
        put_i16(&mut rec, 46, gates::REFLECTIVITY_START);
        put_i16(&mut rec, 48, gates::DOPPLER_START);
        put_i16(&mut rec, 50, gates::REFLECTIVITY_SIZE);
        put_i16(&mut rec, 52, gates::DOPPLER_SIZE);
        put_i16(&mut rec, 54, self.reflectivity_gates as i16);
        put_i16(&mut rec, 56, doppler_gates as i16);
        put_i16(&mut rec, 70, if has_doppler { resolution } else { 0 });
        put_i16(&mut rec, 72, VCP);

        let counts = [self.reflectivity_gates, doppler_gates, doppler_gates];
        let width = flavor.gate_width();
        for (moment, (&offset, &count)) in flavor.moment_offsets().iter().zip(&counts).enumerate() {
            assert!(
                count <= flavor.moment_capacity()[moment],
                "too many gates for {:?}",
                flavor
            );
            for gate in 0..count {
                let at = offset + gate * width;
                if width == 2 {
                    put_i16(&mut rec, at, gate_value_i16(moment, scan, radial, gate));
                } else {
                    rec[at] = gate_value(moment, scan, radial, gate);
                }
            }
        }
        rec
    }

    /// Encode the volume.
    pub fn build(&self) -> Vec<u8> {
        let mut out = self.site_block();
        let total = self.scans * self.radials;
        let mut n = 0;
        for scan in 0..self.scans {
            for radial in 0..self.radials {
                let first = n == 0;
                n += 1;
                if self.missing.contains(&(scan, radial)) {
                    continue;
                }
                out.extend(self.record(scan, radial, first, n == total));
            }
        }
        out
    }

    /// Encode the volume into `dir/name` and return the path.
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, self.build()).expect("Failed to write synthetic volume");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_values_avoid_sentinels() {
        for scan in 0..4 {
            for radial in 0..40 {
                for gate in 0..300 {
                    let v = gate_value(VELOCITY, scan, radial, gate);
                    assert!(v >= 2);
                }
            }
        }
    }

    #[test]
    fn test_sa_has_no_site_block() {
        let bytes = CinradVolume::new(CinradFlavor::Sa).scans(1).radials(3).build();
        assert_eq!(bytes.len(), 3 * 2432);
        // message type of the first record
        assert_eq!(i16::from_le_bytes([bytes[14], bytes[15]]), 1);
    }

    #[test]
    fn test_signature_variant_layout() {
        let bytes = CinradVolume::new(CinradFlavor::Cc20).scans(1).radials(2).build();
        assert_eq!(bytes.len(), SITE_BLOCK_LEN + 2 * 1628);
        assert_eq!(&bytes[100..109], b"CINRAD/CC");
    }

    #[test]
    fn test_skip_radial() {
        let bytes = CinradVolume::new(CinradFlavor::Sa)
            .scans(1)
            .radials(4)
            .skip_radial(0, 2)
            .build();
        assert_eq!(bytes.len(), 3 * 2432);
    }

    #[test]
    fn test_julian_date() {
        // 2020-06-15 is 18428 days after the epoch
        assert_eq!(julian_date(), 18429);
    }
}
