//! Record index built in one forward scan over the volume.
//!
//! Radials are grouped into scans by elevation number, separately for the
//! reflectivity and velocity moment groups. Each group gets a
//! [`LocatorTable`] of scans × radials whose entries point into the shared
//! record list; a radial absent from the file is a `None` entry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use iosp::{ByteSource, CancelToken, LocatorTable};
use tracing::{debug, warn};

use crate::error::{CinradError, CinradResult};
use crate::record::{RadialRecord, PREAMBLE_LEN};
use crate::variant::{Moment, VariantSpec};

/// Records read per positioned read while indexing.
const RECORDS_PER_READ: usize = 64;

/// Missing markers of the cached coordinate data.
pub const MISSING_INT: i32 = -9999;
pub const MISSING_FLOAT: f32 = f32::NAN;

/// Irregularities found while indexing. Each is logged and indexing goes on.
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    /// A radial's time is earlier than the previous radial of its scan.
    TimeOutOfOrder { group: usize, scan: usize, msecs: i32 },
    /// A radial number outside `1..`.
    RadialOutOfRange { group: usize, scan: usize, radial_number: i16 },
    /// Two records claim the same radial of a scan; the first is kept.
    DuplicateRadial { group: usize, scan: usize, radial_number: i16 },
    /// A record whose message type is not radial data.
    SkippedMessage { offset: u64, message_type: i16 },
    /// Bytes after the last whole record.
    TrailingBytes { count: u64 },
}

/// Index of one moment group.
#[derive(Debug, Clone)]
pub struct ScanTable {
    /// Moment whose gate count decides membership.
    pub moment: Moment,
    /// Record indices, scans × radials.
    pub locators: LocatorTable<usize>,
    /// Elevation number of each scan.
    pub elevation_numbers: Vec<i16>,
    /// Records seen per scan.
    pub radial_counts: Vec<i32>,
    /// Gate count of each scan's first record.
    pub gate_counts: Vec<i32>,
    /// Record index of the group's first record.
    pub first: usize,
}

impl ScanTable {
    pub fn scan_count(&self) -> usize {
        self.locators.height()
    }
}

/// Cached coordinate values of one group, row-major scans × radials.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCoordinates {
    /// Milliseconds since the volume start.
    pub time: Vec<i32>,
    pub elevation: Vec<f32>,
    pub azimuth: Vec<f32>,
}

/// Everything `open` learns about a volume.
#[derive(Debug, Clone)]
pub struct VolumeIndex {
    pub records: Vec<RadialRecord>,
    /// Reflectivity group, then velocity group; a group without records is
    /// `None`.
    pub tables: [Option<ScanTable>; 2],
    /// Length of the shared radial dimension.
    pub radials: usize,
    pub doppler_resolution: Option<i16>,
    pub vcp: i16,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub anomalies: Vec<Anomaly>,
}

/// Moment that decides membership of each group.
pub const GROUP_MOMENTS: [Moment; 2] = [Moment::Reflectivity, Moment::Velocity];

/// Group index of a moment: reflectivity is 0, the Doppler moments share 1.
pub fn group_of(moment: Moment) -> usize {
    usize::from(moment.is_doppler())
}

fn note(anomalies: &mut Vec<Anomaly>, anomaly: Anomaly) {
    warn!(anomaly = ?anomaly, "Radar decode anomaly");
    anomalies.push(anomaly);
}

/// Read every record preamble of the volume.
fn read_records(
    source: &dyn ByteSource,
    spec: &VariantSpec,
    cancel: &CancelToken,
    anomalies: &mut Vec<Anomaly>,
) -> CinradResult<Vec<RadialRecord>> {
    let len = source.len()?;
    let start = spec.site_block_len as u64;
    let record_len = spec.record_len as u64;
    let total = (len.saturating_sub(start) / record_len) as usize;
    let trailing = len.saturating_sub(start) % record_len;
    if trailing > 0 {
        note(anomalies, Anomaly::TrailingBytes { count: trailing });
    }

    let mut records = Vec::with_capacity(total);
    let mut done = 0;
    while done < total {
        cancel.check(done, total)?;
        let batch = RECORDS_PER_READ.min(total - done);
        let offset = start + done as u64 * record_len;
        let buf = source.read_vec(offset, batch * spec.record_len)?;
        for (k, chunk) in buf.chunks_exact(spec.record_len).enumerate() {
            let record = RadialRecord::parse(&chunk[..PREAMBLE_LEN], offset + k as u64 * record_len)?;
            if record.is_radial_data() {
                records.push(record);
            } else {
                note(
                    anomalies,
                    Anomaly::SkippedMessage {
                        offset: record.offset,
                        message_type: record.message_type,
                    },
                );
            }
        }
        done += batch;
    }
    Ok(records)
}

/// Record indices of a group, split into scans by elevation number in
/// order of first appearance.
fn group_scans(records: &[RadialRecord], moment: Moment) -> Vec<(i16, Vec<usize>)> {
    let mut scans: Vec<(i16, Vec<usize>)> = Vec::new();
    let mut by_elevation: HashMap<i16, usize> = HashMap::new();
    for (i, r) in records.iter().enumerate() {
        if !r.has_moment(moment) {
            continue;
        }
        let scan = *by_elevation.entry(r.elevation_number).or_insert_with(|| {
            scans.push((r.elevation_number, Vec::new()));
            scans.len() - 1
        });
        scans[scan].1.push(i);
    }
    scans
}

fn build_table(
    group: usize,
    moment: Moment,
    scans: &[(i16, Vec<usize>)],
    records: &[RadialRecord],
    radials: usize,
    anomalies: &mut Vec<Anomaly>,
) -> Option<ScanTable> {
    let first = *scans.first()?.1.first()?;
    let mut locators = LocatorTable::new();
    let mut elevation_numbers = Vec::with_capacity(scans.len());
    let mut radial_counts = Vec::with_capacity(scans.len());
    let mut gate_counts = Vec::with_capacity(scans.len());

    for (scan, (elevation_number, members)) in scans.iter().enumerate() {
        let mut row = vec![None; radials];
        let mut last_msecs = i32::MIN;
        for &i in members {
            let r = &records[i];
            if r.msecs < last_msecs {
                note(anomalies, Anomaly::TimeOutOfOrder { group, scan, msecs: r.msecs });
            }
            last_msecs = r.msecs;

            if r.radial_number < 1 || r.radial_number as usize > radials {
                note(
                    anomalies,
                    Anomaly::RadialOutOfRange { group, scan, radial_number: r.radial_number },
                );
                continue;
            }
            let slot = &mut row[r.radial_number as usize - 1];
            if slot.is_some() {
                note(
                    anomalies,
                    Anomaly::DuplicateRadial { group, scan, radial_number: r.radial_number },
                );
                continue;
            }
            *slot = Some(i);
        }
        locators.push_row(row);
        elevation_numbers.push(*elevation_number);
        radial_counts.push(members.len() as i32);
        gate_counts.push(records[members[0]].gate_count(moment) as i32);
    }

    Some(ScanTable {
        moment,
        locators,
        elevation_numbers,
        radial_counts,
        gate_counts,
        first,
    })
}

impl VolumeIndex {
    /// Scan the volume once and build both group tables.
    pub fn build(
        source: &dyn ByteSource,
        spec: &VariantSpec,
        cancel: &CancelToken,
    ) -> CinradResult<Self> {
        let mut anomalies = Vec::new();
        let records = read_records(source, spec, cancel, &mut anomalies)?;
        if records.is_empty() {
            return Err(CinradError::NoRadials(source.location().to_string()));
        }

        let mut resolutions: Vec<i16> = records
            .iter()
            .filter(|r| r.has_moment(Moment::Velocity))
            .map(|r| r.velocity_resolution)
            .collect();
        resolutions.sort_unstable();
        resolutions.dedup();
        if resolutions.len() > 1 {
            return Err(CinradError::MixedDopplerResolution(resolutions));
        }

        let grouped: Vec<Vec<(i16, Vec<usize>)>> = GROUP_MOMENTS
            .iter()
            .map(|&m| group_scans(&records, m))
            .collect();

        // Wide enough for the fullest scan and for the highest valid radial
        // number, so a scan missing radials still places the rest.
        let radials = grouped
            .iter()
            .flatten()
            .map(|(_, members)| {
                let highest = members
                    .iter()
                    .map(|&i| records[i].radial_number.max(0) as usize)
                    .max()
                    .unwrap_or(0);
                highest.max(members.len())
            })
            .max()
            .unwrap_or(0);

        let mut tables = [None, None];
        for (group, scans) in grouped.iter().enumerate() {
            tables[group] = build_table(
                group,
                GROUP_MOMENTS[group],
                scans,
                &records,
                radials,
                &mut anomalies,
            );
        }
        if tables.iter().all(Option::is_none) {
            return Err(CinradError::NoRadials(source.location().to_string()));
        }

        let times: Vec<DateTime<Utc>> = records.iter().filter_map(RadialRecord::date_time).collect();
        let index = Self {
            doppler_resolution: resolutions.first().copied(),
            vcp: records[0].vcp,
            start: times.iter().min().copied(),
            end: times.iter().max().copied(),
            records,
            tables,
            radials,
            anomalies,
        };
        debug!(
            records = index.records.len(),
            radials = index.radials,
            reflectivity_scans = index.tables[0].as_ref().map_or(0, ScanTable::scan_count),
            velocity_scans = index.tables[1].as_ref().map_or(0, ScanTable::scan_count),
            anomalies = index.anomalies.len(),
            "Indexed radar volume"
        );
        Ok(index)
    }

    pub fn table(&self, group: usize) -> Option<&ScanTable> {
        self.tables.get(group)?.as_ref()
    }

    /// Time, elevation and azimuth of every (scan, radial) of a group,
    /// with missing markers where no record exists.
    pub fn coordinates(&self, table: &ScanTable) -> ScanCoordinates {
        let n = table.scan_count() * self.radials;
        let mut coords = ScanCoordinates {
            time: vec![MISSING_INT; n],
            elevation: vec![MISSING_FLOAT; n],
            azimuth: vec![MISSING_FLOAT; n],
        };
        for scan in 0..table.scan_count() {
            for radial in 0..self.radials {
                let Some(i) = table.locators.get(scan, radial) else {
                    continue;
                };
                let r = &self.records[i];
                let at = scan * self.radials + radial;
                coords.time[at] = match (r.date_time(), self.start) {
                    (Some(t), Some(start)) => (t - start).num_milliseconds() as i32,
                    _ => MISSING_INT,
                };
                coords.elevation[at] = r.elevation();
                coords.azimuth[at] = r.azimuth();
            }
        }
        coords
    }
}
