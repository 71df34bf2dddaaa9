//! CINRAD Level-II base data decoder.
//!
//! Handles the SA base layout and the SC/CD, CC and CC2.0 signature
//! variants. Each file is one volume of fixed-length radial records,
//! optionally behind a site block. Opening indexes every record once;
//! reads then go straight to the gates they need.

pub mod error;
pub mod index;
pub mod reader;
pub mod record;
pub mod schema;
pub mod variant;

use std::sync::Arc;

use cdm_common::{Array, CdmError, CdmModel, CdmResult, Section, Variable};
use chrono::{Datelike, Utc};
use iosp::{ByteSource, CancelToken, IoServiceProvider, IospConfig};
use tracing::info;

pub use error::{CinradError, CinradResult};
pub use index::{Anomaly, VolumeIndex};
use record::{RadialRecord, SiteInfo, MSECS_PER_DAY, PREAMBLE_LEN, SITE_INFO_LEN};
pub use variant::{Moment, Variant, VariantSpec};

/// Provider id.
pub const FILE_TYPE_ID: &str = "CINRAD";

/// Earliest collection year accepted for the unsigned base layout.
const FIRST_VALID_YEAR: i32 = 1990;

/// Whether `header` starts with a plausible SA radial record.
fn is_base_layout(header: &[u8]) -> bool {
    if header.len() < PREAMBLE_LEN {
        return false;
    }
    let Ok(record) = RadialRecord::parse(header, 0) else {
        return false;
    };
    if !record.is_radial_data() || !(0..=MSECS_PER_DAY).contains(&record.msecs) {
        return false;
    }
    record
        .date_time()
        .map_or(false, |t| (FIRST_VALID_YEAR..=Utc::now().year()).contains(&t.year()))
}

/// Classify a file from its leading bytes.
pub fn detect_variant(header: &[u8]) -> Option<Variant> {
    Variant::from_signature(header).or_else(|| is_base_layout(header).then_some(Variant::Sa))
}

/// State kept between `open` and `close`.
#[derive(Debug)]
struct OpenVolume {
    source: Arc<dyn ByteSource>,
    variant: Variant,
    index: VolumeIndex,
}

/// CINRAD provider.
#[derive(Debug, Default)]
pub struct CinradIosp {
    volume: Option<OpenVolume>,
}

impl CinradIosp {
    pub fn new(_config: &IospConfig) -> Self {
        Self::default()
    }

    fn volume(&self) -> CdmResult<&OpenVolume> {
        self.volume
            .as_ref()
            .ok_or_else(|| CdmError::Closed("CINRAD provider is not open".to_string()))
    }

    /// Variant of the open volume.
    pub fn variant(&self) -> Option<Variant> {
        self.volume.as_ref().map(|v| v.variant)
    }

    /// Irregularities found while indexing the open volume.
    pub fn anomalies(&self) -> &[Anomaly] {
        self.volume.as_ref().map_or(&[], |v| v.index.anomalies.as_slice())
    }
}

impl IoServiceProvider for CinradIosp {
    fn file_type_id(&self) -> &'static str {
        FILE_TYPE_ID
    }

    fn description(&self) -> &'static str {
        "Chinese Level-II Base Data"
    }

    fn probe(&self, header: &[u8]) -> bool {
        detect_variant(header).is_some()
    }

    fn open(&mut self, source: Arc<dyn ByteSource>, cancel: &CancelToken) -> CdmResult<CdmModel> {
        let prefix = source.read_prefix(SITE_INFO_LEN.max(PREAMBLE_LEN))?;
        let variant = detect_variant(&prefix).ok_or_else(|| {
            CdmError::format(format!("{} is not a CINRAD volume", source.location()))
        })?;
        let spec = variant.spec();

        let site = if spec.site_block_len > 0 {
            Some(SiteInfo::parse(&prefix)?)
        } else {
            None
        };
        let index = VolumeIndex::build(source.as_ref(), spec, cancel)?;
        let model = schema::build_model(variant, site.as_ref(), &index)?;

        info!(
            location = %source.location(),
            variant = spec.name,
            station = site.as_ref().map_or("", |s| s.station_id.as_str()),
            records = index.records.len(),
            radials = index.radials,
            anomalies = index.anomalies.len(),
            "Opened CINRAD volume"
        );
        self.volume = Some(OpenVolume {
            source,
            variant,
            index,
        });
        Ok(model)
    }

    fn read_data(&self, var: &Variable, section: &Section, cancel: &CancelToken) -> CdmResult<Array> {
        let volume = self.volume()?;
        section.validate(&var.shape())?;
        let layout = var.decode_context().as_radial().ok_or_else(|| {
            CdmError::Unsupported(format!("{} was not built by the CINRAD provider", var.name()))
        })?;
        let moment = Moment::from_index(layout.moment)
            .ok_or_else(|| CdmError::format(format!("unknown moment {}", layout.moment)))?;
        let table = volume.index.table(layout.table).ok_or_else(|| {
            CdmError::format(format!("{} has no scan table {}", var.name(), layout.table))
        })?;
        reader::read_moment(
            volume.source.as_ref(),
            volume.variant.spec(),
            &volume.index,
            table,
            moment,
            section,
            cancel,
        )
    }

    fn close(&mut self) -> CdmResult<()> {
        self.volume = None;
        Ok(())
    }
}
