//! Projection of an indexed volume onto the common data model.

use cdm_common::{
    names, Array, ArrayData, Attribute, CdmModel, CdmResult, DataType, DecodeContext, Dimension,
    GroupId, ModelBuilder, RadialLayout, Variable,
};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::index::{group_of, ScanTable, VolumeIndex, MISSING_FLOAT, MISSING_INT};
use crate::record::SiteInfo;
use crate::variant::{vcp_name, Moment, Variant, BELOW_THRESHOLD};

/// Mean earth radius used for the geospatial bounds, in metres.
const EARTH_RADIUS_M: f64 = 6_371_229.0;

const HORIZONTAL_BEAM_WIDTH_DEG: f64 = 1.5;

/// Dimension name suffix of each group.
const GROUP_ABBREV: [&str; 2] = ["R", "V"];

fn iso(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build the frozen model of a volume.
pub fn build_model(variant: Variant, site: Option<&SiteInfo>, index: &VolumeIndex) -> CdmResult<CdmModel> {
    let mut b = ModelBuilder::new();
    let root = GroupId::ROOT;
    b.add_dimension(root, Dimension::new("radial", index.radials)?)?;

    let mut radar_radius = 0.0;
    for (group, table) in index.tables.iter().enumerate() {
        let Some(table) = table else {
            continue;
        };
        radar_radius = add_group(&mut b, variant, index, group, table)?;
    }

    if let Some(site) = site {
        add_site(&mut b, site, radar_radius)?;
    }
    add_globals(&mut b, variant, site, index)?;
    Ok(b.freeze())
}

/// Add the dimensions and variables of one moment group. Returns the range
/// to the end of the last gate.
fn add_group(
    b: &mut ModelBuilder,
    variant: Variant,
    index: &VolumeIndex,
    group: usize,
    table: &ScanTable,
) -> CdmResult<f64> {
    let root = GroupId::ROOT;
    let abbrev = GROUP_ABBREV[group];
    let spec = variant.spec();
    let first = &index.records[table.first];
    let ngates = first.gate_count(table.moment);
    let nscans = table.scan_count();

    let scan_dim = format!("scan{}", abbrev);
    let gate_dim = format!("gate{}", abbrev);
    b.add_dimension(root, Dimension::new(scan_dim.as_str(), nscans)?)?;
    b.add_dimension(root, Dimension::new(gate_dim.as_str(), ngates)?)?;

    let time_name = format!("time{}", abbrev);
    let elevation_name = format!("elevation{}", abbrev);
    let azimuth_name = format!("azimuth{}", abbrev);
    let distance_name = format!("distance{}", abbrev);
    let axes = format!("{} {} {} {}", time_name, elevation_name, azimuth_name, distance_name);

    // Moment variables; the Doppler moments share the velocity index.
    let data_dims = format!("{} radial {}", scan_dim, gate_dim);
    for moment in Moment::ALL.iter().filter(|m| group_of(**m) == group) {
        let name = moment.short_name();
        let (scale, offset) = spec.packing(*moment, index.doppler_resolution);
        let mut v = b
            .new_variable(root, name, spec.data_type, &data_dims)?
            .with_attribute(Attribute::new(names::UNITS, moment.units()))
            .with_attribute(Attribute::new(names::LONG_NAME, moment.long_name()))
            .with_attribute(variant.missing_value_attribute(name))
            .with_attribute(Attribute::new("signal_below_threshold", BELOW_THRESHOLD as i8))
            .with_attribute(Attribute::new(names::SCALE_FACTOR, scale))
            .with_attribute(Attribute::new(names::ADD_OFFSET, offset))
            .with_attribute(Attribute::new(names::COORDINATE_AXES, axes.as_str()));
        v.set_decode_context(DecodeContext::Radial(RadialLayout {
            table: group,
            moment: moment.index(),
        }));
        b.add_variable(root, v)?;
    }

    let coords = index.coordinates(table);
    let plane = vec![nscans, index.radials];
    let plane_dims = format!("{} radial", scan_dim);

    let start = index.start.map_or_else(|| "unknown".to_string(), iso);
    let mut time = b
        .new_variable(root, time_name.as_str(), DataType::Int, &plane_dims)?
        .with_attribute(Attribute::new(names::LONG_NAME, "time since base date"))
        .with_attribute(Attribute::new(names::UNITS, format!("msecs since {}", start)))
        .with_attribute(Attribute::new(names::MISSING_VALUE, MISSING_INT))
        .with_attribute(Attribute::new(names::COORDINATE_AXIS_TYPE, "Time"));
    time.set_cached_data(Array::new(plane.clone(), ArrayData::Int(coords.time))?)?;
    b.add_variable(root, time)?;

    let mut elevation = b
        .new_variable(root, elevation_name.as_str(), DataType::Float, &plane_dims)?
        .with_attribute(Attribute::new(names::UNITS, "degrees"))
        .with_attribute(Attribute::new(
            names::LONG_NAME,
            "elevation angle in degrees: 0 = parallel to pedestal base, 90 = perpendicular",
        ))
        .with_attribute(Attribute::new(names::MISSING_VALUE, MISSING_FLOAT))
        .with_attribute(Attribute::new(names::COORDINATE_AXIS_TYPE, "RadialElevation"));
    elevation.set_cached_data(Array::new(plane.clone(), ArrayData::Float(coords.elevation))?)?;
    b.add_variable(root, elevation)?;

    let mut azimuth = b
        .new_variable(root, azimuth_name.as_str(), DataType::Float, &plane_dims)?
        .with_attribute(Attribute::new(names::UNITS, "degrees"))
        .with_attribute(Attribute::new(
            names::LONG_NAME,
            "azimuth angle in degrees: 0 = true north, 90 = east",
        ))
        .with_attribute(Attribute::new(names::MISSING_VALUE, MISSING_FLOAT))
        .with_attribute(Attribute::new(names::COORDINATE_AXIS_TYPE, "RadialAzimuth"));
    azimuth.set_cached_data(Array::new(plane, ArrayData::Float(coords.azimuth))?)?;
    b.add_variable(root, azimuth)?;

    let gate_start = first.gate_start(table.moment) as f64;
    let gate_size = first.gate_size(table.moment) as f64;
    let mut distance = b
        .new_variable(root, distance_name.as_str(), DataType::Float, &gate_dim)?
        .with_attribute(Attribute::new(names::UNITS, "m"))
        .with_attribute(Attribute::new(names::LONG_NAME, "radial distance to start of gate"))
        .with_attribute(Attribute::new(names::COORDINATE_AXIS_TYPE, "RadialDistance"));
    distance.set_cached_data(Array::linear_f32(ngates, gate_start, gate_size))?;
    b.add_variable(root, distance)?;

    let mut num_radials = b
        .new_variable(root, format!("numRadials{}", abbrev), DataType::Int, &scan_dim)?
        .with_attribute(Attribute::new(names::LONG_NAME, "number of valid radials in this scan"));
    num_radials.set_cached_data(Array::new(vec![nscans], ArrayData::Int(table.radial_counts.clone()))?)?;
    b.add_variable(root, num_radials)?;

    let mut num_gates = b
        .new_variable(root, format!("numGates{}", abbrev), DataType::Int, &scan_dim)?
        .with_attribute(Attribute::new(names::LONG_NAME, "number of valid gates in this scan"));
    num_gates.set_cached_data(Array::new(vec![nscans], ArrayData::Int(table.gate_counts.clone()))?)?;
    b.add_variable(root, num_gates)?;

    Ok(gate_start + ngates as f64 * gate_size)
}

fn add_site(b: &mut ModelBuilder, site: &SiteInfo, radar_radius: f64) -> CdmResult<()> {
    let root = GroupId::ROOT;
    let lat = site.latitude as f64;
    let lon = site.longitude as f64;
    b.add_attribute(root, Attribute::new("Station", site.station_id.as_str()))?;
    b.add_attribute(root, Attribute::new("StationName", site.station_name.as_str()))?;
    b.add_attribute(root, Attribute::new("StationLatitude", lat))?;
    b.add_attribute(root, Attribute::new("StationLongitude", lon))?;
    b.add_attribute(root, Attribute::new("StationElevationInMeters", site.elevation as f64))?;

    let lat_radius = (radar_radius / EARTH_RADIUS_M).to_degrees();
    let lon_radius = (radar_radius / lat.to_radians().cos() / EARTH_RADIUS_M).to_degrees();
    b.add_attribute(root, Attribute::new("geospatial_lat_min", lat - lat_radius))?;
    b.add_attribute(root, Attribute::new("geospatial_lat_max", lat + lat_radius))?;
    b.add_attribute(root, Attribute::new("geospatial_lon_min", lon - lon_radius))?;
    b.add_attribute(root, Attribute::new("geospatial_lon_max", lon + lon_radius))?;

    let mut transform = Variable::new("radialCoordinateTransform", DataType::Char, Vec::new())
        .with_attribute(Attribute::new("transform_name", "Radial"))
        .with_attribute(Attribute::new("center_latitude", lat))
        .with_attribute(Attribute::new("center_longitude", lon))
        .with_attribute(Attribute::new("center_elevation", site.elevation as f64))
        .with_attribute(Attribute::new("_CoordinateTransformType", "Radial"))
        .with_attribute(Attribute::new(
            "_CoordinateAxisTypes",
            "RadialElevation RadialAzimuth RadialDistance",
        ));
    transform.set_cached_data(Array::scalar(ArrayData::Char(vec![b' ']))?)?;
    b.add_variable(root, transform)
}

fn add_globals(
    b: &mut ModelBuilder,
    variant: Variant,
    site: Option<&SiteInfo>,
    index: &VolumeIndex,
) -> CdmResult<()> {
    let root = GroupId::ROOT;
    let start = index.start.map(iso);
    let end = index.end.map(iso);

    b.add_attribute(root, Attribute::new(names::CONVENTIONS, "_Coordinates"))?;
    b.add_attribute(root, Attribute::new("format", variant.spec().name))?;
    b.add_attribute(root, Attribute::new(names::FEATURE_TYPE, "RADIAL"))?;
    if let (Some(start), Some(end)) = (&start, &end) {
        b.add_attribute(root, Attribute::new("time_coverage_start", start.as_str()))?;
        b.add_attribute(root, Attribute::new("time_coverage_end", end.as_str()))?;
        let station = site.map_or("unknown", |s| s.station_id.as_str());
        b.add_attribute(
            root,
            Attribute::new(
                "Title",
                format!("CINRAD Level 2 Station {} from {} to {}", station, start, end),
            ),
        )?;
    }
    b.add_attribute(root, Attribute::new(names::HISTORY, "Direct read of CINRAD Level 2 file"))?;
    b.add_attribute(root, Attribute::new("DataType", "Radial"))?;
    b.add_attribute(
        root,
        Attribute::new(
            "Summary",
            "CINRAD Level II data are the three meteorological base data quantities: \
             reflectivity, mean radial velocity, and spectrum width.",
        ),
    )?;
    b.add_attribute(
        root,
        Attribute::new(
            "keywords",
            "CINRAD; Radar Level II; reflectivity; mean radial velocity; spectrum width",
        ),
    )?;
    b.add_attribute(root, Attribute::new("VolumeCoveragePatternName", vcp_name(index.vcp)))?;
    b.add_attribute(root, Attribute::new("VolumeCoveragePattern", index.vcp as i32))?;
    b.add_attribute(
        root,
        Attribute::new("HorizontalBeamWidthInDegrees", HORIZONTAL_BEAM_WIDTH_DEG),
    )
}
