//! Integration tests for the CINRAD provider.
//!
//! Volumes come from [`CinradVolume`], whose gate values are a pure function
//! of position, so every decoded gate can be checked exactly.

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use cdm_common::{Attribute, AttributeValue, CdmError, Section};
use cinrad_parser::{Anomaly, CinradIosp, Variant, VolumeIndex};
use iosp::{CancelToken, FileSession, IoServiceProvider, IospConfig, IospRegistry, MemorySource};
use test_utils::fixtures::{gates, site, time, VCP};
use test_utils::{
    gate_value, gate_value_i16, init_test_tracing, radial_azimuth, scan_elevation, temp_test_dir,
    CinradFlavor, CinradVolume, DOPPLER_LOW, REFLECTIVITY, SPECTRUM_WIDTH, VELOCITY,
};

/// SA missing code.
const SA_MISSING: u8 = 1;

fn registry() -> IospRegistry {
    let mut r = IospRegistry::new(IospConfig::default());
    r.register(100, |config| Box::new(CinradIosp::new(config)));
    r
}

fn open(volume: &CinradVolume) -> Result<FileSession> {
    let source = MemorySource::new(format!("{:?}.bin", volume.flavor()), volume.build());
    Ok(registry().open(Arc::new(source))?)
}

fn text_attr(session: &FileSession, name: &str) -> String {
    session
        .model()
        .unwrap()
        .find_global_attribute(name)
        .and_then(Attribute::as_text)
        .unwrap_or_else(|| panic!("missing global attribute {}", name))
        .to_string()
}

fn var_attr(session: &FileSession, var: &str, name: &str) -> Option<f64> {
    session
        .find_variable(var)
        .unwrap()
        .find_attribute(name)
        .and_then(Attribute::as_f64)
}

fn index_of(volume: &CinradVolume, variant: Variant) -> VolumeIndex {
    let source = MemorySource::new("volume.bin", volume.build());
    VolumeIndex::build(&source, variant.spec(), &CancelToken::new()).unwrap()
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_sa_volume_structure() -> Result<()> {
    init_test_tracing();
    let volume = CinradVolume::new(CinradFlavor::Sa).scans(3).radials(5).gates(10, 20);
    let session = open(&volume)?;
    let model = session.model()?;

    assert_eq!(session.file_type_id(), Some("CINRAD"));
    assert_eq!(session.find_variable("Reflectivity")?.shape(), vec![3, 5, 10]);
    assert_eq!(session.find_variable("RadialVelocity")?.shape(), vec![3, 5, 20]);
    assert_eq!(session.find_variable("SpectrumWidth")?.shape(), vec![3, 5, 20]);
    assert_eq!(session.find_variable("timeR")?.shape(), vec![3, 5]);
    assert_eq!(session.find_variable("distanceV")?.shape(), vec![20]);
    assert_eq!(session.find_variable("numRadialsV")?.shape(), vec![3]);

    assert_eq!(text_attr(&session, "format"), "CINRAD-SA");
    assert_eq!(text_attr(&session, "featureType"), "RADIAL");
    assert_eq!(text_attr(&session, "Conventions"), "_Coordinates");
    assert_eq!(text_attr(&session, "time_coverage_start"), time::VOLUME_START_ISO);
    assert_eq!(
        text_attr(&session, "VolumeCoveragePatternName"),
        "11 elevation scans every 6 mins"
    );
    assert_eq!(
        model
            .find_global_attribute("VolumeCoveragePattern")
            .and_then(Attribute::as_f64),
        Some(VCP as f64)
    );
    // No site block in the base layout.
    assert!(model.find_global_attribute("Station").is_none());
    assert!(model.find_variable("radialCoordinateTransform").is_none());
    Ok(())
}

#[test]
fn test_moment_attributes() -> Result<()> {
    let session = open(&CinradVolume::new(CinradFlavor::Sa))?;
    assert_eq!(var_attr(&session, "Reflectivity", "scale_factor"), Some(0.5));
    assert_eq!(var_attr(&session, "Reflectivity", "add_offset"), Some(-33.0));
    assert_eq!(var_attr(&session, "RadialVelocity", "add_offset"), Some(-64.5));

    let refl = session.find_variable("Reflectivity")?;
    assert_eq!(
        refl.find_attribute("missing_value").map(|a| &a.value),
        Some(&AttributeValue::Bytes(vec![1, 0]))
    );
    assert_eq!(
        refl.find_attribute("_CoordinateAxes").and_then(Attribute::as_text),
        Some("timeR elevationR azimuthR distanceR")
    );
    assert_eq!(
        refl.find_attribute("units").and_then(Attribute::as_text),
        Some("dBz")
    );
    Ok(())
}

#[test]
fn test_low_resolution_velocity_packing() -> Result<()> {
    let session = open(&CinradVolume::new(CinradFlavor::Sa).velocity_resolution(DOPPLER_LOW))?;
    assert_eq!(var_attr(&session, "RadialVelocity", "scale_factor"), Some(1.0));
    assert_eq!(var_attr(&session, "RadialVelocity", "add_offset"), Some(-129.0));
    // Spectrum width keeps its packing.
    assert_eq!(var_attr(&session, "SpectrumWidth", "scale_factor"), Some(0.5));
    Ok(())
}

#[test]
fn test_signature_variants_site_attributes() -> Result<()> {
    for (flavor, format) in [
        (CinradFlavor::Sc, "CINRAD-SC"),
        (CinradFlavor::Cc, "CINRAD-CC"),
        (CinradFlavor::Cc20, "CINRAD-CC2.0"),
    ] {
        let session = open(&CinradVolume::new(flavor))?;
        assert_eq!(text_attr(&session, "format"), format);
        assert_eq!(text_attr(&session, "Station"), site::STATION_ID);
        assert_eq!(text_attr(&session, "StationName"), site::STATION_NAME);

        let model = session.model()?;
        let lat = model
            .find_global_attribute("StationLatitude")
            .and_then(Attribute::as_f64)
            .unwrap();
        test_utils::assert_approx_eq!(lat, site::LATITUDE as f64, 1e-4);
        let lat_min = model
            .find_global_attribute("geospatial_lat_min")
            .and_then(Attribute::as_f64)
            .unwrap();
        assert!(lat_min < lat);
        assert!(model.find_variable("radialCoordinateTransform").is_some());
    }
    Ok(())
}

#[test]
fn test_cd_marker_is_sc_layout() -> Result<()> {
    let volume = CinradVolume::new(CinradFlavor::Sc).radar_type("CINRAD/CD");
    let session = open(&volume)?;
    assert_eq!(text_attr(&session, "format"), "CINRAD-SC");
    Ok(())
}

#[test]
fn test_cc20_velocity_missing_value() -> Result<()> {
    let session = open(&CinradVolume::new(CinradFlavor::Cc20))?;
    let velocity = session.find_variable("RadialVelocity")?;
    assert_eq!(
        velocity.find_attribute("missing_value").map(|a| &a.value),
        Some(&AttributeValue::Ints(vec![-128]))
    );
    let width = session.find_variable("SpectrumWidth")?;
    assert_eq!(
        width.find_attribute("missing_value").map(|a| &a.value),
        Some(&AttributeValue::Bytes(vec![0, 0]))
    );
    Ok(())
}

#[test]
fn test_probe_rejects_other_formats() {
    let iosp = CinradIosp::default();
    assert!(!iosp.probe(b"CDF\x01\x00\x00\x00\x00"));
    assert!(!iosp.probe(&[0u8; 512]));
    assert!(iosp.probe(&CinradVolume::new(CinradFlavor::Sa).build()[..512]));
    assert!(iosp.probe(&CinradVolume::new(CinradFlavor::Cc).build()[..512]));
}

// ============================================================================
// Gate decoding
// ============================================================================

#[test]
fn test_sa_gate_values() -> Result<()> {
    let volume = CinradVolume::new(CinradFlavor::Sa).scans(2).radials(4).gates(6, 9);
    let session = open(&volume)?;

    let refl = session.read_all("Reflectivity")?;
    let refl = refl.as_ubytes().unwrap();
    let vel = session.read_all("RadialVelocity")?;
    let vel = vel.as_ubytes().unwrap();
    let width = session.read_all("SpectrumWidth")?;
    let width = width.as_ubytes().unwrap();

    for scan in 0..2 {
        for radial in 0..4 {
            for gate in 0..6 {
                let at = (scan * 4 + radial) * 6 + gate;
                assert_eq!(refl[at], gate_value(REFLECTIVITY, scan, radial, gate));
            }
            for gate in 0..9 {
                let at = (scan * 4 + radial) * 9 + gate;
                assert_eq!(vel[at], gate_value(VELOCITY, scan, radial, gate));
                assert_eq!(width[at], gate_value(SPECTRUM_WIDTH, scan, radial, gate));
            }
        }
    }
    Ok(())
}

#[test]
fn test_signature_variant_gate_values() -> Result<()> {
    for flavor in [CinradFlavor::Sc, CinradFlavor::Cc20] {
        let session = open(&CinradVolume::new(flavor))?;
        let vel = session.read_section_str("RadialVelocity", "1,3,0:11")?;
        let expected: Vec<u8> = (0..12).map(|g| gate_value(VELOCITY, 1, 3, g)).collect();
        assert_eq!(vel.as_ubytes().unwrap(), expected.as_slice(), "{:?}", flavor);
    }
    Ok(())
}

#[test]
fn test_cc_short_gates() -> Result<()> {
    let session = open(&CinradVolume::new(CinradFlavor::Cc))?;
    let refl = session.find_variable("Reflectivity")?;
    assert_eq!(refl.data_type(), cdm_common::DataType::Short);
    assert_eq!(
        refl.find_attribute("missing_value").map(|a| &a.value),
        Some(&AttributeValue::Shorts(vec![-32768]))
    );

    let data = session.read_section_str("Reflectivity", "0,2,:")?;
    let expected: Vec<i16> = (0..8).map(|g| gate_value_i16(REFLECTIVITY, 0, 2, g)).collect();
    assert_eq!(data.as_shorts().unwrap(), expected.as_slice());

    let width = session.read_section_str("SpectrumWidth", "1,5,11")?;
    assert_eq!(width.as_shorts().unwrap(), &[gate_value_i16(SPECTRUM_WIDTH, 1, 5, 11)]);
    Ok(())
}

#[test]
fn test_strided_section() -> Result<()> {
    let session = open(&CinradVolume::new(CinradFlavor::Sa))?;
    let data = session.read_section_str("RadialVelocity", "0:1,1:5:2,2:10:4")?;
    assert_eq!(data.shape(), &[2, 3, 3]);

    let mut expected = Vec::new();
    for scan in 0..2 {
        for radial in [1, 3, 5] {
            for gate in [2, 6, 10] {
                expected.push(gate_value(VELOCITY, scan, radial, gate));
            }
        }
    }
    assert_eq!(data.as_ubytes().unwrap(), expected.as_slice());
    Ok(())
}

#[test]
fn test_section_out_of_shape() -> Result<()> {
    let session = open(&CinradVolume::new(CinradFlavor::Sa))?;
    let section = Section::from_tuples(&[(0, 1, 1), (0, 7, 1), (0, 8, 1)])?;
    assert!(matches!(
        session.read("Reflectivity", &section),
        Err(CdmError::Range(_))
    ));
    Ok(())
}

#[test]
fn test_provider_rejects_section_out_of_shape() -> Result<()> {
    let volume = CinradVolume::new(CinradFlavor::Sa);
    let cancel = CancelToken::new();
    let mut iosp = CinradIosp::new(&IospConfig::default());
    let model = iosp.open(Arc::new(MemorySource::new("sa.bin", volume.build())), &cancel)?;
    let var = model.find_variable("Reflectivity").unwrap();

    let past_last_scan = Section::from_tuples(&[(7, 1, 1), (0, 1, 1), (0, 1, 1)])?;
    assert!(matches!(
        iosp.read_data(var, &past_last_scan, &cancel),
        Err(CdmError::Range(_))
    ));
    let wrong_rank = Section::from_tuples(&[(0, 1, 1), (0, 1, 1)])?;
    assert!(matches!(
        iosp.read_data(var, &wrong_rank, &cancel),
        Err(CdmError::Range(_))
    ));
    let first_gate = Section::from_tuples(&[(0, 1, 1), (0, 1, 1), (0, 1, 1)])?;
    assert_eq!(iosp.read_data(var, &first_gate, &cancel)?.len(), 1);
    Ok(())
}

// ============================================================================
// Coordinates
// ============================================================================

#[test]
fn test_coordinate_variables() -> Result<()> {
    let volume = CinradVolume::new(CinradFlavor::Sa).scans(2).radials(6);
    let session = open(&volume)?;

    let time_var = session.find_variable("timeR")?;
    assert_eq!(
        time_var.find_attribute("units").and_then(Attribute::as_text),
        Some(format!("msecs since {}", time::VOLUME_START_ISO).as_str())
    );

    let times = session.read_all("timeR")?;
    let elevations = session.read_all("elevationR")?;
    let azimuths = session.read_all("azimuthV")?;
    for scan in 0..2 {
        for radial in 0..6 {
            let at = scan * 6 + radial;
            assert_eq!(
                times.as_ints().unwrap()[at],
                (scan * 6 + radial) as i32 * time::RADIAL_STEP_MSECS
            );
            test_utils::assert_approx_eq!(
                elevations.as_floats().unwrap()[at],
                scan_elevation(scan),
                0.01
            );
            test_utils::assert_approx_eq!(
                azimuths.as_floats().unwrap()[at],
                radial_azimuth(radial, 6),
                0.01
            );
        }
    }

    let distance = session.read_all("distanceR")?;
    let distance = distance.as_floats().unwrap();
    assert_eq!(distance[0], gates::REFLECTIVITY_START as f32);
    assert_eq!(distance[3], 3.0 * gates::REFLECTIVITY_SIZE as f32);
    let distance_v = session.read_all("distanceV")?;
    assert_eq!(distance_v.as_floats().unwrap()[2], 2.0 * gates::DOPPLER_SIZE as f32);

    assert_eq!(session.read_all("numGatesR")?.as_ints().unwrap(), &[8, 8]);
    assert_eq!(session.read_all("numGatesV")?.as_ints().unwrap(), &[12, 12]);
    Ok(())
}

#[test]
fn test_doppler_from_later_scan() -> Result<()> {
    let volume = CinradVolume::new(CinradFlavor::Sa).scans(3).doppler_from_scan(1);
    let session = open(&volume)?;
    let model = session.model()?;

    assert_eq!(model.find_dimension(cdm_common::GroupId::ROOT, "scanR").unwrap().extent(), 3);
    assert_eq!(model.find_dimension(cdm_common::GroupId::ROOT, "scanV").unwrap().extent(), 2);

    // Velocity scan 0 is the file's second elevation.
    let vel = session.read_section_str("RadialVelocity", "0,0,0:3")?;
    let expected: Vec<u8> = (0..4).map(|g| gate_value(VELOCITY, 1, 0, g)).collect();
    assert_eq!(vel.as_ubytes().unwrap(), expected.as_slice());

    let elevation = session.read_section_str("elevationV", "0,0")?;
    test_utils::assert_approx_eq!(elevation.as_floats().unwrap()[0], scan_elevation(1), 0.01);
    Ok(())
}

#[test]
fn test_reflectivity_only_volume() -> Result<()> {
    let volume = CinradVolume::new(CinradFlavor::Sa).doppler_from_scan(5);
    let session = open(&volume)?;
    assert!(session.find_variable("Reflectivity").is_ok());
    assert!(matches!(
        session.find_variable("RadialVelocity"),
        Err(CdmError::Schema(_))
    ));
    assert!(session.model()?.find_variable("timeV").is_none());
    Ok(())
}

// ============================================================================
// Anomalies
// ============================================================================

#[test]
fn test_missing_radial_is_filled() -> Result<()> {
    init_test_tracing();
    let volume = CinradVolume::new(CinradFlavor::Sa).skip_radial(0, 2);
    let session = open(&volume)?;

    // The full scan keeps the radial dimension at 6.
    assert_eq!(session.find_variable("Reflectivity")?.shape(), vec![2, 6, 8]);
    assert_eq!(session.read_all("numRadialsR")?.as_ints().unwrap(), &[5, 6]);

    let missing = session.read_section_str("Reflectivity", "0,2,:")?;
    assert_eq!(missing.as_ubytes().unwrap(), &[SA_MISSING; 8]);

    let neighbour = session.read_section_str("Reflectivity", "0,3,:")?;
    let expected: Vec<u8> = (0..8).map(|g| gate_value(REFLECTIVITY, 0, 3, g)).collect();
    assert_eq!(neighbour.as_ubytes().unwrap(), expected.as_slice());

    let time = session.read_section_str("timeR", "0,2")?;
    assert_eq!(time.as_ints().unwrap(), &[-9999]);
    let azimuth = session.read_section_str("azimuthR", "0,2")?;
    assert!(azimuth.as_floats().unwrap()[0].is_nan());
    Ok(())
}

#[test]
fn test_time_out_of_order_is_recorded() -> Result<()> {
    let volume = CinradVolume::new(CinradFlavor::Sa).time_out_of_order(1);
    let index = index_of(&volume, Variant::Sa);
    assert!(index
        .anomalies
        .iter()
        .any(|a| matches!(a, Anomaly::TimeOutOfOrder { group: 0, scan: 1, .. })));
    assert!(index
        .anomalies
        .iter()
        .any(|a| matches!(a, Anomaly::TimeOutOfOrder { group: 1, scan: 1, .. })));

    // Decoding still succeeds.
    let session = open(&volume)?;
    let data = session.read_section_str("Reflectivity", "1,0,0")?;
    assert_eq!(data.as_ubytes().unwrap(), &[gate_value(REFLECTIVITY, 1, 0, 0)]);
    Ok(())
}

#[test]
fn test_zero_radial_number_is_skipped() -> Result<()> {
    let volume = CinradVolume::new(CinradFlavor::Sa).zero_radial_number(0, 0);
    let index = index_of(&volume, Variant::Sa);
    assert!(index.anomalies.contains(&Anomaly::RadialOutOfRange {
        group: 0,
        scan: 0,
        radial_number: 0
    }));
    assert_eq!(index.radials, 6);

    let session = open(&volume)?;
    let data = session.read_section_str("Reflectivity", "0,0,:")?;
    assert_eq!(data.as_ubytes().unwrap(), &[SA_MISSING; 8]);
    Ok(())
}

#[test]
fn test_trailing_bytes_are_recorded() {
    let mut bytes = CinradVolume::new(CinradFlavor::Sa).build();
    bytes.extend_from_slice(&[0u8; 100]);
    let source = MemorySource::new("trailing.bin", bytes);
    let index = VolumeIndex::build(&source, Variant::Sa.spec(), &CancelToken::new()).unwrap();
    assert!(index.anomalies.contains(&Anomaly::TrailingBytes { count: 100 }));
    assert_eq!(index.records.len(), 12);
}

#[test]
fn test_mixed_doppler_resolution_fails() {
    let volume = CinradVolume::new(CinradFlavor::Sa).mixed_resolution();
    let source = MemorySource::new("mixed.bin", volume.build());
    assert!(matches!(
        registry().open(Arc::new(source)),
        Err(CdmError::Format(_))
    ));
}

// ============================================================================
// Cancellation and concurrency
// ============================================================================

#[test]
fn test_cancelled_index_build() {
    let volume = CinradVolume::new(CinradFlavor::Sa);
    let source = MemorySource::new("volume.bin", volume.build());
    let token = CancelToken::new();
    token.cancel();
    let err = VolumeIndex::build(&source, Variant::Sa.spec(), &token).unwrap_err();
    assert!(matches!(CdmError::from(err), CdmError::Cancelled { .. }));
}

#[test]
fn test_cancelled_read() -> Result<()> {
    let session = open(&CinradVolume::new(CinradFlavor::Sa))?;
    session.cancel_token().cancel();
    assert!(matches!(
        session.read_all("Reflectivity"),
        Err(CdmError::Cancelled { completed: 0, total: 2 })
    ));
    // Cached coordinates are served without decoding.
    assert!(session.read_all("timeR").is_ok());
    Ok(())
}

#[test]
fn test_concurrent_disjoint_reads() -> Result<()> {
    let volume = CinradVolume::new(CinradFlavor::Sc).scans(4).radials(8);
    let session = open(&volume)?;

    let requests: Vec<(&str, Section)> = (0..4)
        .map(|scan| {
            let s = Section::from_tuples(&[(scan, 1, 1), (0, 8, 1), (0, 12, 1)]).unwrap();
            ("RadialVelocity", s)
        })
        .collect();
    let results = session.read_many(&requests);
    for (scan, result) in results.into_iter().enumerate() {
        let data = result?;
        assert_eq!(data.as_ubytes().unwrap()[13], gate_value(VELOCITY, scan, 1, 1));
    }

    thread::scope(|s| {
        for scan in 0..4 {
            let session = &session;
            s.spawn(move || {
                let data = session
                    .read_section_str("Reflectivity", &format!("{},:,:", scan))
                    .unwrap();
                let bytes = data.as_ubytes().unwrap();
                assert_eq!(bytes[8 * 7 + 7], gate_value(REFLECTIVITY, scan, 7, 7));
            });
        }
    });
    Ok(())
}

#[test]
fn test_open_from_disk() -> Result<()> {
    let dir = temp_test_dir();
    let path = CinradVolume::new(CinradFlavor::Cc20).write_to(dir.path(), "cc20.bin");
    let mut session = registry().open_path(&path)?;
    assert_eq!(text_attr(&session, "format"), "CINRAD-CC2.0");
    session.close()?;
    assert!(matches!(session.read_all("Reflectivity"), Err(CdmError::Closed(_))));
    Ok(())
}
