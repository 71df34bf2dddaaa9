//! Integration tests for the classic netCDF reader and writer.
//!
//! Files are written with [`Netcdf3Writer`] into a temp dir and read back
//! through the provider registry. Layouts the writer never produces are
//! built from hand-encoded headers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use cdm_common::{Array, ArrayData, Attribute, CdmError, CdmResult, DataType, Section};
use iosp::{FileSession, IospConfig, IospRegistry, MemorySource};
use netcdf3_parser::header::{parse_header, DimensionEntry, Header, VariableEntry, Version};
use netcdf3_parser::{Netcdf3Iosp, Netcdf3Writer};
use test_utils::{init_test_tracing, temp_test_dir};

fn registry() -> IospRegistry {
    let mut r = IospRegistry::new(IospConfig::default());
    r.register(100, |config| Box::new(Netcdf3Iosp::new(config)));
    r
}

fn open(path: &Path) -> FileSession {
    registry().open_path(path).expect("open classic file")
}

fn read_header(path: &Path) -> Header {
    let bytes = fs::read(path).unwrap();
    parse_header(&bytes).unwrap().0
}

/// Data of `n` elements of `data_type`, distinct per `seed`.
fn sample(data_type: DataType, n: usize, seed: usize) -> ArrayData {
    match data_type {
        DataType::Byte => ArrayData::Byte((0..n).map(|i| ((i * 3 + seed) % 100) as i8 - 60).collect()),
        DataType::Char => ArrayData::Char((0..n).map(|i| b'a' + ((i + seed) % 26) as u8).collect()),
        DataType::Short => ArrayData::Short((0..n).map(|i| ((i * 1000 + seed) % 30_000) as i16 - 9000).collect()),
        DataType::Int => ArrayData::Int((0..n).map(|i| (i * 100_000 + seed) as i32).collect()),
        DataType::Float => ArrayData::Float((0..n).map(|i| i as f32 * 0.5 + seed as f32).collect()),
        other => panic!("no sample data for {}", other),
    }
}

/// Write `nvars` record variables of `data_type` over `time` (and `len` when
/// `two_d`), `nrecs` records each. Returns the path and the written arrays.
fn write_record_file(
    dir: &Path,
    data_type: DataType,
    two_d: bool,
    nvars: usize,
    nrecs: usize,
) -> (PathBuf, Vec<Array>) {
    let path = dir.join(format!("{}_{}_{}.nc", data_type, two_d, nvars));
    let mut w = Netcdf3Writer::create(&path).unwrap();
    w.add_unlimited_dimension("time").unwrap();
    let (dims, shape) = if two_d {
        w.add_dimension("len", 3).unwrap();
        ("time len", vec![nrecs, 3])
    } else {
        ("time", vec![nrecs])
    };
    let names = ["a", "b"];
    for name in &names[..nvars] {
        w.add_variable(name, data_type, dims).unwrap();
    }
    w.end_define().unwrap();

    let n = shape.iter().product();
    let mut written = Vec::new();
    for (k, name) in names[..nvars].iter().enumerate() {
        let array = Array::new(shape.clone(), sample(data_type, n, k * 7 + 1)).unwrap();
        w.write(name, &vec![0; shape.len()], &array).unwrap();
        written.push(array);
    }
    w.close().unwrap();
    (path, written)
}

// ============================================================================
// vsize rules
// ============================================================================

#[test]
fn test_lone_byte_record_variable_padded_to_four() {
    let dir = temp_test_dir();
    let (path, _) = write_record_file(dir.path(), DataType::Byte, false, 1, 3);
    let header = read_header(&path);
    assert_eq!(header.variables[0].vsize, 4);

    // three records of four bytes each follow the header
    let len = fs::metadata(&path).unwrap().len();
    assert_eq!(len, header.variables[0].begin + 3 * 4);
}

#[test]
fn test_two_byte_record_variables_share_one_padded_record() {
    let dir = temp_test_dir();
    let (path, _) = write_record_file(dir.path(), DataType::Byte, false, 2, 3);
    let header = read_header(&path);
    assert_eq!(header.variables[0].vsize, 1);
    assert_eq!(header.variables[1].vsize, 1);
    assert_eq!(header.variables[1].begin, header.variables[0].begin + 1);

    let len = fs::metadata(&path).unwrap().len();
    assert_eq!(len, header.variables[0].begin + 3 * 4);
}

#[test]
fn test_lone_short_record_variable_unpadded() {
    let dir = temp_test_dir();
    let (path, _) = write_record_file(dir.path(), DataType::Short, false, 1, 5);
    let header = read_header(&path);
    assert_eq!(header.variables[0].vsize, 2);

    let len = fs::metadata(&path).unwrap().len();
    assert_eq!(len, header.variables[0].begin + 5 * 2);
}

#[test]
fn test_short_and_int_record_rounds_to_eight() {
    let dir = temp_test_dir();
    let path = dir.path().join("mixed.nc");
    let mut w = Netcdf3Writer::create(&path).unwrap();
    w.add_unlimited_dimension("time").unwrap();
    w.add_variable("s", DataType::Short, "time").unwrap();
    w.add_variable("i", DataType::Int, "time").unwrap();
    w.end_define().unwrap();
    assert_eq!(w.record_size(), 8);
    w.write("s", &[0], &Array::new(vec![2], ArrayData::Short(vec![1, 2])).unwrap())
        .unwrap();
    w.write("i", &[0], &Array::new(vec![2], ArrayData::Int(vec![10, 20])).unwrap())
        .unwrap();
    w.close().unwrap();

    let session = open(&path);
    assert_eq!(session.read_all("s").unwrap().as_shorts().unwrap(), &[1, 2]);
    assert_eq!(session.read_all("i").unwrap().as_ints().unwrap(), &[10, 20]);
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_record_round_trips_are_byte_identical() {
    init_test_tracing();
    let dir = temp_test_dir();
    for data_type in [DataType::Byte, DataType::Char, DataType::Short] {
        for two_d in [false, true] {
            for nvars in [1, 2] {
                let (path, written) = write_record_file(dir.path(), data_type, two_d, nvars, 4);
                let session = open(&path);
                for (name, expected) in ["a", "b"].iter().zip(&written) {
                    let got = session.read_all(name).unwrap();
                    assert_eq!(
                        &got, expected,
                        "{} two_d={} nvars={} var={}",
                        data_type, two_d, nvars, name
                    );
                }
            }
        }
    }
}

#[test]
fn test_fixed_and_record_variables_together() -> Result<()> {
    let dir = temp_test_dir();
    let path = dir.path().join("grid.nc");
    let mut w = Netcdf3Writer::create(&path)?;
    w.add_unlimited_dimension("time")?;
    w.add_dimension("y", 3)?;
    w.add_dimension("x", 4)?;
    w.add_global_attribute(Attribute::new("title", "test grid"))?;
    w.add_variable("lat", DataType::Float, "y")?;
    w.add_variable("temp", DataType::Short, "time y x")?;
    w.add_variable_attribute("temp", Attribute::new("scale_factor", 0.01f32))?;
    w.end_define()?;

    w.write("lat", &[0], &Array::new(vec![3], ArrayData::Float(vec![10.0, 20.0, 30.0]))?)?;
    let temps: Vec<i16> = (0..24).collect();
    w.write("temp", &[0, 0, 0], &Array::new(vec![2, 3, 4], ArrayData::Short(temps))?)?;
    w.close()?;

    let session = open(&path);
    let model = session.model()?;
    assert_eq!(
        model.find_global_attribute("title").and_then(|a| a.as_text()),
        Some("test grid")
    );
    let temp = session.find_variable("temp")?;
    assert_eq!(temp.shape(), vec![2, 3, 4]);
    assert!(temp.is_unlimited());
    assert_eq!(temp.find_attribute("scale_factor").and_then(|a| a.as_f64()), Some(0.01f32 as f64));

    assert_eq!(session.read_all("lat")?.as_floats().unwrap(), &[10.0, 20.0, 30.0]);

    // second record, middle row, every other column
    let a = session.read_section_str("temp", "1,1,0:3:2")?;
    assert_eq!(a.shape(), &[1, 1, 2]);
    assert_eq!(a.as_shorts().unwrap(), &[16, 18]);

    // a column through every record
    let a = session.read_section_str("temp", ":,2,3")?;
    assert_eq!(a.as_shorts().unwrap(), &[11, 23]);
    Ok(())
}

#[test]
fn test_char_rows_read_as_strings() -> Result<()> {
    let dir = temp_test_dir();
    let path = dir.path().join("names.nc");
    let mut w = Netcdf3Writer::create(&path)?;
    w.add_unlimited_dimension("station")?;
    w.add_dimension("name_len", 6)?;
    w.add_variable("name", DataType::Char, "station name_len")?;
    w.end_define()?;
    let mut raw = Vec::new();
    for name in ["ALPHA", "BETA", "GAMMA6"] {
        let mut row = name.as_bytes().to_vec();
        row.resize(6, 0);
        raw.extend(row);
    }
    w.write("name", &[0, 0], &Array::new(vec![3, 6], ArrayData::Char(raw))?)?;
    w.close()?;

    let session = open(&path);
    let names = session.read_all("name")?.strings()?;
    assert_eq!(names, vec!["ALPHA", "BETA", "GAMMA6"]);
    Ok(())
}

#[test]
fn test_64bit_offset_variant() -> Result<()> {
    let dir = temp_test_dir();
    let path = dir.path().join("offset64.nc");
    let mut w = Netcdf3Writer::create(&path)?.with_64bit_offsets();
    w.add_dimension("n", 5)?;
    w.add_variable("v", DataType::Double, "n")?;
    w.end_define()?;
    let values = vec![1.5, -2.5, 3.25, 0.0, 1e10];
    w.write("v", &[0], &Array::new(vec![5], ArrayData::Double(values.clone()))?)?;
    w.close()?;

    assert_eq!(fs::read(&path)?[3], 2);
    let session = open(&path);
    assert_eq!(session.read_all("v")?.as_doubles().unwrap(), values.as_slice());
    Ok(())
}

// ============================================================================
// Appending and sync
// ============================================================================

#[test]
fn test_sync_picks_up_appended_records() -> Result<()> {
    init_test_tracing();
    let dir = temp_test_dir();
    let path = dir.path().join("append.nc");
    let mut w = Netcdf3Writer::create(&path)?;
    w.add_unlimited_dimension("time")?;
    w.add_variable("t", DataType::Int, "time")?;
    w.end_define()?;
    w.write("t", &[0], &Array::new(vec![2], ArrayData::Int(vec![100, 200]))?)?;
    w.flush()?;

    let session = open(&path);
    assert_eq!(session.find_variable("t")?.shape(), vec![2]);
    assert!(!session.sync()?);

    w.write("t", &[2], &Array::new(vec![2], ArrayData::Int(vec![300, 400]))?)?;
    w.flush()?;
    assert_eq!(w.numrecs(), 4);

    assert!(session.sync()?);
    let model = session.model()?;
    assert_eq!(model.unlimited_dimension().map(|d| d.length()), Some(4));
    assert_eq!(session.find_variable("t")?.shape(), vec![4]);
    assert_eq!(session.read_all("t")?.as_ints().unwrap(), &[100, 200, 300, 400]);

    w.close()?;
    Ok(())
}

#[test]
fn test_streaming_numrecs_counted_from_file_length() -> Result<()> {
    let dir = temp_test_dir();
    let (path, written) = write_record_file(dir.path(), DataType::Short, true, 2, 3);
    let mut bytes = fs::read(&path)?;
    bytes[4..8].copy_from_slice(&[0xFF; 4]);
    fs::write(&path, &bytes)?;

    let session = open(&path);
    assert_eq!(session.find_variable("a")?.shape(), vec![3, 3]);
    assert_eq!(&session.read_all("b")?, &written[1]);
    Ok(())
}

// ============================================================================
// Hand-encoded layouts
// ============================================================================

fn dim(name: &str, length: u64) -> DimensionEntry {
    DimensionEntry {
        name: name.into(),
        length,
    }
}

fn var(name: &str, dim_ids: Vec<usize>, data_type: DataType, vsize: u64) -> VariableEntry {
    VariableEntry {
        name: name.into(),
        dim_ids,
        attributes: Vec::new(),
        data_type,
        vsize,
        begin: 0,
    }
}

fn open_bytes(name: &str, bytes: Vec<u8>) -> CdmResult<FileSession> {
    registry().open(Arc::new(MemorySource::new(name, bytes)))
}

/// Two short record variables each padded to 4 bytes on their own:
/// `v(time, s=3)` with vsize 8 and `v2(time)` with vsize 4, 12-byte records.
fn individually_padded_file() -> Vec<u8> {
    let mut header = Header {
        version: Version::Classic,
        numrecs: Some(2),
        dimensions: vec![dim("time", 0), dim("s", 3)],
        attributes: Vec::new(),
        variables: vec![
            var("v", vec![0, 1], DataType::Short, 8),
            var("v2", vec![0], DataType::Short, 4),
        ],
    };
    let begin = header.encode().len() as u64;
    header.variables[0].begin = begin;
    header.variables[1].begin = begin + 8;

    let mut bytes = header.encode();
    let records: [([i16; 3], i16); 2] = [([0, 1, 2], 100), ([10, 11, 12], 101)];
    for (v, v2) in records {
        for x in v {
            bytes.extend_from_slice(&x.to_be_bytes());
        }
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(&v2.to_be_bytes());
        bytes.extend_from_slice(&[0, 0]);
    }
    bytes
}

#[test]
fn test_individually_padded_record_variables() -> Result<()> {
    init_test_tracing();
    let session = open_bytes("padded.nc", individually_padded_file())?;
    assert_eq!(
        session.read_all("v")?.as_shorts().unwrap(),
        &[0, 1, 2, 10, 11, 12]
    );
    assert_eq!(session.read_all("v2")?.as_shorts().unwrap(), &[100, 101]);
    let second = session.read_section_str("v", "1,1:2")?;
    assert_eq!(second.as_shorts().unwrap(), &[11, 12]);
    Ok(())
}

#[test]
fn test_streaming_count_uses_stored_stride() -> Result<()> {
    let mut bytes = individually_padded_file();
    bytes[4..8].copy_from_slice(&u32::MAX.to_be_bytes());
    let session = open_bytes("streaming.nc", bytes)?;
    assert_eq!(session.read_all("v2")?.as_shorts().unwrap(), &[100, 101]);
    Ok(())
}

#[test]
fn test_overflowing_dimensions_are_format_error() {
    let header = Header {
        version: Version::Classic,
        numrecs: Some(0),
        dimensions: vec![dim("a", 0x7FFF_FFFF), dim("b", 0x7FFF_FFFF), dim("c", 0x7FFF_FFFF)],
        attributes: Vec::new(),
        variables: vec![var("big", vec![0, 1, 2], DataType::Double, 0)],
    };
    let err = open_bytes("huge.nc", header.encode()).unwrap_err();
    assert!(matches!(err, CdmError::Format(_)), "{:?}", err);
}

#[test]
fn test_record_count_past_offsets_is_format_error() {
    let header = Header {
        version: Version::Classic,
        numrecs: Some(u32::MAX as u64 - 1),
        dimensions: vec![dim("time", 0), dim("x", 0x7FFF_FFFF), dim("y", 0x1000_0000)],
        attributes: Vec::new(),
        variables: vec![var("v", vec![0, 1, 2], DataType::Double, 0)],
    };
    let err = open_bytes("records.nc", header.encode()).unwrap_err();
    assert!(matches!(err, CdmError::Format(_)), "{:?}", err);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_section_outside_shape_is_range_error() {
    let dir = temp_test_dir();
    let (path, _) = write_record_file(dir.path(), DataType::Byte, true, 1, 2);
    let session = open(&path);
    let bad = Section::from_tuples(&[(1, 2, 1), (0, 3, 1)]).unwrap();
    assert!(matches!(session.read("a", &bad), Err(CdmError::Range(_))));
    let bad = Section::from_tuples(&[(0, 1, 1), (1, 2, 2)]).unwrap();
    assert!(matches!(session.read("a", &bad), Err(CdmError::Range(_))));
}

#[test]
fn test_extent_beyond_stored_vsize_is_range_error() {
    let dir = temp_test_dir();
    let (path, _) = write_record_file(dir.path(), DataType::Short, true, 1, 2);

    // Shrink the stored vsize; the header keeps its encoded length.
    let mut bytes = fs::read(&path).unwrap();
    let (mut header, header_len) = parse_header(&bytes).unwrap();
    header.variables[0].vsize = 2;
    let encoded = header.encode();
    assert_eq!(encoded.len(), header_len);
    bytes[..header_len].copy_from_slice(&encoded);
    fs::write(&path, &bytes).unwrap();

    let session = open(&path);
    assert!(matches!(session.read_all("a"), Err(CdmError::Range(_))));
}

#[test]
fn test_truncated_header_is_format_error() {
    let dir = temp_test_dir();
    let (path, _) = write_record_file(dir.path(), DataType::Byte, false, 2, 1);
    let header_len = parse_header(&fs::read(&path).unwrap()).unwrap().1;
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..header_len - 6]).unwrap();

    let err = registry().open_path(&path).unwrap_err();
    assert!(matches!(err, CdmError::Format(_)), "{:?}", err);
}

#[test]
fn test_non_classic_file_not_claimed() {
    let dir = temp_test_dir();
    let path = dir.path().join("hdf.nc");
    fs::write(&path, b"\x89HDF\r\n\x1a\n0000000000").unwrap();
    let err = registry().open_path(&path).unwrap_err();
    assert!(matches!(err, CdmError::Unsupported(_)));
}

#[test]
fn test_writer_rejects_late_definitions() {
    let dir = temp_test_dir();
    let mut w = Netcdf3Writer::create(dir.path().join("late.nc")).unwrap();
    w.add_dimension("n", 2).unwrap();
    assert!(w.add_dimension("n", 3).is_err());
    assert!(w.add_variable("v", DataType::UShort, "n").is_err());
    w.end_define().unwrap();
    assert!(w.add_variable("v", DataType::Int, "n").is_err());
}

#[test]
fn test_rejected_write_leaves_records_alone() {
    let dir = temp_test_dir();
    let path = dir.path().join("rejected.nc");
    let mut w = Netcdf3Writer::create(&path).unwrap();
    w.add_unlimited_dimension("time").unwrap();
    w.add_dimension("len", 3).unwrap();
    w.add_variable("a", DataType::Short, "time len").unwrap();
    w.end_define().unwrap();
    let file_len = fs::metadata(&path).unwrap().len();

    // Runs past `len` while asking for two new records.
    let array = Array::new(vec![2, 3], sample(DataType::Short, 6, 0)).unwrap();
    assert!(w.write("a", &[0, 2], &array).is_err());
    assert_eq!(w.numrecs(), 0);
    assert_eq!(fs::metadata(&path).unwrap().len(), file_len);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_disjoint_reads() {
    let dir = temp_test_dir();
    let (path, written) = write_record_file(dir.path(), DataType::Short, true, 2, 40);
    let session = open(&path);
    let expected = written[0].as_shorts().unwrap().to_vec();

    let requests: Vec<(&str, Section)> = (0..40)
        .map(|rec| ("a", Section::from_tuples(&[(rec, 1, 1), (0, 3, 1)]).unwrap()))
        .collect();
    let results = session.read_many(&requests);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let session = &session;
                scope.spawn(move || {
                    let section = Section::from_tuples(&[(t * 10, 10, 1), (0, 3, 1)]).unwrap();
                    session.read("a", &section).unwrap()
                })
            })
            .collect();
        for (t, h) in handles.into_iter().enumerate() {
            let got = h.join().unwrap();
            assert_eq!(got.as_shorts().unwrap(), &expected[t * 30..(t + 1) * 30]);
        }
    });

    for (rec, result) in results.into_iter().enumerate() {
        assert_eq!(
            result.unwrap().as_shorts().unwrap(),
            &expected[rec * 3..rec * 3 + 3]
        );
    }
}
