//! Tests for model construction, freezing and unlimited growth.

use std::sync::Arc;
use std::thread;

use cdm_common::{
    Attribute, CdmError, DataType, Dimension, GroupId, ModelBuilder, Section,
};

fn record_model() -> cdm_common::CdmModel {
    let mut b = ModelBuilder::new();
    b.add_dimension(GroupId::ROOT, Dimension::unlimited("time", 2).unwrap())
        .unwrap();
    b.add_dimension(GroupId::ROOT, Dimension::new("x", 3).unwrap())
        .unwrap();
    let v = b
        .new_variable(GroupId::ROOT, "temp", DataType::Short, "time x")
        .unwrap()
        .with_attribute(Attribute::new("units", "K"));
    b.add_variable(GroupId::ROOT, v).unwrap();
    b.add_attribute(GroupId::ROOT, Attribute::new("Conventions", "CF-1.0"))
        .unwrap();
    b.freeze()
}

#[test]
fn test_frozen_queries() {
    let model = record_model();
    let v = model.find_variable("temp").unwrap();
    assert_eq!(v.shape(), vec![2, 3]);
    assert_eq!(v.dimensions_string(), "time x");
    assert_eq!(
        model
            .find_global_attribute("Conventions")
            .and_then(|a| a.as_text()),
        Some("CF-1.0")
    );
    assert_eq!(model.unlimited_dimension().and_then(|d| d.name()), Some("time"));
}

#[test]
fn test_grow_unlimited_visible_to_variables() {
    let model = record_model();
    model.grow_unlimited("time", 5).unwrap();
    let v = model.find_variable("temp").unwrap();
    assert_eq!(v.shape(), vec![5, 3]);
    assert!(Section::full(&v.shape()).validate(&[5, 3]).is_ok());
}

#[test]
fn test_grow_unlimited_never_shrinks() {
    let model = record_model();
    assert!(matches!(
        model.grow_unlimited("time", 1),
        Err(CdmError::Range(_))
    ));
    assert!(matches!(
        model.grow_unlimited("x", 9),
        Err(CdmError::Frozen(_))
    ));
    assert!(model.grow_unlimited("nope", 9).is_err());
}

#[test]
fn test_growth_seen_across_threads() {
    let model = Arc::new(record_model());
    let grower = {
        let model = Arc::clone(&model);
        thread::spawn(move || model.grow_unlimited("time", 10))
    };
    grower.join().unwrap().unwrap();
    assert_eq!(model.find_variable("temp").unwrap().shape()[0], 10);
}

#[test]
fn test_variable_with_undefined_shared_dimension() {
    let mut b = ModelBuilder::new();
    let stray = Dimension::new("y", 4).unwrap();
    let v = cdm_common::Variable::new("v", DataType::Int, vec![stray]);
    assert!(matches!(
        b.add_variable(GroupId::ROOT, v),
        Err(CdmError::Schema(_))
    ));
}

#[test]
fn test_variable_dimension_conflict() {
    let mut b = ModelBuilder::new();
    b.add_dimension(GroupId::ROOT, Dimension::new("y", 4).unwrap())
        .unwrap();
    let v = cdm_common::Variable::new("v", DataType::Int, vec![Dimension::new("y", 5).unwrap()]);
    assert!(matches!(
        b.add_variable(GroupId::ROOT, v),
        Err(CdmError::Schema(_))
    ));
}
