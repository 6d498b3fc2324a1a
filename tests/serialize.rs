#![cfg(feature = "serde")]

use nalgebra::Point3;
use splinevol::prelude::*;

#[test]
fn test_serialization() {
    let samples = SampleGrid::try_from_fn([4, 3, 5], |i, j, k| {
        Point3::new(i as f64, j as f64 + 0.1 * k as f64, k as f64 * 0.5)
    })
    .unwrap();
    let options = VolumeFitOptions::default()
        .with_orders([3, 2, 4])
        .with_knot_style(KnotStyle::Centripetal);
    let volume = NurbsVolume::try_fit(samples, &options).unwrap();

    let json = serde_json::to_string_pretty(&volume).unwrap();
    let restored: NurbsVolume<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, volume);
    assert_eq!(restored.original_data().unwrap().options(), &options);
}

#[test]
fn test_deserialization_validates_input() {
    let samples = SampleGrid::try_from_fn([3, 3, 3], |i, j, k| {
        Point3::new(i as f64, j as f64, k as f64)
    })
    .unwrap();
    let options = VolumeFitOptions::default().with_orders([3, 3, 3]);
    let volume = NurbsVolume::try_fit(samples, &options).unwrap();
    let value = serde_json::to_value(&volume).unwrap();
    assert!(serde_json::from_value::<NurbsVolume<f64>>(value.clone()).is_ok());

    // lattice shape no longer matches its points
    let mut shape = value.clone();
    shape["control_points"]["shape"][0] = serde_json::json!(4);
    assert!(serde_json::from_value::<NurbsVolume<f64>>(shape).is_err());

    // one knot short in u
    let mut knots = value.clone();
    knots["knots"][0].as_array_mut().unwrap().pop();
    assert!(serde_json::from_value::<NurbsVolume<f64>>(knots).is_err());

    // degree inconsistent with the knot vector
    let mut degrees = value.clone();
    degrees["degrees"][2] = serde_json::json!(1);
    assert!(serde_json::from_value::<NurbsVolume<f64>>(degrees).is_err());

    // retained sample parameters no longer match the samples
    let mut parameters = value.clone();
    parameters["original"]["parameters"][1]
        .as_array_mut()
        .unwrap()
        .pop();
    assert!(serde_json::from_value::<NurbsVolume<f64>>(parameters).is_err());

    // sample grids need two samples per direction
    let grid = serde_json::json!({ "shape": [1, 1, 1], "points": [[0., 0., 0.]] });
    assert!(serde_json::from_value::<SampleGrid<f64>>(grid).is_err());
    let lattice = serde_json::json!({ "shape": [1, 1, 1], "points": [[0., 0., 0.]] });
    assert!(serde_json::from_value::<ControlLattice<f64>>(lattice).is_ok());
}

#[test]
fn test_options_serialization() {
    let options = ProjectionOptions::<f64>::default()
        .with_max_seeds(4)
        .with_seed_divisions([8, 8, 8]);
    let json = serde_json::to_string(&options).unwrap();
    let restored: ProjectionOptions<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, options);
}
