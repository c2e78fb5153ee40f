use approx::assert_abs_diff_eq;
use gacsic::core::{
    AngleBinPolicy, AngleBins, AngleCoefficients, BayesianClassifier, ClassifierParams, CoefficientTable, MaskedGrid,
    SurfaceBands, ThermalConvention, ANGLE_BIN_COUNT,
};
use gacsic::types::{Feature, SicError, SurfaceClass, PROBABILITY_UNDEFINED};
use ndarray::{array, Array2};

fn constant(mean: f32, std: f32) -> AngleCoefficients {
    let rows: Vec<[f32; 3]> = (0..ANGLE_BIN_COUNT).map(|i| [i as f32, mean, std]).collect();
    AngleCoefficients::from_rows(&rows).unwrap()
}

fn per_class(feature: Feature, ice: (f32, f32), water: (f32, f32), cloud: (f32, f32)) -> Vec<(Feature, SurfaceClass, AngleCoefficients)> {
    vec![
        (feature, SurfaceClass::Ice, constant(ice.0, ice.1)),
        (feature, SurfaceClass::Water, constant(water.0, water.1)),
        (feature, SurfaceClass::Cloud, constant(cloud.0, cloud.1)),
    ]
}

fn daylight(dim: (usize, usize)) -> AngleBins {
    AngleBins::from_zenith(
        &MaskedGrid::from_data(Array2::from_elem(dim, 60.0f32)),
        AngleBinPolicy::default(),
    )
}

fn informative_table() -> CoefficientTable {
    let mut entries = per_class(Feature::Ratio09Over06, (0.9, 0.05), (0.6, 0.1), (1.0, 0.1));
    entries.extend(per_class(Feature::Reflectance06, (60.0, 10.0), (5.0, 3.0), (70.0, 15.0)));
    CoefficientTable::from_entries(entries).unwrap()
}

/// VAR1 and VAR2 carry no information, so the third feature decides
fn third_feature_table() -> CoefficientTable {
    let mut entries = per_class(Feature::Ratio09Over06, (0.9, 0.1), (0.9, 0.1), (0.9, 0.1));
    entries.extend(per_class(Feature::Reflectance06, (50.0, 10.0), (50.0, 10.0), (50.0, 10.0)));
    entries.extend(per_class(Feature::Ratio16Over06, (0.1, 0.05), (0.9, 0.05), (0.5, 0.05)));
    entries.extend(per_class(Feature::Ratio37Over06, (0.02, 0.05), (0.6, 0.05), (0.9, 0.05)));
    CoefficientTable::from_entries(entries).unwrap()
}

#[test]
fn test_probabilities_normalised() {
    let _ = env_logger::builder().is_test(true).try_init();

    let vis06 = MaskedGrid::from_data(Array2::from_shape_fn((4, 5), |(i, j)| 5.0 + 4.0 * (i * 5 + j) as f32));
    let vis09 = vis06.map(|v| 0.85 * v);
    let bands = SurfaceBands::new(vis06, vis09).unwrap();

    let result = BayesianClassifier::standard()
        .classify(&bands, &daylight((4, 5)), &informative_table())
        .unwrap();

    for i in 0..4 {
        for j in 0..5 {
            let (pi, pw, pc) = (
                result.ice.get((i, j)).unwrap(),
                result.water.get((i, j)).unwrap(),
                result.cloud.get((i, j)).unwrap(),
            );
            for p in [pi, pw, pc] {
                assert!((0.0..=1.0).contains(&p));
            }
            assert_abs_diff_eq!(pi + pw + pc, 1.0, epsilon = 1e-5);
        }
    }
}

#[test]
fn test_undefined_sentinel_in_all_three() {
    let vis06 = MaskedGrid::new(
        array![[f32::NAN, 50.0, 60.0]],
        array![[true, true, false]],
    )
    .unwrap();
    let vis09 = MaskedGrid::from_data(array![[45.0f32, 45.0, 54.0]]);
    let bands = SurfaceBands::new(vis06, vis09).unwrap();

    let result = BayesianClassifier::standard()
        .classify(&bands, &daylight((1, 3)), &informative_table())
        .unwrap();

    // no usable 0.6um sample: sentinel everywhere, never a probability
    assert!(result.quality_failed[[0, 0]]);
    assert_eq!(result.ice.get((0, 0)), Some(PROBABILITY_UNDEFINED));
    assert_eq!(result.water.get((0, 0)), Some(PROBABILITY_UNDEFINED));
    assert_eq!(result.cloud.get((0, 0)), Some(PROBABILITY_UNDEFINED));

    // the hidden payload of an invalid 0.6um sample does not matter
    assert!(result.quality_failed[[0, 1]]);
    assert_eq!(result.ice.get((0, 1)), Some(PROBABILITY_UNDEFINED));
    assert_eq!(result.water.get((0, 1)), Some(PROBABILITY_UNDEFINED));
    assert_eq!(result.cloud.get((0, 1)), Some(PROBABILITY_UNDEFINED));

    assert!(!result.quality_failed[[0, 2]]);
    let sum = result.ice.get((0, 2)).unwrap() + result.water.get((0, 2)).unwrap() + result.cloud.get((0, 2)).unwrap();
    assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-5);
    assert_eq!(result.undefined_count(), 2);
}

#[test]
fn test_invalid_06_gives_sentinel_for_any_payload() {
    let vis06 = MaskedGrid::new(array![[f32::NAN, 0.0, 50.0]], array![[true, true, true]]).unwrap();
    let vis09 = MaskedGrid::from_data(array![[45.0f32, 45.0, 45.0]]);
    let bands = SurfaceBands::new(vis06, vis09).unwrap();

    let result = BayesianClassifier::standard()
        .classify(&bands, &daylight((1, 3)), &informative_table())
        .unwrap();

    assert_eq!(result.quality_failed, array![[true, true, true]]);
    for j in 0..3 {
        assert_eq!(result.ice.get((0, j)), Some(PROBABILITY_UNDEFINED));
        assert_eq!(result.water.get((0, j)), Some(PROBABILITY_UNDEFINED));
        assert_eq!(result.cloud.get((0, j)), Some(PROBABILITY_UNDEFINED));
    }
}

#[test]
fn test_negative_fill_values_are_invalid() {
    let vis06 = MaskedGrid::from_data(array![[-1.0f32, 60.0]]);
    let vis09 = MaskedGrid::from_data(array![[-0.9f32, -0.5]]);
    let bands = SurfaceBands::new(vis06, vis09).unwrap();

    let result = BayesianClassifier::standard()
        .classify(&bands, &daylight((1, 2)), &informative_table())
        .unwrap();

    // negative 0.6um: sentinel; negative 0.9um only: invalid
    assert_eq!(result.ice.get((0, 0)), Some(PROBABILITY_UNDEFINED));
    assert!(result.ice.is_masked((0, 1)));
    assert!(result.water.is_masked((0, 1)));
    assert!(result.cloud.is_masked((0, 1)));
}

#[test]
fn test_ratio16_has_priority_over_thermal() {
    let vis06 = MaskedGrid::from_data(array![[50.0f32, 50.0]]);
    let vis09 = MaskedGrid::from_data(array![[45.0f32, 45.0]]);
    let vis16 = MaskedGrid::new(array![[25.0f32, 25.0]], array![[false, true]]).unwrap();
    let tb37 = MaskedGrid::from_data(array![[260.0f32, 260.0]]);
    let tb11 = MaskedGrid::from_data(array![[255.0f32, 255.0]]);
    let bands = SurfaceBands::new(vis06, vis09)
        .unwrap()
        .with_vis16(vis16)
        .unwrap()
        .with_thermal(tb37, tb11)
        .unwrap();

    let result = BayesianClassifier::standard()
        .classify(&bands, &daylight((1, 2)), &third_feature_table())
        .unwrap();

    assert!(result.gates.ratio16[[0, 0]]);
    assert!(!result.gates.thermal[[0, 0]]);
    assert!(result.gates.thermal[[0, 1]]);

    // 1.6um ratio of 0.5 points to cloud
    assert!(result.cloud.get((0, 0)).unwrap() > 0.9);
    // 3.7um proxy of a cold, dim surface points to ice
    assert!(result.ice.get((0, 1)).unwrap() > 0.9);
}

#[test]
fn test_thermal_class_mapping() {
    let bands = SurfaceBands::new(
        MaskedGrid::from_data(array![[50.0f32]]),
        MaskedGrid::from_data(array![[45.0f32]]),
    )
    .unwrap()
    .with_thermal(
        MaskedGrid::from_data(array![[260.0f32]]),
        MaskedGrid::from_data(array![[255.0f32]]),
    )
    .unwrap();

    let corrected = BayesianClassifier::standard()
        .classify(&bands, &daylight((1, 1)), &third_feature_table())
        .unwrap();
    assert!(corrected.gates.thermal[[0, 0]]);
    assert!(corrected.ice.get((0, 0)).unwrap() > 0.9);

    // historical products score water against the ice coefficients
    let params = ClassifierParams {
        thermal_convention: ThermalConvention::Reference,
        ..ClassifierParams::default()
    };
    let reference = BayesianClassifier::new(params)
        .classify(&bands, &daylight((1, 1)), &third_feature_table())
        .unwrap();
    assert!(reference.water.get((0, 0)).unwrap() > 0.9);
    assert!(reference.ice.get((0, 0)).unwrap() < 0.05);
}

#[test]
fn test_stage_a_without_third_feature() {
    let bands = SurfaceBands::new(
        MaskedGrid::from_data(array![[50.0f32]]),
        MaskedGrid::from_data(array![[45.0f32]]),
    )
    .unwrap();

    let result = BayesianClassifier::standard()
        .classify(&bands, &daylight((1, 1)), &third_feature_table())
        .unwrap();

    // uninformative VAR1 and VAR2 give equal odds
    for p in [&result.ice, &result.water, &result.cloud] {
        assert_abs_diff_eq!(p.get((0, 0)).unwrap(), 1.0 / 3.0, epsilon = 1e-5);
    }
}

#[test]
fn test_missing_third_feature_coefficients() {
    let bands = SurfaceBands::new(
        MaskedGrid::from_data(array![[50.0f32]]),
        MaskedGrid::from_data(array![[45.0f32]]),
    )
    .unwrap()
    .with_vis16(MaskedGrid::from_data(array![[25.0f32]]))
    .unwrap();

    let err = BayesianClassifier::standard()
        .classify(&bands, &daylight((1, 1)), &informative_table())
        .unwrap_err();
    assert!(matches!(err, SicError::InvalidCoefficients(_)));
}

#[test]
fn test_band_shape_mismatch() {
    let result = SurfaceBands::new(
        MaskedGrid::from_data(Array2::<f32>::zeros((2, 2))),
        MaskedGrid::from_data(Array2::<f32>::zeros((2, 3))),
    );
    assert!(matches!(result, Err(SicError::DimensionMismatch { .. })));
}
