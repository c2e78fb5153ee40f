use approx::assert_relative_eq;
use gacsic::core::{AngleBinPolicy, AngleBins, AngleCoefficients, MaskedGrid, SicEstimator, ANGLE_BIN_COUNT};
use gacsic::types::SicError;
use ndarray::{array, Array2};

const ICE: u8 = 4;

fn tie_points(mean: f32, std: f32) -> AngleCoefficients {
    let rows: Vec<[f32; 3]> = (0..ANGLE_BIN_COUNT).map(|i| [i as f32, mean, std]).collect();
    AngleCoefficients::from_rows(&rows).unwrap()
}

fn angles(zenith: Array2<f32>) -> AngleBins {
    AngleBins::from_zenith(&MaskedGrid::from_data(zenith), AngleBinPolicy::default())
}

fn estimate_row(reflectance: Array2<f32>, codes: Array2<u8>, coeffs: &AngleCoefficients) -> MaskedGrid<f32> {
    let dim = reflectance.dim();
    SicEstimator::standard()
        .estimate(
            &MaskedGrid::from_data(reflectance),
            &MaskedGrid::from_data(codes),
            coeffs,
            &angles(Array2::from_elem(dim, 60.0)),
        )
        .unwrap()
        .concentration
}

#[test]
fn test_reference_pixel() {
    let _ = env_logger::builder().is_test(true).try_init();

    let sic = estimate_row(array![[50.0f32]], array![[ICE]], &tie_points(60.0, 6.0));
    assert_relative_eq!(sic.get((0, 0)).unwrap(), 87.719_3, epsilon = 1e-3);

    // clear pixel at 45 degrees
    let estimate = SicEstimator::standard()
        .estimate(
            &MaskedGrid::from_data(array![[50.0f32]]),
            &MaskedGrid::from_data(array![[1u8]]),
            &tie_points(60.0, 6.0),
            &angles(array![[45.0f32]]),
        )
        .unwrap();
    assert_relative_eq!(estimate.concentration.get((0, 0)).unwrap(), 87.719_3, epsilon = 1e-3);
    assert!(!estimate.forced_water[[0, 0]]);
}

#[test]
fn test_dark_pixels_are_open_water() {
    let sic = estimate_row(array![[2.0f32, 3.0]], array![[ICE, ICE]], &tie_points(60.0, 6.0));
    assert_eq!(sic.get((0, 0)), Some(0.0));
    assert_eq!(sic.get((0, 1)), Some(0.0));
}

#[test]
fn test_bright_pixels_clamped() {
    let sic = estimate_row(array![[70.0f32, 99.0]], array![[ICE, ICE]], &tie_points(60.0, 6.0));
    assert_eq!(sic.get((0, 0)), Some(100.0));
    assert_eq!(sic.get((0, 1)), Some(100.0));
}

#[test]
fn test_concentration_monotonic_in_reflectance() {
    let reflectance = Array2::from_shape_fn((1, 40), |(_, j)| 1.0 + 1.5 * j as f32);
    let codes = Array2::from_elem((1, 40), ICE);
    let sic = estimate_row(reflectance, codes, &tie_points(60.0, 6.0));

    let values: Vec<f32> = sic.valid_values().collect();
    assert_eq!(values.len(), 40);
    for pair in values.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
    assert!(values.iter().all(|&v| (0.0..=100.0).contains(&v)));
}

#[test]
fn test_water_threshold_boundary() {
    // ambiguous range is empty for a small std, so the step is visible
    let sic = estimate_row(array![[3.0f32, 3.001]], array![[ICE, ICE]], &tie_points(60.0, 1.0));
    assert_eq!(sic.get((0, 0)), Some(0.0));
    assert!(sic.get((0, 1)).unwrap() > 0.0);
}

#[test]
fn test_invalid_flags_accumulate() {
    let reflectance = MaskedGrid::new(
        array![[40.0f32, 40.0, 40.0, 40.0, 40.0]],
        array![[true, false, false, false, false]],
    )
    .unwrap();
    let codes = MaskedGrid::new(
        array![[ICE, ICE, 2, ICE, ICE]],
        array![[false, true, false, false, false]],
    )
    .unwrap();
    let zenith = angles(array![[60.0f32, 60.0, 60.0, 89.5, f32::NAN]]);

    let estimate = SicEstimator::standard()
        .estimate(&reflectance, &codes, &tie_points(60.0, 6.0), &zenith)
        .unwrap();

    // every input flag survives
    for j in 0..2 {
        assert!(estimate.concentration.is_masked((0, j)));
    }
    // cloud code 2 is excluded
    assert!(estimate.exclusion[[0, 2]]);
    assert!(estimate.concentration.is_masked((0, 2)));
    // 89.5 truncates to 89, still usable
    assert!(!estimate.concentration.is_masked((0, 3)));
    // NaN zenith has no bin
    assert!(estimate.concentration.is_masked((0, 4)));
    assert_eq!(estimate.valid_count(), 1);
}

#[test]
fn test_zero_and_nan_tie_points_masked() {
    let mut rows: Vec<[f32; 3]> = (0..ANGLE_BIN_COUNT).map(|i| [i as f32, 60.0, 6.0]).collect();
    rows[10] = [10.0, 0.0, 0.0];
    rows[20] = [20.0, f32::NAN, 6.0];
    let coeffs = AngleCoefficients::from_rows(&rows).unwrap();

    let estimate = SicEstimator::standard()
        .estimate(
            &MaskedGrid::from_data(array![[40.0f32, 40.0, 40.0]]),
            &MaskedGrid::from_data(array![[ICE, ICE, ICE]]),
            &coeffs,
            &angles(array![[10.2f32, 20.9, 30.0]]),
        )
        .unwrap();

    assert!(estimate.missing_tie_points[[0, 0]]);
    assert!(estimate.missing_tie_points[[0, 1]]);
    assert!(estimate.concentration.is_masked((0, 0)));
    assert!(estimate.concentration.is_masked((0, 1)));
    assert!(estimate.concentration.get((0, 2)).is_some());
}

#[test]
fn test_fully_invalid_input_is_not_an_error() {
    let reflectance = MaskedGrid::fully_masked(Array2::from_elem((3, 3), 40.0f32));
    let estimate = SicEstimator::standard()
        .estimate(
            &reflectance,
            &MaskedGrid::from_data(Array2::from_elem((3, 3), ICE)),
            &tie_points(60.0, 6.0),
            &angles(Array2::from_elem((3, 3), 50.0)),
        )
        .unwrap();
    assert!(estimate.concentration.all_masked());
}

#[test]
fn test_shape_mismatch() {
    let result = SicEstimator::standard().estimate(
        &MaskedGrid::from_data(Array2::from_elem((3, 3), 40.0f32)),
        &MaskedGrid::from_data(Array2::from_elem((3, 4), ICE)),
        &tie_points(60.0, 6.0),
        &angles(Array2::from_elem((3, 3), 50.0)),
    );
    assert!(matches!(result, Err(SicError::DimensionMismatch { .. })));
}
