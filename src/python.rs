//! Python bindings for the NumPy-based processing driver

use crate::core::{
    AngleBinPolicy, AngleBins, AngleCoefficients, BayesianClassifier, ClassifierParams, CleanupParams,
    CloudMaskCleaner, CoefficientTable, MaskedGrid, SicEstimator, ThermalConvention, FILL_VALUE,
};
use crate::core::classifier::SurfaceBands;
use crate::types::{Feature, SurfaceClass};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(clean_cloudmask, m)?)?;
    m.add_function(wrap_pyfunction!(compute_sic, m)?)?;
    m.add_function(wrap_pyfunction!(classify_surface, m)?)?;
    Ok(())
}

fn runtime_error<E: std::fmt::Display>(e: E) -> PyErr {
    PyErr::new::<PyRuntimeError, _>(format!("{}", e))
}

/// NaN marks an invalid sample on the Python side
fn masked_nan(array: PyReadonlyArray2<f32>) -> MaskedGrid<f32> {
    MaskedGrid::from_data_where(array.as_array().to_owned(), |v| v.is_nan())
}

/// Reset large clear-water blobs north of `latitude_threshold` to "not processed"
#[pyfunction]
#[pyo3(signature = (cloudmask, latitude, latitude_threshold = 80.0, max_component_size = 10))]
fn clean_cloudmask<'py>(
    py: Python<'py>,
    cloudmask: PyReadonlyArray2<u8>,
    latitude: PyReadonlyArray2<f32>,
    latitude_threshold: f32,
    max_component_size: usize,
) -> PyResult<&'py PyArray2<u8>> {
    let params = CleanupParams {
        latitude_threshold,
        max_component_size,
        ..CleanupParams::default()
    };
    params.validate().map_err(runtime_error)?;

    let codes = MaskedGrid::from_data(cloudmask.as_array().to_owned());
    let cleaned = CloudMaskCleaner::new(params)
        .clean(&codes, &masked_nan(latitude))
        .map_err(runtime_error)?;
    Ok(cleaned.data().clone().into_pyarray(py))
}

/// Sea-ice concentration from 0.9 µm reflectance.
///
/// `coefficients` is the 91 x 3 `(angle, mean, std)` ice tie-point table.
/// Returns the concentration with invalid pixels set to the fill value, and
/// the invalid flags.
#[pyfunction]
fn compute_sic<'py>(
    py: Python<'py>,
    reflectance: PyReadonlyArray2<f32>,
    cloudmask: PyReadonlyArray2<u8>,
    solar_zenith: PyReadonlyArray2<f32>,
    coefficients: PyReadonlyArray2<f32>,
) -> PyResult<(&'py PyArray2<f32>, &'py PyArray2<bool>)> {
    let tie_points = AngleCoefficients::from_array(&coefficients.as_array().to_owned()).map_err(runtime_error)?;
    let angles = AngleBins::from_zenith(&masked_nan(solar_zenith), AngleBinPolicy::default());
    let codes = MaskedGrid::from_data(cloudmask.as_array().to_owned());

    let estimate = SicEstimator::standard()
        .estimate(&masked_nan(reflectance), &codes, &tie_points, &angles)
        .map_err(runtime_error)?;

    let filled = estimate.concentration.filled(FILL_VALUE);
    let (_, mask) = estimate.concentration.into_parts();
    Ok((filled.into_pyarray(py), mask.into_pyarray(py)))
}

/// Ice, water and cloud probabilities.
///
/// `coefficients` maps `(feature, class)` tuples such as `("re09/re06", "ice")`
/// to 91 x 3 tie-point tables. Invalid pixels are NaN, quality failures -999.
#[pyfunction]
#[pyo3(signature = (vis06, vis09, solar_zenith, coefficients, vis16 = None, tb37 = None, tb11 = None, day_of_year = 213, use_channel06 = true, thermal_convention = "corrected"))]
#[allow(clippy::too_many_arguments)]
fn classify_surface<'py>(
    py: Python<'py>,
    vis06: PyReadonlyArray2<f32>,
    vis09: PyReadonlyArray2<f32>,
    solar_zenith: PyReadonlyArray2<f32>,
    coefficients: &PyDict,
    vis16: Option<PyReadonlyArray2<f32>>,
    tb37: Option<PyReadonlyArray2<f32>>,
    tb11: Option<PyReadonlyArray2<f32>>,
    day_of_year: u32,
    use_channel06: bool,
    thermal_convention: &str,
) -> PyResult<(&'py PyArray2<f32>, &'py PyArray2<f32>, &'py PyArray2<f32>)> {
    let mut entries = Vec::with_capacity(coefficients.len());
    for (key, value) in coefficients.iter() {
        let (feature_name, class_name): (String, String) = key.extract()?;
        let feature = Feature::from_table_name(&feature_name)
            .ok_or_else(|| PyErr::new::<PyValueError, _>(format!("Unknown feature: {}", feature_name)))?;
        let class = SurfaceClass::from_name(&class_name)
            .ok_or_else(|| PyErr::new::<PyValueError, _>(format!("Unknown surface class: {}", class_name)))?;
        let table: PyReadonlyArray2<f32> = value.extract()?;
        let coeffs = AngleCoefficients::from_array(&table.as_array().to_owned()).map_err(runtime_error)?;
        entries.push((feature, class, coeffs));
    }
    let table = CoefficientTable::from_entries(entries).map_err(runtime_error)?;

    let mut bands = SurfaceBands::new(masked_nan(vis06), masked_nan(vis09)).map_err(runtime_error)?;
    if let Some(vis16) = vis16 {
        bands = bands.with_vis16(masked_nan(vis16)).map_err(runtime_error)?;
    }
    match (tb37, tb11) {
        (Some(tb37), Some(tb11)) => {
            bands = bands
                .with_thermal(masked_nan(tb37), masked_nan(tb11))
                .map_err(runtime_error)?;
        }
        (None, None) => {}
        _ => {
            return Err(PyErr::new::<PyValueError, _>(
                "tb37 and tb11 must be given together".to_string(),
            ))
        }
    }

    let thermal_convention = match thermal_convention {
        "corrected" => ThermalConvention::Corrected,
        "reference" => ThermalConvention::Reference,
        other => {
            return Err(PyErr::new::<PyValueError, _>(format!(
                "Invalid thermal convention: {}",
                other
            )))
        }
    };
    let params = ClassifierParams {
        day_of_year,
        use_channel06,
        thermal_convention,
        ..ClassifierParams::default()
    };
    let angles = AngleBins::from_zenith(&masked_nan(solar_zenith), AngleBinPolicy::default());
    let result = BayesianClassifier::new(params)
        .classify(&bands, &angles, &table)
        .map_err(runtime_error)?;

    Ok((
        result.ice.filled(f32::NAN).into_pyarray(py),
        result.water.filled(f32::NAN).into_pyarray(py),
        result.cloud.filled(f32::NAN).into_pyarray(py),
    ))
}
