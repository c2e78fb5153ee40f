use crate::core::angles::AngleBins;
use crate::core::coefficients::{invalid_coefficients, AngleCoefficients};
use crate::core::masked::MaskedGrid;
use crate::types::{ensure_shape, CloudClass, SicError, SicResult};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Sea-ice concentration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SicParams {
    /// Reflectance (percent) at or below which a pixel is open water
    pub water_threshold: f32,
    /// Extra reflectance margin under which clear pixels are forced to water
    pub clear_water_margin: f32,
    /// Largest truncated solar zenith (degrees) still usable
    pub max_solar_zenith: i32,
    /// Upper clamp of the concentration (percent)
    pub max_concentration: f32,
    /// Ice std is replaced by `mean / std_divisor` when it reaches the mean
    pub std_divisor: f32,
}

impl Default for SicParams {
    fn default() -> Self {
        Self {
            water_threshold: 3.0,    // water reflects roughly 3 percent
            clear_water_margin: 2.0,
            max_solar_zenith: 89,
            max_concentration: 100.0,
            std_divisor: 3.0,
        }
    }
}

impl SicParams {
    pub fn validate(&self) -> SicResult<()> {
        if !self.water_threshold.is_finite() || self.water_threshold < 0.0 {
            return Err(SicError::InvalidParameter(format!(
                "water threshold must be a non-negative reflectance, got {}",
                self.water_threshold
            )));
        }
        if !self.clear_water_margin.is_finite() || self.clear_water_margin < 0.0 {
            return Err(SicError::InvalidParameter(format!(
                "clear water margin must be non-negative, got {}",
                self.clear_water_margin
            )));
        }
        if !(self.max_concentration > 0.0) {
            return Err(SicError::InvalidParameter(format!(
                "max concentration must be positive, got {}",
                self.max_concentration
            )));
        }
        if !(self.std_divisor > 0.0) {
            return Err(SicError::InvalidParameter(format!(
                "std divisor must be positive, got {}",
                self.std_divisor
            )));
        }
        Ok(())
    }
}

/// Outcome for a single pixel before input masks are applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelConcentration {
    pub concentration: f32,
    /// One of the exclusion rules rejected the pixel
    pub excluded: bool,
    /// Clear pixel dark enough to be forced to open water
    pub forced_water: bool,
}

/// Concentration estimate with the reasons behind its invalid flags
#[derive(Debug, Clone)]
pub struct SicEstimate {
    /// Concentration in percent
    pub concentration: MaskedGrid<f32>,
    /// Pixels rejected by the cloud, sun-angle or ambiguity rules
    pub exclusion: Array2<bool>,
    /// Clear pixels forced to zero concentration
    pub forced_water: Array2<bool>,
    /// Pixels whose ice tie points were missing or non-finite
    pub missing_tie_points: Array2<bool>,
}

impl SicEstimate {
    pub fn valid_count(&self) -> usize {
        self.concentration.valid_count()
    }
}

/// Reflectance-ratio sea-ice concentration estimator.
///
/// The concentration is the reflectance normalised by a low-ice tie point
/// half a standard deviation below the mean ice reflectance of the pixel's
/// solar zenith bin.
pub struct SicEstimator {
    params: SicParams,
}

impl SicEstimator {
    pub fn new(params: SicParams) -> Self {
        Self { params }
    }

    /// Estimator with the operational constants
    pub fn standard() -> Self {
        Self::new(SicParams::default())
    }

    pub fn params(&self) -> &SicParams {
        &self.params
    }

    /// Concentration of a single pixel from its reflectance (percent), cloud
    /// class, ice tie point and truncated solar zenith.
    pub fn pixel_concentration(
        &self,
        reflectance: f32,
        class: CloudClass,
        ice_mean: f32,
        ice_std: f32,
        solar_zenith: i32,
    ) -> PixelConcentration {
        let p = &self.params;
        let ice_std = if ice_std >= ice_mean {
            ice_mean / p.std_divisor
        } else {
            ice_std
        };

        let ambiguous = reflectance > p.water_threshold && reflectance < ice_std / 2.0;
        let excluded = class.excludes_sic() || solar_zenith > p.max_solar_zenith || ambiguous;
        let forced_water =
            class == CloudClass::Clear && reflectance < p.water_threshold + p.clear_water_margin;

        let mut concentration = 100.0 * reflectance / (ice_mean - ice_std / 2.0);
        if concentration > p.max_concentration {
            concentration = p.max_concentration;
        }
        if reflectance <= p.water_threshold || forced_water {
            concentration = 0.0;
        }

        PixelConcentration {
            concentration,
            excluded,
            forced_water,
        }
    }

    /// Estimate concentration for a whole pass.
    ///
    /// A pixel is invalid when the reflectance, cloud code or angle bin is
    /// invalid, when its ice tie point is missing, or when an exclusion rule
    /// applies. Invalid flags are only ever added.
    pub fn estimate(
        &self,
        reflectance: &MaskedGrid<f32>,
        cloudmask: &MaskedGrid<u8>,
        ice_tie_points: &AngleCoefficients,
        angles: &AngleBins,
    ) -> SicResult<SicEstimate> {
        let dim = reflectance.dim();
        ensure_shape("sic estimate (cloud mask)", dim, cloudmask.dim())?;
        ensure_shape("sic estimate (solar zenith)", dim, angles.dim())?;

        log::info!("Estimating sea-ice concentration for {}x{} pixels", dim.0, dim.1);
        log::debug!("SIC parameters: {:?}", self.params);

        let reflectance = reflectance.fix_invalid();
        let ice = ice_tie_points.gather(angles.bins());
        let missing_tie_points = invalid_coefficients(&ice);

        let pixels = self.compute_pixels(
            reflectance.data(),
            cloudmask.data(),
            &ice.mean,
            &ice.std,
            angles.zenith().data(),
        );

        let concentration = pixels.map(|p| p.concentration);
        let exclusion = pixels.map(|p| p.excluded);
        let forced_water = pixels.map(|p| p.forced_water);

        let mut mask = Zip::from(reflectance.mask())
            .and(cloudmask.mask())
            .and(angles.bins().mask())
            .and(&missing_tie_points)
            .map_collect(|&r, &c, &a, &t| r || c || a || t);
        Zip::from(&mut mask).and(&exclusion).for_each(|m, &e| *m = *m || e);

        let concentration = MaskedGrid::new(concentration, mask)?;

        let valid = concentration.valid_count();
        if valid == 0 {
            log::warn!("No pixel passed the concentration quality checks");
        } else {
            log::info!(
                "Concentration valid for {} of {} pixels ({:.1}%)",
                valid,
                concentration.len(),
                100.0 * valid as f64 / concentration.len() as f64
            );
        }
        if let Some(mean) = concentration.mean() {
            log::debug!("Mean concentration over valid pixels: {:.2}%", mean);
        }

        Ok(SicEstimate {
            concentration,
            exclusion,
            forced_water,
            missing_tie_points,
        })
    }

    #[cfg(feature = "parallel")]
    fn compute_pixels(
        &self,
        reflectance: &Array2<f32>,
        codes: &Array2<u8>,
        ice_mean: &Array2<f32>,
        ice_std: &Array2<f32>,
        zenith: &Array2<i32>,
    ) -> Array2<PixelConcentration> {
        Zip::from(reflectance)
            .and(codes)
            .and(ice_mean)
            .and(ice_std)
            .and(zenith)
            .par_map_collect(|&r, &code, &mean, &std, &soz| {
                self.pixel_concentration(r, CloudClass::from_code(code), mean, std, soz)
            })
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_pixels(
        &self,
        reflectance: &Array2<f32>,
        codes: &Array2<u8>,
        ice_mean: &Array2<f32>,
        ice_std: &Array2<f32>,
        zenith: &Array2<i32>,
    ) -> Array2<PixelConcentration> {
        Zip::from(reflectance)
            .and(codes)
            .and(ice_mean)
            .and(ice_std)
            .and(zenith)
            .map_collect(|&r, &code, &mean, &std, &soz| {
                self.pixel_concentration(r, CloudClass::from_code(code), mean, std, soz)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_pixel() {
        let estimator = SicEstimator::standard();
        let pixel = estimator.pixel_concentration(50.0, CloudClass::Clear, 60.0, 6.0, 45);
        assert_relative_eq!(pixel.concentration, 100.0 * 50.0 / 57.0, epsilon = 1e-4);
        assert!(!pixel.excluded);
        assert!(!pixel.forced_water);
    }

    #[test]
    fn test_std_correction() {
        let estimator = SicEstimator::standard();
        // std 70 >= mean 60 is replaced by 20, tie point 60 - 10 = 50
        let pixel = estimator.pixel_concentration(30.0, CloudClass::Ice, 60.0, 70.0, 30);
        assert_relative_eq!(pixel.concentration, 60.0, epsilon = 1e-4);
    }

    #[test]
    fn test_water_threshold_boundary() {
        let estimator = SicEstimator::standard();
        let at = estimator.pixel_concentration(3.0, CloudClass::Ice, 60.0, 6.0, 45);
        assert_eq!(at.concentration, 0.0);

        let above = estimator.pixel_concentration(3.001, CloudClass::Ice, 60.0, 6.0, 45);
        assert!(above.concentration > 0.0);
        assert!(!above.excluded);
    }

    #[test]
    fn test_clear_pixels_below_margin_are_water() {
        let estimator = SicEstimator::standard();
        let pixel = estimator.pixel_concentration(4.5, CloudClass::Clear, 60.0, 6.0, 45);
        assert!(pixel.forced_water);
        assert_eq!(pixel.concentration, 0.0);

        // same reflectance over an ice-classified pixel keeps its estimate
        let ice = estimator.pixel_concentration(4.5, CloudClass::Ice, 60.0, 6.0, 45);
        assert!(ice.concentration > 0.0);
    }

    #[test]
    fn test_exclusion_rules() {
        let estimator = SicEstimator::standard();
        for class in [
            CloudClass::NotProcessed,
            CloudClass::CloudContaminated,
            CloudClass::CloudFilled,
            CloudClass::Undefined,
        ] {
            assert!(estimator.pixel_concentration(50.0, class, 60.0, 6.0, 45).excluded);
        }
        assert!(estimator.pixel_concentration(50.0, CloudClass::Ice, 60.0, 6.0, 90).excluded);
        // between the water threshold and half the ice std
        assert!(estimator.pixel_concentration(4.0, CloudClass::Ice, 60.0, 10.0, 45).excluded);
        assert!(!estimator.pixel_concentration(4.0, CloudClass::Ice, 60.0, 6.0, 45).excluded);
    }

    #[test]
    fn test_params_validation() {
        assert!(SicParams::default().validate().is_ok());
        let params = SicParams {
            std_divisor: 0.0,
            ..SicParams::default()
        };
        assert!(params.validate().is_err());
    }
}
