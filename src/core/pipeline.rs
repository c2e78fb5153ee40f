use crate::config::ProcessingConfig;
use crate::core::angles::AngleBins;
use crate::core::classifier::{BayesianClassifier, SurfaceBands, SurfaceProbabilities};
use crate::core::cloudmask::CloudMaskCleaner;
use crate::core::coefficients::{AngleCoefficients, CoefficientTable};
use crate::core::composition::{apply_extent_mask, apply_land_mask};
use crate::core::masked::MaskedGrid;
use crate::core::product::SicProduct;
use crate::core::sic::SicEstimator;
use crate::types::{ensure_shape, SicError, SicResult};
use chrono::{DateTime, Datelike, Utc};
use ndarray::Array2;

/// One AVHRR GAC pass on its swath grid
#[derive(Debug, Clone)]
pub struct GacPass {
    /// Platform label used in the product name, e.g. `avhrr_noaa18`
    pub sensor: String,
    pub timestamp: DateTime<Utc>,
    pub bands: SurfaceBands,
    pub cloudmask: MaskedGrid<u8>,
    pub latitude: MaskedGrid<f32>,
    pub longitude: MaskedGrid<f32>,
    pub solar_zenith: MaskedGrid<f32>,
}

impl GacPass {
    pub fn dim(&self) -> (usize, usize) {
        self.bands.dim()
    }

    fn validate_shapes(&self) -> SicResult<()> {
        let dim = self.dim();
        ensure_shape("pass (cloud mask)", dim, self.cloudmask.dim())?;
        ensure_shape("pass (latitude)", dim, self.latitude.dim())?;
        ensure_shape("pass (longitude)", dim, self.longitude.dim())?;
        ensure_shape("pass (solar zenith)", dim, self.solar_zenith.dim())?;
        Ok(())
    }
}

/// Static masks resampled to the pass grid
#[derive(Debug, Clone)]
pub struct AuxiliaryMasks {
    /// `true` over land
    pub land: Array2<bool>,
    /// `true` inside the climatological maximum ice extent
    pub extent: Array2<bool>,
}

/// Cloud-mask cleanup, concentration estimate and mask composition for
/// complete passes
pub struct SicPipeline {
    config: ProcessingConfig,
    ice_tie_points: AngleCoefficients,
    probability_coefficients: Option<CoefficientTable>,
}

impl SicPipeline {
    pub fn new(config: ProcessingConfig, ice_tie_points: AngleCoefficients) -> SicResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ice_tie_points,
            probability_coefficients: None,
        })
    }

    /// Enable [`SicPipeline::classify`] with the given coefficient table
    pub fn with_probability_coefficients(mut self, table: CoefficientTable) -> Self {
        self.probability_coefficients = Some(table);
        self
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn run(&self, pass: &GacPass, aux: &AuxiliaryMasks) -> SicResult<SicProduct> {
        pass.validate_shapes()?;
        let dim = pass.dim();
        ensure_shape("auxiliary (land)", dim, aux.land.dim())?;
        ensure_shape("auxiliary (extent)", dim, aux.extent.dim())?;

        log::info!(
            "Processing {} pass {} ({}x{})",
            pass.sensor,
            pass.timestamp.format("%Y-%m-%d %H:%M"),
            dim.0,
            dim.1
        );

        let angles = AngleBins::from_zenith(&pass.solar_zenith, self.config.angle_policy);

        let cleaner = CloudMaskCleaner::new(self.config.cleanup.clone());
        let (cloudmask, summary) = cleaner.clean_with_summary(&pass.cloudmask, &pass.latitude)?;
        log::debug!("Cloud mask cleanup: {:?}", summary);

        let estimator = SicEstimator::new(self.config.sic.clone());
        let estimate = estimator.estimate(&pass.bands.vis09, &cloudmask, &self.ice_tie_points, &angles)?;

        let within_extent = apply_extent_mask(&estimate.concentration, &aux.extent)?;
        let ice_conc = apply_land_mask(&within_extent, &aux.land, self.config.land_value)?;

        let product = SicProduct::new(
            pass.sensor.clone(),
            pass.timestamp,
            ice_conc,
            pass.latitude.clone(),
            pass.longitude.clone(),
            self.config.land_value,
        )?;

        let stats = product.statistics();
        log::info!(
            "Product {}: {} valid of {} pixels ({} land), mean concentration {:?}",
            product.filename(),
            stats.valid_pixels,
            stats.total_pixels,
            stats.land_pixels,
            stats.mean_concentration
        );
        Ok(product)
    }

    /// Ice, water and cloud probabilities for a pass. The day of year is
    /// taken from the pass timestamp.
    pub fn classify(&self, pass: &GacPass) -> SicResult<SurfaceProbabilities> {
        let table = self.probability_coefficients.as_ref().ok_or_else(|| {
            SicError::InvalidCoefficients("no probability coefficient table configured".to_string())
        })?;
        pass.validate_shapes()?;

        let mut params = self.config.classifier.clone();
        params.day_of_year = pass.timestamp.ordinal();
        let angles = AngleBins::from_zenith(&pass.solar_zenith, self.config.angle_policy);

        BayesianClassifier::new(params).classify(&pass.bands, &angles, table)
    }
}
