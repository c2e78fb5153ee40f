//! Water / ice / cloud probabilities from daytime and twilight AVHRR channels.
//!
//! Each feature contributes a Gaussian likelihood per class, with mean and
//! standard deviation taken from the coefficient table at the pixel's solar
//! zenith bin. Classes get equal priors, so the posterior of a class is its
//! likelihood product divided by the sum over the three classes.
//!
//! Features:
//! - VAR1: 0.9 µm / 0.6 µm reflectance ratio (always used)
//! - VAR2: 0.6 µm reflectance (unless disabled in [`ClassifierParams`])
//! - VAR3: 1.6 µm / 0.6 µm ratio where the 1.6 µm channel is usable, otherwise
//!   the 3.7 µm derived reflectance over 0.6 µm where the thermal channels are

use crate::core::angles::AngleBins;
use crate::core::coefficients::{ClassStatistics, CoefficientTable, GatheredStatistics};
use crate::core::masked::MaskedGrid;
use crate::core::statistics::normal_pdf;
use crate::core::thermal::{reflectance_37, ThermalConvention, ThermalParams};
use crate::types::{ensure_shape, Feature, SicError, SicResult, PROBABILITY_UNDEFINED};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Surface classifier parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Use the 0.6 µm reflectance as the second feature
    pub use_channel06: bool,
    /// Smallest usable reflectance (percent)
    pub min_reflectance: f32,
    /// Largest usable reflectance (percent)
    pub max_reflectance: f32,
    /// Brightness temperatures must lie strictly inside these bounds (K)
    pub min_brightness_temperature: f32,
    pub max_brightness_temperature: f32,
    /// Truncated solar zenith must lie strictly inside these bounds (degrees)
    pub min_solar_zenith: i32,
    pub max_solar_zenith: i32,
    /// Day of year of the pass, for the Earth-Sun distance
    pub day_of_year: u32,
    /// Written to all three posteriors where the quality check fails
    pub undefined_probability: f32,
    pub thermal: ThermalParams,
    /// Class mapping and Earth-Sun angle of the 3.7 µm feature
    pub thermal_convention: ThermalConvention,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            use_channel06: true,
            min_reflectance: 1e-5,
            max_reflectance: 100.0,
            min_brightness_temperature: 50.0,
            max_brightness_temperature: 400.0,
            min_solar_zenith: 0,
            max_solar_zenith: 89,
            day_of_year: 213,
            undefined_probability: PROBABILITY_UNDEFINED,
            thermal: ThermalParams::default(),
            thermal_convention: ThermalConvention::default(),
        }
    }
}

impl ClassifierParams {
    pub fn validate(&self) -> SicResult<()> {
        if !(1..=366).contains(&self.day_of_year) {
            return Err(SicError::InvalidParameter(format!(
                "day of year must be within 1..=366, got {}",
                self.day_of_year
            )));
        }
        if !(self.min_reflectance < self.max_reflectance) {
            return Err(SicError::InvalidParameter(format!(
                "reflectance range [{}, {}] is empty",
                self.min_reflectance, self.max_reflectance
            )));
        }
        if !(self.min_brightness_temperature < self.max_brightness_temperature) {
            return Err(SicError::InvalidParameter(format!(
                "brightness temperature range ({}, {}) is empty",
                self.min_brightness_temperature, self.max_brightness_temperature
            )));
        }
        if self.min_solar_zenith >= self.max_solar_zenith {
            return Err(SicError::InvalidParameter(format!(
                "solar zenith range ({}, {}) is empty",
                self.min_solar_zenith, self.max_solar_zenith
            )));
        }
        Ok(())
    }
}

/// Channels available for one pass. Reflectances in percent, brightness
/// temperatures in Kelvin.
#[derive(Debug, Clone)]
pub struct SurfaceBands {
    pub vis06: MaskedGrid<f32>,
    pub vis09: MaskedGrid<f32>,
    pub vis16: Option<MaskedGrid<f32>>,
    pub tb37: Option<MaskedGrid<f32>>,
    pub tb11: Option<MaskedGrid<f32>>,
}

impl SurfaceBands {
    pub fn new(vis06: MaskedGrid<f32>, vis09: MaskedGrid<f32>) -> SicResult<Self> {
        ensure_shape("surface bands (vis09)", vis06.dim(), vis09.dim())?;
        Ok(Self {
            vis06,
            vis09,
            vis16: None,
            tb37: None,
            tb11: None,
        })
    }

    pub fn with_vis16(mut self, vis16: MaskedGrid<f32>) -> SicResult<Self> {
        ensure_shape("surface bands (vis16)", self.dim(), vis16.dim())?;
        self.vis16 = Some(vis16);
        Ok(self)
    }

    pub fn with_thermal(mut self, tb37: MaskedGrid<f32>, tb11: MaskedGrid<f32>) -> SicResult<Self> {
        ensure_shape("surface bands (tb37)", self.dim(), tb37.dim())?;
        ensure_shape("surface bands (tb11)", self.dim(), tb11.dim())?;
        self.tb37 = Some(tb37);
        self.tb11 = Some(tb11);
        Ok(self)
    }

    /// Invalidate the negative fill values the level-1c files carry in every band
    pub fn mask_negative(&self) -> Self {
        let negative = |v: f32| v < 0.0;
        Self {
            vis06: self.vis06.masked_by(negative),
            vis09: self.vis09.masked_by(negative),
            vis16: self.vis16.as_ref().map(|g| g.masked_by(negative)),
            tb37: self.tb37.as_ref().map(|g| g.masked_by(negative)),
            tb11: self.tb11.as_ref().map(|g| g.masked_by(negative)),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.vis06.dim()
    }
}

/// Per-pixel availability of each feature
#[derive(Debug, Clone)]
pub struct FeatureGates {
    /// 0.9 / 0.6 µm ratio computed from in-range reflectances
    pub ratio09: Array2<bool>,
    /// 1.6 / 0.6 µm ratio usable
    pub ratio16: Array2<bool>,
    /// 3.7 µm proxy usable (only where the 1.6 µm ratio is not)
    pub thermal: Array2<bool>,
}

impl FeatureGates {
    /// Pixels with a third feature
    pub fn var3(&self) -> Array2<bool> {
        Zip::from(&self.ratio16)
            .and(&self.thermal)
            .map_collect(|&a, &b| a || b)
    }
}

/// Class-conditional likelihoods of one feature
#[derive(Debug, Clone)]
pub struct ClassLikelihoods {
    pub ice: MaskedGrid<f64>,
    pub water: MaskedGrid<f64>,
    pub cloud: MaskedGrid<f64>,
}

impl ClassLikelihoods {
    /// Gaussian likelihood of `values` under each class. Non-finite
    /// likelihoods (zero or missing std) are invalid.
    #[cfg(feature = "parallel")]
    pub fn evaluate(values: &MaskedGrid<f32>, stats: &ClassStatistics) -> SicResult<Self> {
        let (ice, (water, cloud)) = rayon::join(
            || gaussian_likelihood(values, &stats.ice),
            || {
                rayon::join(
                    || gaussian_likelihood(values, &stats.water),
                    || gaussian_likelihood(values, &stats.cloud),
                )
            },
        );
        Ok(Self {
            ice: ice?,
            water: water?,
            cloud: cloud?,
        })
    }

    /// Gaussian likelihood of `values` under each class. Non-finite
    /// likelihoods (zero or missing std) are invalid.
    #[cfg(not(feature = "parallel"))]
    pub fn evaluate(values: &MaskedGrid<f32>, stats: &ClassStatistics) -> SicResult<Self> {
        Ok(Self {
            ice: gaussian_likelihood(values, &stats.ice)?,
            water: gaussian_likelihood(values, &stats.water)?,
            cloud: gaussian_likelihood(values, &stats.cloud)?,
        })
    }

    /// Pixel-wise choice between two feature likelihoods
    pub fn select(condition: &Array2<bool>, when_true: &Self, when_false: &Self) -> SicResult<Self> {
        Ok(Self {
            ice: MaskedGrid::select(condition, &when_true.ice, &when_false.ice)?,
            water: MaskedGrid::select(condition, &when_true.water, &when_false.water)?,
            cloud: MaskedGrid::select(condition, &when_true.cloud, &when_false.cloud)?,
        })
    }
}

fn gaussian_likelihood(values: &MaskedGrid<f32>, stats: &GatheredStatistics) -> SicResult<MaskedGrid<f64>> {
    ensure_shape("likelihood", values.dim(), stats.mean.dim())?;
    let data = pdf_grid(values.data(), &stats.mean, &stats.std);
    Ok(MaskedGrid::new(data, values.mask().clone())?.fix_invalid())
}

#[cfg(feature = "parallel")]
fn pdf_grid(x: &Array2<f32>, mean: &Array2<f32>, std: &Array2<f32>) -> Array2<f64> {
    Zip::from(x)
        .and(mean)
        .and(std)
        .par_map_collect(|&x, &m, &s| normal_pdf(f64::from(x), f64::from(m), f64::from(s)))
}

#[cfg(not(feature = "parallel"))]
fn pdf_grid(x: &Array2<f32>, mean: &Array2<f32>, std: &Array2<f32>) -> Array2<f64> {
    Zip::from(x)
        .and(mean)
        .and(std)
        .map_collect(|&x, &m, &s| normal_pdf(f64::from(x), f64::from(m), f64::from(s)))
}

/// Posterior class probabilities
#[derive(Debug, Clone)]
pub struct Posterior {
    pub ice: MaskedGrid<f32>,
    pub water: MaskedGrid<f32>,
    pub cloud: MaskedGrid<f32>,
}

/// Bayes' rule with equal priors over the product of the given likelihoods
pub fn fuse_likelihoods(factors: &[&ClassLikelihoods]) -> SicResult<Posterior> {
    let (first, rest) = factors
        .split_first()
        .ok_or_else(|| SicError::Processing("no likelihoods to fuse".to_string()))?;

    let mut ice = first.ice.clone();
    let mut water = first.water.clone();
    let mut cloud = first.cloud.clone();
    for factor in rest {
        ice = ice.zip_with(&factor.ice, |a, b| a * b)?;
        water = water.zip_with(&factor.water, |a, b| a * b)?;
        cloud = cloud.zip_with(&factor.cloud, |a, b| a * b)?;
    }

    let total = ice
        .zip_with(&water, |a, b| a + b)?
        .zip_with(&cloud, |a, b| a + b)?;
    let normalise = |class: &MaskedGrid<f64>| -> SicResult<MaskedGrid<f32>> {
        Ok(class
            .zip_with(&total, |p, t| (p / t) as f32)?
            .fix_invalid())
    };

    Ok(Posterior {
        ice: normalise(&ice)?,
        water: normalise(&water)?,
        cloud: normalise(&cloud)?,
    })
}

/// Classifier output. Pixels that failed the quality check hold
/// [`ClassifierParams::undefined_probability`] in all three grids and count as
/// valid samples of that sentinel; consumers must not read it as a probability.
#[derive(Debug, Clone)]
pub struct SurfaceProbabilities {
    pub ice: MaskedGrid<f32>,
    pub water: MaskedGrid<f32>,
    pub cloud: MaskedGrid<f32>,
    pub quality_failed: Array2<bool>,
    pub gates: FeatureGates,
}

impl SurfaceProbabilities {
    pub fn undefined_count(&self) -> usize {
        self.quality_failed.iter().filter(|&&f| f).count()
    }
}

/// Bayesian water / ice / cloud classifier
pub struct BayesianClassifier {
    params: ClassifierParams,
}

impl BayesianClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(ClassifierParams::default())
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Per-pixel feature availability
    pub fn feature_gates(&self, bands: &SurfaceBands, angles: &AngleBins) -> SicResult<FeatureGates> {
        let dim = bands.dim();
        ensure_shape("feature gates (solar zenith)", dim, angles.dim())?;
        let p = &self.params;

        let zenith = angles.zenith();
        let sun_ok = Zip::from(zenith.data())
            .and(zenith.mask())
            .map_collect(|&deg, &m| !m && deg > p.min_solar_zenith && deg < p.max_solar_zenith);

        let reflectance_ok = |v: f32| v >= p.min_reflectance && v <= p.max_reflectance;
        let ratio09 = Zip::from(&sun_ok)
            .and(bands.vis06.data())
            .and(bands.vis06.mask())
            .and(bands.vis09.data())
            .and(bands.vis09.mask())
            .map_collect(|&sun, &v06, &m06, &v09, &m09| {
                sun && !m06 && !m09 && reflectance_ok(v06) && reflectance_ok(v09)
            });

        let ratio16 = match &bands.vis16 {
            Some(vis16) => Zip::from(&sun_ok)
                .and(vis16.data())
                .and(vis16.mask())
                .map_collect(|&sun, &v16, &m16| {
                    sun && !m16 && v16 > p.min_reflectance && v16 <= p.max_reflectance
                }),
            None => Array2::from_elem(dim, false),
        };

        let bt_ok = |t: f32| t > p.min_brightness_temperature && t < p.max_brightness_temperature;
        let thermal = match (&bands.tb37, &bands.tb11) {
            (Some(tb37), Some(tb11)) => {
                let mut thermal = Zip::from(&sun_ok)
                    .and(&ratio16)
                    .and(tb37.data())
                    .and(tb37.mask())
                    .map_collect(|&sun, &use16, &t37, &m37| sun && !use16 && !m37 && bt_ok(t37));
                Zip::from(&mut thermal)
                    .and(tb11.data())
                    .and(tb11.mask())
                    .for_each(|ok, &t11, &m11| *ok = *ok && !m11 && bt_ok(t11));
                thermal
            }
            _ => Array2::from_elem(dim, false),
        };

        Ok(FeatureGates {
            ratio09,
            ratio16,
            thermal,
        })
    }

    /// Posterior probabilities of ice, water and cloud for a pass.
    ///
    /// The third feature is resolved once per pass: coefficients for the
    /// 1.6 µm or 3.7 µm feature are only required when some pixel can use it.
    pub fn classify(
        &self,
        bands: &SurfaceBands,
        angles: &AngleBins,
        coeffs: &CoefficientTable,
    ) -> SicResult<SurfaceProbabilities> {
        self.params.validate()?;
        let bands = &bands.mask_negative();
        let dim = bands.dim();
        log::info!("Classifying surface types for {}x{} pixels", dim.0, dim.1);

        let gates = self.feature_gates(bands, angles)?;
        let any_ratio16 = gates.ratio16.iter().any(|&g| g);
        let any_thermal = gates.thermal.iter().any(|&g| g);
        log::debug!(
            "Feature availability: re16/re06 {}, re37/re06 {}, re06 {}",
            any_ratio16,
            any_thermal,
            self.params.use_channel06
        );

        let mut required = vec![Feature::Ratio09Over06];
        if self.params.use_channel06 {
            required.push(Feature::Reflectance06);
        }
        if any_ratio16 {
            required.push(Feature::Ratio16Over06);
        }
        if any_thermal {
            required.push(Feature::Ratio37Over06);
        }
        coeffs.require(&required)?;

        let bins = angles.bins();
        let vis06 = bands.vis06.fix_invalid();
        let vis09 = bands.vis09.fix_invalid();

        // pixels without a usable angle bin have no likelihood
        let likelihoods = |values: &MaskedGrid<f32>, feature: Feature| -> SicResult<ClassLikelihoods> {
            ClassLikelihoods::evaluate(
                &values.masked_where(bins.mask())?,
                &coeffs.class_statistics(feature, bins)?,
            )
        };

        let ratio09 = vis09.zip_with(&vis06, |a09, a06| a09 / a06)?.fix_invalid();
        let var1 = likelihoods(&ratio09, Feature::Ratio09Over06)?;
        let var2 = if self.params.use_channel06 {
            Some(likelihoods(&vis06, Feature::Reflectance06)?)
        } else {
            None
        };

        let ratio16_likelihoods = match (&bands.vis16, any_ratio16) {
            (Some(vis16), true) => {
                let ratio16 = vis16
                    .fix_invalid()
                    .zip_with(&vis06, |a16, a06| a16 / a06)?
                    .fix_invalid();
                Some(likelihoods(&ratio16, Feature::Ratio16Over06)?)
            }
            _ => None,
        };

        let thermal_likelihoods = match (&bands.tb37, &bands.tb11, any_thermal) {
            (Some(tb37), Some(tb11), true) => {
                let a37 = reflectance_37(
                    tb37,
                    tb11,
                    angles.zenith(),
                    self.params.day_of_year,
                    self.params.thermal_convention,
                    &self.params.thermal,
                )?;
                log::debug!("3.7um reflectance range: {:?}", a37.min_max());
                let ratio37 = a37
                    .zip_with(&vis06, |a37, a06| a37 / a06)?
                    .fix_invalid()
                    .masked_by(|r| !(0.0..=1.0).contains(&r));
                let stats = thermal_class_statistics(
                    coeffs.class_statistics(Feature::Ratio37Over06, bins)?,
                    self.params.thermal_convention,
                );
                Some(ClassLikelihoods::evaluate(&ratio37.masked_where(bins.mask())?, &stats)?)
            }
            _ => None,
        };

        // the 1.6um ratio has priority over the 3.7um proxy
        let var3 = match (ratio16_likelihoods, thermal_likelihoods) {
            (Some(r16), Some(t37)) => Some(ClassLikelihoods::select(&gates.ratio16, &r16, &t37)?),
            (Some(r16), None) => Some(r16),
            (None, Some(t37)) => Some(t37),
            (None, None) => None,
        };

        let mut stage_a: Vec<&ClassLikelihoods> = vec![&var1];
        if let Some(var2) = &var2 {
            stage_a.push(var2);
        }
        let mut posterior = fuse_likelihoods(&stage_a)?;

        if let Some(var3) = &var3 {
            let mut stage_b = stage_a.clone();
            stage_b.push(var3);
            let with_var3 = fuse_likelihoods(&stage_b)?;
            let use_var3 = gates.var3();
            posterior = Posterior {
                ice: MaskedGrid::select(&use_var3, &with_var3.ice, &posterior.ice)?,
                water: MaskedGrid::select(&use_var3, &with_var3.water, &posterior.water)?,
                cloud: MaskedGrid::select(&use_var3, &with_var3.cloud, &posterior.cloud)?,
            };
        }

        let quality_failed = self.quality_check(&posterior, &vis06);
        let undefined = self.params.undefined_probability;
        let result = SurfaceProbabilities {
            ice: posterior.ice.assign_where(&quality_failed, undefined)?,
            water: posterior.water.assign_where(&quality_failed, undefined)?,
            cloud: posterior.cloud.assign_where(&quality_failed, undefined)?,
            quality_failed,
            gates,
        };

        log::info!(
            "Surface classification: {} pixels classified, {} undefined",
            result.ice.valid_count() - result.undefined_count(),
            result.undefined_count()
        );
        Ok(result)
    }

    /// Pixels where the 0.6 µm channel is invalid and none of the three
    /// posteriors is a valid value inside [0, 1]
    fn quality_check(&self, posterior: &Posterior, vis06: &MaskedGrid<f32>) -> Array2<bool> {
        let unusable = |class: &MaskedGrid<f32>| {
            Zip::from(class.data())
                .and(class.mask())
                .map_collect(|&p, &m| m || !(0.0..=1.0).contains(&p))
        };
        let (ice, water, cloud) = (
            unusable(&posterior.ice),
            unusable(&posterior.water),
            unusable(&posterior.cloud),
        );
        Zip::from(&ice)
            .and(&water)
            .and(&cloud)
            .and(vis06.mask())
            .map_collect(|&pi, &pw, &pc, &m06| pi && pw && pc && m06)
    }
}

/// Class statistics of the 3.7 µm feature as scored under `convention`
fn thermal_class_statistics(stats: ClassStatistics, convention: ThermalConvention) -> ClassStatistics {
    match convention {
        ThermalConvention::Corrected => stats,
        ThermalConvention::Reference => ClassStatistics {
            ice: stats.cloud,
            water: stats.ice,
            cloud: stats.water,
        },
    }
}
