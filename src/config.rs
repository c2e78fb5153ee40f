//! Run configuration for the sea-ice processing chain.

use crate::core::angles::AngleBinPolicy;
use crate::core::classifier::ClassifierParams;
use crate::core::cloudmask::{CleanupParams, Connectivity};
use crate::core::composition::LAND_VALUE;
use crate::core::sic::SicParams;
use crate::core::thermal::ThermalConvention;
use crate::types::{SicError, SicResult};
use serde::{Deserialize, Serialize};

/// Every tunable of a processing run, defaulting to the operational values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub cleanup: CleanupParams,
    pub sic: SicParams,
    pub classifier: ClassifierParams,
    /// Handling of solar zenith angles without their own coefficient bin
    pub angle_policy: AngleBinPolicy,
    /// Value written over land in the product
    pub land_value: f32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            cleanup: CleanupParams::default(),
            sic: SicParams::default(),
            classifier: ClassifierParams::default(),
            angle_policy: AngleBinPolicy::default(),
            land_value: LAND_VALUE,
        }
    }
}

impl ProcessingConfig {
    /// Defaults overridden by `GACSIC_*` environment variables.
    ///
    /// Unset variables keep their default; a set but unparsable variable is
    /// an error.
    pub fn from_env() -> SicResult<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<f32>("GACSIC_WATER_THRESHOLD")? {
            config.sic.water_threshold = v;
        }
        if let Some(v) = env_parse::<f32>("GACSIC_CLEANUP_LATITUDE")? {
            config.cleanup.latitude_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("GACSIC_CLEANUP_MAX_COMPONENT")? {
            config.cleanup.max_component_size = v;
        }
        if let Some(v) = env_string("GACSIC_CLEANUP_CONNECTIVITY") {
            config.cleanup.connectivity = match v.as_str() {
                "4" | "four" => Connectivity::Four,
                "8" | "eight" => Connectivity::Eight,
                other => {
                    return Err(SicError::InvalidParameter(format!(
                        "GACSIC_CLEANUP_CONNECTIVITY must be 4 or 8, got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(v) = env_string("GACSIC_ANGLE_POLICY") {
            config.angle_policy = match v.to_lowercase().as_str() {
                "fallback" | "bin0" => AngleBinPolicy::FallbackToBinZero,
                "invalidate" => AngleBinPolicy::Invalidate,
                other => {
                    return Err(SicError::InvalidParameter(format!(
                        "GACSIC_ANGLE_POLICY must be 'fallback' or 'invalidate', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(v) = env_parse::<u32>("GACSIC_DAY_OF_YEAR")? {
            config.classifier.day_of_year = v;
        }
        if let Some(v) = env_string("GACSIC_THERMAL_CONVENTION") {
            config.classifier.thermal_convention = match v.to_lowercase().as_str() {
                "corrected" => ThermalConvention::Corrected,
                "reference" => ThermalConvention::Reference,
                other => {
                    return Err(SicError::InvalidParameter(format!(
                        "GACSIC_THERMAL_CONVENTION must be 'corrected' or 'reference', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(v) = env_parse::<bool>("GACSIC_USE_CHANNEL06")? {
            config.classifier.use_channel06 = v;
        }

        config.validate()?;
        log::debug!("Processing configuration: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> SicResult<()> {
        self.cleanup.validate()?;
        self.sic.validate()?;
        self.classifier.validate()?;
        if !self.land_value.is_finite() {
            return Err(SicError::InvalidParameter(format!(
                "land value must be finite, got {}",
                self.land_value
            )));
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> SicResult<Option<T>> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| SicError::InvalidParameter(format!("cannot parse {}='{}'", key, raw))),
    }
}
