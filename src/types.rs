use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Reflectance in percent, or brightness temperature in Kelvin
pub type Radiometric = f32;

/// 2D reflectance / brightness-temperature grid (scan line x pixel)
pub type BandImage = Array2<Radiometric>;

/// 2D cloud-mask code grid
pub type CloudCodeImage = Array2<u8>;

/// 2D boolean grid (land, extent, invalid flags)
pub type FlagImage = Array2<bool>;

/// Sentinel written into all three posterior grids where the quality gate fails
pub const PROBABILITY_UNDEFINED: f32 = -999.0;

/// Cloud-mask categories delivered with the GAC pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudClass {
    NotProcessed,
    Clear,
    CloudContaminated,
    CloudFilled,
    Ice,
    Undefined,
}

impl CloudClass {
    /// Decode a raw cloud-mask value. Unknown codes are undefined.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => CloudClass::NotProcessed,
            1 => CloudClass::Clear,
            2 => CloudClass::CloudContaminated,
            3 => CloudClass::CloudFilled,
            4 => CloudClass::Ice,
            _ => CloudClass::Undefined,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            CloudClass::NotProcessed => 0,
            CloudClass::Clear => 1,
            CloudClass::CloudContaminated => 2,
            CloudClass::CloudFilled => 3,
            CloudClass::Ice => 4,
            CloudClass::Undefined => 5,
        }
    }

    /// Classes that can never carry a concentration estimate
    pub fn excludes_sic(self) -> bool {
        matches!(
            self,
            CloudClass::NotProcessed
                | CloudClass::CloudContaminated
                | CloudClass::CloudFilled
                | CloudClass::Undefined
        )
    }
}

impl std::fmt::Display for CloudClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudClass::NotProcessed => write!(f, "not processed"),
            CloudClass::Clear => write!(f, "clear"),
            CloudClass::CloudContaminated => write!(f, "cloud contaminated"),
            CloudClass::CloudFilled => write!(f, "cloud filled"),
            CloudClass::Ice => write!(f, "ice"),
            CloudClass::Undefined => write!(f, "undefined"),
        }
    }
}

/// Surface classes of the probability coefficient table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceClass {
    Cloud,
    Water,
    Ice,
    Snow,
    Land,
}

impl SurfaceClass {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "cloud" => Some(SurfaceClass::Cloud),
            "water" => Some(SurfaceClass::Water),
            "ice" => Some(SurfaceClass::Ice),
            "snow" => Some(SurfaceClass::Snow),
            "land" => Some(SurfaceClass::Land),
            _ => None,
        }
    }
}

impl std::fmt::Display for SurfaceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceClass::Cloud => write!(f, "cloud"),
            SurfaceClass::Water => write!(f, "water"),
            SurfaceClass::Ice => write!(f, "ice"),
            SurfaceClass::Snow => write!(f, "snow"),
            SurfaceClass::Land => write!(f, "land"),
        }
    }
}

/// Features the surface classifier draws likelihoods from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// 0.9 µm / 0.6 µm reflectance ratio
    Ratio09Over06,
    /// 0.6 µm reflectance
    Reflectance06,
    /// 1.6 µm / 0.6 µm reflectance ratio
    Ratio16Over06,
    /// 3.7 µm derived reflectance / 0.6 µm reflectance ratio
    Ratio37Over06,
}

impl Feature {
    /// Variable name used in the coefficient files
    pub fn table_name(self) -> &'static str {
        match self {
            Feature::Ratio09Over06 => "re09/re06",
            Feature::Reflectance06 => "re06",
            Feature::Ratio16Over06 => "re16/re06",
            Feature::Ratio37Over06 => "re37/re06",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        match name {
            "re09/re06" => Some(Feature::Ratio09Over06),
            "re06" => Some(Feature::Reflectance06),
            "re16/re06" => Some(Feature::Ratio16Over06),
            "re37/re06" => Some(Feature::Ratio37Over06),
            _ => None,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

/// Error types for sea-ice processing
#[derive(Debug, thiserror::Error)]
pub enum SicError {
    #[error("Dimension mismatch in {context}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        context: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid coefficients: {0}")]
    InvalidCoefficients(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for sea-ice operations
pub type SicResult<T> = Result<T, SicError>;

/// Fail with `DimensionMismatch` unless `found` has the shape `expected`
pub fn ensure_shape(context: &str, expected: (usize, usize), found: (usize, usize)) -> SicResult<()> {
    if expected != found {
        return Err(SicError::DimensionMismatch {
            context: context.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}
