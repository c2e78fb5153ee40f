//! gacsic: sea-ice concentration from AVHRR GAC passes
//!
//! This library cleans the cloud mask of a GAC pass, estimates sea-ice
//! concentration from the 0.9 µm reflectance against angle-dependent ice tie
//! points, and composes the result with land and climatological extent masks.
//! A Bayesian ice / water / cloud classifier is available for the same passes.

pub mod types;
pub mod config;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    CloudClass, Feature, SicError, SicResult, SurfaceClass, BandImage, CloudCodeImage, FlagImage,
    PROBABILITY_UNDEFINED,
};

pub use config::ProcessingConfig;

pub use crate::core::{
    AngleBins, AngleCoefficients, AuxiliaryMasks, BayesianClassifier, CloudMaskCleaner, CoefficientTable,
    GacPass, MaskedGrid, SicEstimator, SicPipeline, SicProduct, SurfaceBands, SurfaceProbabilities,
};
