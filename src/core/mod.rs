//! Core sea-ice processing modules

pub mod masked;
pub mod angles;
pub mod coefficients;
pub mod statistics;
pub mod thermal;
pub mod cloudmask;
pub mod sic;
pub mod classifier;
pub mod composition;
pub mod product;
pub mod pipeline;

// Re-export main types
pub use masked::MaskedGrid;
pub use angles::{AngleBins, AngleBinPolicy, ANGLE_BIN_COUNT, MAX_ANGLE_BIN, MIN_ANGLE_BIN};
pub use coefficients::{AngleCoefficients, ClassStatistics, CoefficientTable, GatheredStatistics, TiePoint};
pub use statistics::{gaussian_intersections, lognormal_pdf, normal_pdf};
pub use thermal::{earth_sun_angle, reflectance_37, sun_distance_correction, ThermalConvention, ThermalParams};
pub use cloudmask::{label_components, CleanupParams, CleanupSummary, CloudMaskCleaner, Connectivity};
pub use sic::{SicEstimate, SicEstimator, SicParams};
pub use classifier::{
    fuse_likelihoods, BayesianClassifier, ClassLikelihoods, ClassifierParams, FeatureGates, Posterior,
    SurfaceBands, SurfaceProbabilities,
};
pub use composition::{apply_extent_mask, apply_land_mask, LAND_VALUE};
pub use product::{compose_filename, ProductStatistics, SicProduct, FILL_VALUE};
pub use pipeline::{AuxiliaryMasks, GacPass, SicPipeline};
