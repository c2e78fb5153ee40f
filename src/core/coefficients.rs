use crate::core::angles::ANGLE_BIN_COUNT;
use crate::core::masked::MaskedGrid;
use crate::types::{Feature, SicError, SicResult, SurfaceClass};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mean and standard deviation of a feature for one solar zenith bin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TiePoint {
    /// Solar zenith of the bin (degrees)
    pub angle: f32,
    pub mean: f32,
    pub std: f32,
}

/// Per-pixel Gaussian parameters gathered from an angle-binned table
#[derive(Debug, Clone)]
pub struct GatheredStatistics {
    pub mean: Array2<f32>,
    pub std: Array2<f32>,
}

/// Tie points for every solar zenith bin 0..=90 of one feature and class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleCoefficients {
    rows: Vec<TiePoint>,
}

impl AngleCoefficients {
    pub fn new(rows: Vec<TiePoint>) -> SicResult<Self> {
        if rows.len() != ANGLE_BIN_COUNT {
            return Err(SicError::InvalidCoefficients(format!(
                "expected {} angle bins, got {}",
                ANGLE_BIN_COUNT,
                rows.len()
            )));
        }
        Ok(Self { rows })
    }

    /// Build from `(angle, mean, std)` rows, the layout of the coefficient files
    pub fn from_rows(rows: &[[f32; 3]]) -> SicResult<Self> {
        Self::new(
            rows.iter()
                .map(|&[angle, mean, std]| TiePoint { angle, mean, std })
                .collect(),
        )
    }

    /// Build from an `N x 3` array of `(angle, mean, std)`
    pub fn from_array(table: &Array2<f32>) -> SicResult<Self> {
        if table.ncols() != 3 {
            return Err(SicError::InvalidCoefficients(format!(
                "expected 3 columns (angle, mean, std), got {}",
                table.ncols()
            )));
        }
        Self::new(
            table
                .rows()
                .into_iter()
                .map(|row| TiePoint {
                    angle: row[0],
                    mean: row[1],
                    std: row[2],
                })
                .collect(),
        )
    }

    pub fn get(&self, bin: usize) -> Option<&TiePoint> {
        self.rows.get(bin)
    }

    pub fn rows(&self) -> &[TiePoint] {
        &self.rows
    }

    /// Per-pixel lookup of mean and std by angle bin.
    ///
    /// The invalid flags of `bins` are not applied here; callers decide how a
    /// masked bin affects their result.
    pub fn gather(&self, bins: &MaskedGrid<usize>) -> GatheredStatistics {
        let lookup = |bin: usize| {
            self.rows
                .get(bin)
                .map(|tp| (tp.mean, tp.std))
                .unwrap_or((f32::NAN, f32::NAN))
        };
        let mean = bins.data().map(|&b| lookup(b).0);
        let std = bins.data().map(|&b| lookup(b).1);
        GatheredStatistics { mean, std }
    }
}

/// Mean / std grids of one feature for the three classes the classifier
/// distinguishes
#[derive(Debug, Clone)]
pub struct ClassStatistics {
    pub ice: GatheredStatistics,
    pub water: GatheredStatistics,
    pub cloud: GatheredStatistics,
}

/// Angle-binned Gaussian coefficients keyed by feature and surface class.
///
/// Immutable once built; construct it with [`CoefficientTable::from_entries`].
#[derive(Debug, Clone, Default)]
pub struct CoefficientTable {
    entries: HashMap<(Feature, SurfaceClass), AngleCoefficients>,
}

impl CoefficientTable {
    /// Build a table, rejecting duplicated (feature, class) pairs
    pub fn from_entries<I>(entries: I) -> SicResult<Self>
    where
        I: IntoIterator<Item = (Feature, SurfaceClass, AngleCoefficients)>,
    {
        let mut table = HashMap::new();
        for (feature, class, coeffs) in entries {
            if table.insert((feature, class), coeffs).is_some() {
                return Err(SicError::InvalidCoefficients(format!(
                    "duplicate coefficients for {} / {}",
                    feature, class
                )));
            }
        }
        log::debug!("Coefficient table with {} feature/class entries", table.len());
        Ok(Self { entries: table })
    }

    pub fn get(&self, feature: Feature, class: SurfaceClass) -> SicResult<&AngleCoefficients> {
        self.entries.get(&(feature, class)).ok_or_else(|| {
            SicError::InvalidCoefficients(format!(
                "no coefficients for feature {} and class {}",
                feature, class
            ))
        })
    }

    pub fn contains(&self, feature: Feature, class: SurfaceClass) -> bool {
        self.entries.contains_key(&(feature, class))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that ice, water and cloud coefficients exist for each feature
    pub fn require(&self, features: &[Feature]) -> SicResult<()> {
        for &feature in features {
            for class in [SurfaceClass::Ice, SurfaceClass::Water, SurfaceClass::Cloud] {
                self.get(feature, class)?;
            }
        }
        Ok(())
    }

    /// Gather ice, water and cloud statistics of `feature` for every pixel
    pub fn class_statistics(&self, feature: Feature, bins: &MaskedGrid<usize>) -> SicResult<ClassStatistics> {
        Ok(ClassStatistics {
            ice: self.get(feature, SurfaceClass::Ice)?.gather(bins),
            water: self.get(feature, SurfaceClass::Water)?.gather(bins),
            cloud: self.get(feature, SurfaceClass::Cloud)?.gather(bins),
        })
    }
}

/// Invalidate missing (exactly zero) means and non-finite means or stds
pub fn invalid_coefficients(stats: &GatheredStatistics) -> Array2<bool> {
    Zip::from(&stats.mean)
        .and(&stats.std)
        .map_collect(|&mean, &std| mean == 0.0 || !mean.is_finite() || !std.is_finite())
}
