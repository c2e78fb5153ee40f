use crate::core::masked::MaskedGrid;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Lowest solar zenith bin with its own coefficients
pub const MIN_ANGLE_BIN: i32 = 0;
/// Highest solar zenith bin used for coefficient lookup
pub const MAX_ANGLE_BIN: i32 = 89;
/// Rows in every per-angle coefficient array (bins 0..=90)
pub const ANGLE_BIN_COUNT: usize = 91;

/// What to do with pixels whose truncated solar zenith falls outside
/// [`MIN_ANGLE_BIN`, `MAX_ANGLE_BIN`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AngleBinPolicy {
    /// Look such pixels up in bin 0 and leave them valid
    #[default]
    FallbackToBinZero,
    /// Invalidate such pixels
    Invalidate,
}

/// Solar zenith angles truncated to whole degrees together with the
/// coefficient bin each pixel is looked up in.
#[derive(Debug, Clone)]
pub struct AngleBins {
    zenith: MaskedGrid<i32>,
    bins: MaskedGrid<usize>,
    out_of_range: usize,
    policy: AngleBinPolicy,
}

impl AngleBins {
    /// Truncate solar zenith angles (degrees) toward zero and assign bins.
    ///
    /// Non-finite angles are invalid. Bin indices are always in range so a
    /// gather never fails, even for invalid pixels.
    pub fn from_zenith(solar_zenith: &MaskedGrid<f32>, policy: AngleBinPolicy) -> Self {
        let soz = solar_zenith.fix_invalid();
        // `as` saturates and maps NaN to 0
        let zenith = soz.map(|deg| deg.trunc() as i32);

        let in_range = zenith
            .data()
            .map(|&deg| (MIN_ANGLE_BIN..=MAX_ANGLE_BIN).contains(&deg));
        let out_of_range = Zip::from(&in_range)
            .and(zenith.mask())
            .fold(0usize, |acc, &ok, &m| if !ok && !m { acc + 1 } else { acc });

        if out_of_range > 0 {
            log::warn!(
                "{} pixels have solar zenith outside [{}, {}] degrees, policy {:?}",
                out_of_range,
                MIN_ANGLE_BIN,
                MAX_ANGLE_BIN,
                policy
            );
        }

        let bin_data = Zip::from(zenith.data())
            .and(&in_range)
            .map_collect(|&deg, &ok| if ok { deg as usize } else { 0 });
        let bin_mask = Zip::from(zenith.mask())
            .and(&in_range)
            .map_collect(|&m, &ok| match policy {
                AngleBinPolicy::FallbackToBinZero => m,
                AngleBinPolicy::Invalidate => m || !ok,
            });

        Self {
            zenith,
            bins: MaskedGrid::from_parts_unchecked(bin_data, bin_mask),
            out_of_range,
            policy,
        }
    }

    /// Truncated solar zenith in whole degrees
    pub fn zenith(&self) -> &MaskedGrid<i32> {
        &self.zenith
    }

    /// Coefficient bin per pixel
    pub fn bins(&self) -> &MaskedGrid<usize> {
        &self.bins
    }

    /// Valid pixels whose zenith needed the out-of-range policy
    pub fn out_of_range_count(&self) -> usize {
        self.out_of_range
    }

    pub fn policy(&self) -> AngleBinPolicy {
        self.policy
    }

    pub fn dim(&self) -> (usize, usize) {
        self.zenith.dim()
    }
}
