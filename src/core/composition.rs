use crate::core::masked::MaskedGrid;
use crate::types::{ensure_shape, SicResult};
use ndarray::{Array2, Zip};

/// Value written over land in the concentration product
pub const LAND_VALUE: f32 = 200.0;

/// Invalidate every pixel outside the climatological ice extent
/// (`extent == false`)
pub fn apply_extent_mask(sic: &MaskedGrid<f32>, extent: &Array2<bool>) -> SicResult<MaskedGrid<f32>> {
    ensure_shape("extent mask", sic.dim(), extent.dim())?;
    let outside = extent.map(|&inside| !inside);
    let masked = sic.masked_where(&outside)?;
    log::debug!(
        "Extent mask: {} pixels outside climatological extent",
        outside.iter().filter(|&&o| o).count()
    );
    Ok(masked)
}

/// Write `land_value` over land pixels. Land pixels become valid so the
/// land flag survives into the product even where the sea-ice estimate was
/// rejected.
pub fn apply_land_mask(sic: &MaskedGrid<f32>, land: &Array2<bool>, land_value: f32) -> SicResult<MaskedGrid<f32>> {
    ensure_shape("land mask", sic.dim(), land.dim())?;
    let result = sic.assign_where(land, land_value)?;
    log::debug!(
        "Land mask: {} land pixels set to {}",
        land.iter().filter(|&&l| l).count(),
        land_value
    );
    Ok(result)
}

/// Pixels holding `land_value`
pub fn land_pixels(sic: &MaskedGrid<f32>, land_value: f32) -> Array2<bool> {
    Zip::from(sic.data())
        .and(sic.mask())
        .map_collect(|&v, &m| !m && v == land_value)
}
