use crate::core::masked::MaskedGrid;
use crate::types::{ensure_shape, SicResult};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// How the 3.7 µm feature is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThermalConvention {
    /// Each class is scored against its own coefficients and the Earth-Sun
    /// angle is `2π (doy - 1) / 365`
    #[default]
    Corrected,
    /// Reproduces the historical products: the ice likelihood uses the cloud
    /// coefficients, water uses ice and cloud uses water, and the Earth-Sun
    /// angle is `(2π doy - 1) / 365`
    Reference,
}

/// Constants for turning the 3.7 µm and 11 µm brightness temperatures into a
/// 3.7 µm reflectance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalParams {
    /// In-band solar irradiance of the 3.7 µm channel
    pub solar_irradiance_37: f64,
    /// Effective-temperature offset `A` in `T_eff = A + B * T`
    pub temperature_offset: f64,
    /// Effective-temperature slope `B`
    pub temperature_slope: f64,
    /// Central wavenumber of the 3.7 µm channel (cm^-1)
    pub central_wavenumber: f64,
    /// First radiation constant, mW / (m^2 sr cm^-4)
    pub c1: f64,
    /// Second radiation constant (cm K)
    pub c2: f64,
}

impl Default for ThermalParams {
    fn default() -> Self {
        Self {
            solar_irradiance_37: 5.112,
            temperature_offset: 0.0,
            temperature_slope: 1.0,
            central_wavenumber: 2674.81,
            c1: 1.1910427e-5,
            c2: 1.438775,
        }
    }
}

impl ThermalParams {
    /// Planck radiance at the channel wavenumber for brightness temperature `bt` (K)
    pub fn planck_radiance(&self, bt: f64) -> f64 {
        let t_eff = self.temperature_offset + self.temperature_slope * bt;
        let nu = self.central_wavenumber;
        self.c1 * nu.powi(3) / ((self.c2 * nu / t_eff).exp() - 1.0)
    }
}

/// Earth-Sun angle (radians) for a day of year
pub fn earth_sun_angle(day_of_year: u32, convention: ThermalConvention) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let doy = f64::from(day_of_year);
    match convention {
        ThermalConvention::Corrected => two_pi * (doy - 1.0) / 365.0,
        ThermalConvention::Reference => (two_pi * doy - 1.0) / 365.0,
    }
}

/// Earth-Sun distance correction factor for a day of year
pub fn sun_distance_correction(day_of_year: u32, convention: ThermalConvention) -> f64 {
    let theta = earth_sun_angle(day_of_year, convention);
    1.000110
        + 0.034221 * theta.cos()
        + 0.001280 * theta.sin()
        + 0.000719 * (2.0 * theta).cos()
        + 0.000077 * (2.0 * theta).sin()
}

/// Solar part of the 3.7 µm reflectance in percent.
///
/// The emitted part at 3.7 µm is estimated from the 11 µm temperature and
/// removed; the remainder is normalised by the incoming solar radiance.
/// Pixels are invalid where any input is, or where the result is not finite
/// or falls outside [0, 100].
pub fn reflectance_37(
    tb37: &MaskedGrid<f32>,
    tb11: &MaskedGrid<f32>,
    zenith: &MaskedGrid<i32>,
    day_of_year: u32,
    convention: ThermalConvention,
    params: &ThermalParams,
) -> SicResult<MaskedGrid<f32>> {
    ensure_shape("3.7um reflectance (tb11)", tb37.dim(), tb11.dim())?;
    ensure_shape("3.7um reflectance (zenith)", tb37.dim(), zenith.dim())?;

    let dcorr = sun_distance_correction(day_of_year, convention);
    log::debug!("Sun distance correction for day {}: {:.5}", day_of_year, dcorr);

    let data = Zip::from(tb37.data())
        .and(tb11.data())
        .and(zenith.data())
        .map_collect(|&t37, &t11, &soz| {
            let n37 = params.planck_radiance(f64::from(t37));
            let n11 = params.planck_radiance(f64::from(t11));
            let sollum = dcorr * params.solar_irradiance_37 * f64::from(soz).to_radians().cos();
            (100.0 * (n37 - n11) / (sollum - n11)) as f32
        });

    let mask = Zip::from(&data)
        .and(tb37.mask())
        .and(tb11.mask())
        .and(zenith.mask())
        .map_collect(|&a37, &m37, &m11, &mz| {
            m37 || m11 || mz || !a37.is_finite() || !(0.0..=100.0).contains(&a37)
        });

    MaskedGrid::new(data, mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_sun_distance_correction() {
        // perihelion in early January, aphelion in early July
        assert_relative_eq!(sun_distance_correction(1, ThermalConvention::Corrected), 1.035050, epsilon = 1e-6);
        let summer = sun_distance_correction(213, ThermalConvention::Corrected);
        assert!(summer > 0.96 && summer < 0.98);
    }

    #[test]
    fn test_reference_earth_sun_angle() {
        let two_pi = 2.0 * std::f64::consts::PI;
        assert_relative_eq!(earth_sun_angle(1, ThermalConvention::Corrected), 0.0);
        assert_relative_eq!(
            earth_sun_angle(1, ThermalConvention::Reference),
            (two_pi - 1.0) / 365.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            earth_sun_angle(213, ThermalConvention::Reference),
            (two_pi * 213.0 - 1.0) / 365.0,
            epsilon = 1e-12
        );
        // the two angles differ by (2π - 1) / 365, a few days of orbit
        let corrected = sun_distance_correction(100, ThermalConvention::Corrected);
        let reference = sun_distance_correction(100, ThermalConvention::Reference);
        assert!((corrected - reference).abs() > 1e-4);
    }

    #[test]
    fn test_planck_radiance_increases_with_temperature() {
        let params = ThermalParams::default();
        let cold = params.planck_radiance(250.0);
        let warm = params.planck_radiance(300.0);
        assert!(cold > 0.0);
        assert!(warm > cold);
    }

    #[test]
    fn test_reflectance_37() {
        let params = ThermalParams::default();
        let tb37 = MaskedGrid::from_data(array![[260.0f32, 275.0, 250.0, 270.0]]);
        let tb11 = MaskedGrid::from_data(array![[260.0f32, 260.0, 260.0, 260.0]]);
        let zenith = MaskedGrid::new(array![[60, 60, 60, 60]], array![[false, false, false, true]]).unwrap();

        let a37 = reflectance_37(&tb37, &tb11, &zenith, 213, ThermalConvention::Corrected, &params).unwrap();

        // no excess 3.7um radiance means no reflected sunlight
        assert_relative_eq!(a37.get((0, 0)).unwrap(), 0.0, epsilon = 1e-6);
        let reflected = a37.get((0, 1)).unwrap();
        assert!(reflected > 0.0 && reflected < 100.0);
        // colder at 3.7um than 11um gives a negative reflectance
        assert!(a37.is_masked((0, 2)));
        assert!(a37.is_masked((0, 3)));
    }

    #[test]
    fn test_shape_mismatch() {
        let params = ThermalParams::default();
        let tb37 = MaskedGrid::from_data(array![[260.0f32, 275.0]]);
        let tb11 = MaskedGrid::from_data(array![[260.0f32]]);
        let zenith = MaskedGrid::from_data(array![[60, 60]]);
        assert!(reflectance_37(&tb37, &tb11, &zenith, 213, ThermalConvention::Corrected, &params).is_err());
    }
}
