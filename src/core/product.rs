use crate::core::composition::land_pixels;
use crate::core::masked::MaskedGrid;
use crate::types::{ensure_shape, SicResult};
use chrono::{DateTime, Utc};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Fill value for invalid samples in the written product
pub const FILL_VALUE: f32 = -32767.0;

/// Name, units and fill value of a gridded output variable
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductVariable {
    pub name: &'static str,
    pub units: &'static str,
    pub fill_value: f32,
}

pub const ICE_CONC: ProductVariable = ProductVariable {
    name: "ice_conc",
    units: "%",
    fill_value: FILL_VALUE,
};

pub const LATITUDE: ProductVariable = ProductVariable {
    name: "lat",
    units: "degrees_north",
    fill_value: FILL_VALUE,
};

pub const LONGITUDE: ProductVariable = ProductVariable {
    name: "lon",
    units: "degrees_east",
    fill_value: FILL_VALUE,
};

/// Output file name, e.g. `avhrr_noaa18_iceconc_20080710_1342_arctic.nc`
pub fn compose_filename(sensor: &str, timestamp: &DateTime<Utc>) -> String {
    format!("{}_iceconc_{}_arctic.nc", sensor, timestamp.format("%Y%m%d_%H%M"))
}

/// Summary of a concentration product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductStatistics {
    pub total_pixels: usize,
    pub valid_pixels: usize,
    pub land_pixels: usize,
    /// Valid sea pixels at 0 %
    pub open_water_pixels: usize,
    /// Valid sea pixels above 0 %
    pub ice_pixels: usize,
    /// Mean concentration over valid sea pixels
    pub mean_concentration: Option<f32>,
}

/// Sea-ice concentration for one satellite pass, ready to be written
#[derive(Debug, Clone)]
pub struct SicProduct {
    pub sensor: String,
    pub timestamp: DateTime<Utc>,
    pub ice_conc: MaskedGrid<f32>,
    pub latitude: MaskedGrid<f32>,
    pub longitude: MaskedGrid<f32>,
    pub land_value: f32,
}

impl SicProduct {
    pub fn new(
        sensor: impl Into<String>,
        timestamp: DateTime<Utc>,
        ice_conc: MaskedGrid<f32>,
        latitude: MaskedGrid<f32>,
        longitude: MaskedGrid<f32>,
        land_value: f32,
    ) -> SicResult<Self> {
        ensure_shape("product (latitude)", ice_conc.dim(), latitude.dim())?;
        ensure_shape("product (longitude)", ice_conc.dim(), longitude.dim())?;
        Ok(Self {
            sensor: sensor.into(),
            timestamp,
            ice_conc,
            latitude,
            longitude,
            land_value,
        })
    }

    pub fn filename(&self) -> String {
        compose_filename(&self.sensor, &self.timestamp)
    }

    /// Concentration with invalid samples set to [`FILL_VALUE`]
    pub fn filled(&self) -> Array2<f32> {
        self.ice_conc.filled(ICE_CONC.fill_value)
    }

    pub fn filled_latitude(&self) -> Array2<f32> {
        self.latitude.filled(LATITUDE.fill_value)
    }

    pub fn filled_longitude(&self) -> Array2<f32> {
        self.longitude.filled(LONGITUDE.fill_value)
    }

    pub fn statistics(&self) -> ProductStatistics {
        let land = land_pixels(&self.ice_conc, self.land_value);
        let mut stats = ProductStatistics {
            total_pixels: self.ice_conc.len(),
            valid_pixels: self.ice_conc.valid_count(),
            land_pixels: land.iter().filter(|&&l| l).count(),
            ..ProductStatistics::default()
        };

        let mut sum = 0.0f64;
        Zip::from(self.ice_conc.data())
            .and(self.ice_conc.mask())
            .and(&land)
            .for_each(|&v, &m, &l| {
                if m || l {
                    return;
                }
                if v > 0.0 {
                    stats.ice_pixels += 1;
                } else {
                    stats.open_water_pixels += 1;
                }
                sum += f64::from(v);
            });

        let sea = stats.ice_pixels + stats.open_water_pixels;
        if sea > 0 {
            stats.mean_concentration = Some((sum / sea as f64) as f32);
        }
        stats
    }
}
