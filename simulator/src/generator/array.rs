use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use trackcore::prelude::Complex32;
use trackcore::SteeringVectorTable;

/// Geometry of the uniform circular array fitted at every site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayConfig {
    pub channels: usize,
    pub radius_wavelengths: f32,
    pub step_deg: f32,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            radius_wavelengths: 0.35,
            step_deg: 1.0,
        }
    }
}

/// Array response at an arbitrary bearing, matching the calibrated table rows.
pub fn array_response(config: &ArrayConfig, bearing_deg: f64) -> Vec<Complex32> {
    let channels = config.channels.max(1);
    let theta = (bearing_deg as f32).to_radians();
    (0..channels)
        .map(|k| {
            let element = 2.0 * PI * k as f32 / channels as f32;
            let phase = 2.0 * PI * config.radius_wavelengths * (theta - element).cos();
            Complex32::from_polar(1.0, phase)
        })
        .collect()
}

/// Calibration bytes for one site, in the little-endian table format.
pub fn calibration_bytes(config: &ArrayConfig) -> anyhow::Result<Vec<u8>> {
    let table = SteeringVectorTable::circular_array(
        config.channels,
        config.radius_wavelengths,
        config.step_deg,
    )
    .context("synthesizing circular-array calibration")?;
    table.to_bytes().context("encoding circular-array calibration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_matches_table_row() {
        let config = ArrayConfig::default();
        let table = SteeringVectorTable::from_bytes(&calibration_bytes(&config).unwrap()).unwrap();
        let row = table.response(123);
        for (a, b) in array_response(&config, 123.0).iter().zip(row) {
            assert!((a - b).norm() < 1e-5);
        }
    }

    #[test]
    fn bad_step_is_reported() {
        let config = ArrayConfig {
            step_deg: 0.0,
            ..Default::default()
        };
        assert!(calibration_bytes(&config).is_err());
    }
}
