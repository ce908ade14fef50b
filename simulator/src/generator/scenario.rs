use crate::generator::array::{array_response, ArrayConfig};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use trackcore::math::PlanarPoint;
use trackcore::prelude::{Complex32, SiteId};
use trackcore::{InMemoryRecordSet, SignalRecord, Site};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: SiteId,
    pub name: String,
    pub x: f64,
    pub y: f64,
}

impl SiteConfig {
    pub fn to_site(&self) -> Site {
        Site::new(self.id, self.name.clone(), PlanarPoint::new(self.x, self.y))
    }
}

/// Emitter starting at `(x, y)` and moving at a constant velocity in m/s.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            x: 900.0,
            y: 700.0,
            vx: 4.0,
            vy: -2.0,
        }
    }
}

impl EmitterConfig {
    pub fn position_at(&self, timestamp: f64) -> PlanarPoint {
        PlanarPoint::new(self.x + self.vx * timestamp, self.y + self.vy * timestamp)
    }
}

/// Synthetic pulse train seen by every site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub sites: Vec<SiteConfig>,
    pub emitter: EmitterConfig,
    pub pulses: usize,
    /// Seconds between pulses.
    pub pulse_interval: f64,
    /// Uniform noise bound per I/Q component, relative to unit signal amplitude.
    pub noise: f32,
    /// Lowest quality score drawn for a pulse; scores are uniform up to 1.
    pub quality_floor: f64,
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            sites: vec![
                SiteConfig {
                    id: 1,
                    name: "west".into(),
                    x: 0.0,
                    y: 0.0,
                },
                SiteConfig {
                    id: 2,
                    name: "east".into(),
                    x: 2000.0,
                    y: 0.0,
                },
                SiteConfig {
                    id: 3,
                    name: "north".into(),
                    x: 1000.0,
                    y: 1800.0,
                },
            ],
            emitter: EmitterConfig::default(),
            pulses: 50,
            pulse_interval: 0.2,
            noise: 0.05,
            quality_floor: 0.3,
            seed: 7,
        }
    }
}

impl ScenarioConfig {
    pub fn site_ids(&self) -> Vec<SiteId> {
        self.sites.iter().map(|s| s.id).collect()
    }
}

/// Pulses received at each site from the moving emitter, with per-pulse
/// amplitude, carrier phase, noise and quality drawn from a seeded generator.
pub fn build_records(scenario: &ScenarioConfig, array: &ArrayConfig) -> InMemoryRecordSet {
    let mut rng = StdRng::seed_from_u64(scenario.seed);
    let mut records = InMemoryRecordSet::new();
    let noise = scenario.noise.abs();
    let floor = scenario.quality_floor.clamp(0.0, 1.0);

    for pulse in 0..scenario.pulses {
        let timestamp = pulse as f64 * scenario.pulse_interval;
        let emitter = scenario.emitter.position_at(timestamp);
        let amplitude: f32 = rng.gen_range(0.5..1.5);

        for site in &scenario.sites {
            let bearing = site.to_site().location.bearing_to(&emitter);
            let carrier = Complex32::from_polar(amplitude, rng.gen_range(0.0..std::f32::consts::TAU));
            let channels = array_response(array, bearing)
                .into_iter()
                .map(|value| {
                    let jitter = if noise > 0.0 {
                        Complex32::new(rng.gen_range(-noise..noise), rng.gen_range(-noise..noise))
                    } else {
                        Complex32::new(0.0, 0.0)
                    };
                    value * carrier + jitter
                })
                .collect();
            let quality = if floor < 1.0 { rng.gen_range(floor..=1.0) } else { 1.0 };
            let external_id = ((pulse as u64) << 16) | site.id as u64;
            records.insert(SignalRecord::new(site.id, timestamp, channels, quality, external_id));
        }
    }
    records
}
