//! Where raw weight and height samples come from.
//!
//! There is no load cell on the development board, so the services are fed by a
//! synthetic source that jitters around a configured body.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// One raw reading, always in SI units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    pub weight_kg: f32,
    pub height_m: f32,
}

pub trait SensorSource {
    fn sample(&mut self) -> Sample;
}

/// Always returns the same reading. Useful for tests and for demo builds
/// where a stable value is easier to check on the collector.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub Sample);

impl SensorSource for FixedSource {
    fn sample(&mut self) -> Sample {
        self.0
    }
}

/// Base reading plus 0-9 kg and 0-9 cm of pseudo-random jitter.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    base: Sample,
    rng: SmallRng,
}

impl SyntheticSource {
    pub fn new(base: Sample, seed: u64) -> Self {
        Self {
            base,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl SensorSource for SyntheticSource {
    fn sample(&mut self) -> Sample {
        let weight_jitter = self.rng.gen_range(0..10u8) as f32;
        let height_jitter = self.rng.gen_range(0..10u8) as f32 / 100.0;

        Sample {
            weight_kg: self.base.weight_kg + weight_jitter,
            height_m: self.base.height_m + height_jitter,
        }
    }
}
