//! Perlin noise-based altitude for simulated drives.

use noise::{NoiseFn, Perlin};

/// Generates plausible road altitude using Perlin noise.
///
/// Octaves of noise are summed (fBm) so long drives get both broad climbs
/// and small undulations.
#[derive(Debug, Clone)]
pub struct ElevationGenerator {
    perlin: Perlin,
    /// Base altitude in meters.
    base_elevation: f64,
    /// Amplitude of the variation around the base.
    height_scale: f64,
    /// Spatial frequency in cycles per degree.
    frequency: f64,
    octaves: u32,
}

impl ElevationGenerator {
    pub fn new(seed: u32) -> Self {
        Self::pampas(seed)
    }

    /// Flat plains around Buenos Aires: ~25 m with a few meters of relief.
    pub fn pampas(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base_elevation: 25.0,
            height_scale: 8.0,
            frequency: 20.0,
            octaves: 2,
        }
    }

    /// Andean foothills near Mendoza.
    pub fn cuyo(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base_elevation: 900.0,
            height_scale: 350.0,
            frequency: 8.0,
            octaves: 4,
        }
    }

    pub fn with_base_elevation(mut self, elevation: f64) -> Self {
        self.base_elevation = elevation;
        self
    }

    pub fn with_height_scale(mut self, scale: f64) -> Self {
        self.height_scale = scale;
        self
    }

    /// Altitude in meters at a coordinate. Deterministic for a given seed.
    pub fn elevation_at(&self, lat: f64, lon: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;
        let mut max_amplitude = 0.0;

        for _ in 0..self.octaves {
            total += self.perlin.get([lat * frequency, lon * frequency]) * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        self.base_elevation + (total / max_amplitude) * self.height_scale
    }
}
