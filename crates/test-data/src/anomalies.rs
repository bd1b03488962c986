//! Device faults layered on top of a clean drive.
//!
//! Each injector models one way real devices misreport: retransmitted
//! fixes, position jumps, silent periods and out-of-order delivery.

use rand::{Rng, seq::SliceRandom};
use time::Duration;
use track_device::Fix;

/// How far a teleported fix is thrown, in degrees of latitude (~55 km).
pub const TELEPORT_DEGREES: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct AnomalyConfig {
    /// Fraction of fixes retransmitted within the same second
    pub duplicate_fraction: f64,
    pub teleports: usize,
    pub gaps: usize,
    pub gap_hours: f64,
    /// Deliver fixes in random order
    pub shuffle: bool,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            duplicate_fraction: 0.05,
            teleports: 1,
            gaps: 0,
            gap_hours: 5.0,
            shuffle: true,
        }
    }
}

impl AnomalyConfig {
    pub fn none() -> Self {
        Self {
            duplicate_fraction: 0.0,
            teleports: 0,
            gaps: 0,
            gap_hours: 0.0,
            shuffle: false,
        }
    }
}

/// Apply every configured anomaly. `fixes` must be time-ordered.
pub fn inject(mut fixes: Vec<Fix>, config: &AnomalyConfig, rng: &mut impl Rng) -> Vec<Fix> {
    add_gaps(&mut fixes, config.gaps, config.gap_hours, rng);
    add_teleports(&mut fixes, config.teleports, rng);
    add_duplicates(&mut fixes, config.duplicate_fraction, rng);
    if config.shuffle {
        fixes.shuffle(rng);
    }
    fixes
}

/// Re-send a fraction of fixes at the same position, under a second later.
pub fn add_duplicates(fixes: &mut Vec<Fix>, fraction: f64, rng: &mut impl Rng) {
    let mut copies = Vec::new();
    for fix in fixes.iter() {
        if rng.r#gen::<f64>() < fraction {
            copies.push(Fix {
                recorded_at: fix.recorded_at + Duration::milliseconds(rng.gen_range(0..1000)),
                ..*fix
            });
        }
    }
    fixes.extend(copies);
}

/// Throw interior fixes far away, producing implausibly fast segments.
pub fn add_teleports(fixes: &mut [Fix], count: usize, rng: &mut impl Rng) {
    if fixes.len() < 3 {
        return;
    }
    for _ in 0..count {
        let i = rng.gen_range(1..fixes.len() - 1);
        let lat = fixes[i].lat + TELEPORT_DEGREES;
        fixes[i].lat = if lat > 90.0 { lat - 2.0 * TELEPORT_DEGREES } else { lat };
    }
}

/// Shift everything after a random point later by `hours`, opening a gap.
pub fn add_gaps(fixes: &mut [Fix], count: usize, hours: f64, rng: &mut impl Rng) {
    if fixes.len() < 2 {
        return;
    }
    let shift = Duration::seconds_f64(hours * 3600.0);
    for _ in 0..count {
        let at = rng.gen_range(1..fixes.len());
        for fix in &mut fixes[at..] {
            fix.recorded_at += shift;
        }
    }
}
