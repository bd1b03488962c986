//! Engine properties checked against synthetic drives.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use test_data::prelude::*;
use track_device::{
    TrackAnalytics, analyze,
    distance::DEFAULT_MAX_SPEED_KMH,
    normalize,
};

const SEEDS: [u64; 6] = [1, 2, 3, 17, 99, 2024];

fn drive(seed: u64, config: DriveConfig) -> SimulatedDrive {
    DriveGenerator::new(config, seed as u32)
        .unwrap()
        .generate(&mut StdRng::seed_from_u64(seed))
}

#[test]
fn normalization_is_idempotent() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let d = drive(seed, DriveConfig::default());
        let noisy = anomalies::inject(d.fixes, &AnomalyConfig::default(), &mut rng);

        let once = normalize(noisy);
        let twice = normalize(once.clone().into_inner());
        assert_eq!(once, twice, "seed {seed}");
    }
}

#[test]
fn normalized_tracks_are_ordered_and_spaced() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let d = drive(seed, DriveConfig::default());
        let mut noisy = anomalies::inject(d.fixes, &AnomalyConfig::default(), &mut rng);
        noisy.shuffle(&mut rng);
        let input_len = noisy.len();

        let track = normalize(noisy);
        assert!(track.len() <= input_len, "seed {seed}");
        assert!(track.len() >= 2, "seed {seed}");
        for w in track.windows(2) {
            assert!(w[0].recorded_at <= w[1].recorded_at, "seed {seed}");
            assert!(w[1].seconds_since(&w[0]) >= 2.0, "seed {seed}");
            assert!((w[0].lat, w[0].lon) != (w[1].lat, w[1].lon), "seed {seed}");
        }
    }
}

#[test]
fn analysis_ignores_delivery_order() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let d = drive(seed, DriveConfig::default());
        let ordered = analyze(d.fixes.clone());

        let mut shuffled = d.fixes;
        shuffled.shuffle(&mut rng);
        assert_eq!(analyze(shuffled), ordered, "seed {seed}");
    }
}

#[test]
fn retransmitted_fixes_do_not_change_analysis() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let d = drive(seed, DriveConfig::default());
        let clean = analyze(d.fixes.clone());

        let config = AnomalyConfig {
            duplicate_fraction: 0.3,
            ..AnomalyConfig::none()
        };
        let noisy = anomalies::inject(d.fixes, &config, &mut rng);
        assert_eq!(analyze(noisy), clean, "seed {seed}");
    }
}

#[test]
fn segment_outputs_share_one_track() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let d = drive(seed, DriveConfig::default());
        let analysis = analyze(anomalies::inject(d.fixes, &AnomalyConfig::default(), &mut rng));

        let segments = analysis.normalized.len().saturating_sub(1);
        let stats = analysis.distance_stats;
        assert_eq!(analysis.map_speed_colors.len(), segments);
        assert_eq!(analysis.chart_speeds.len(), segments);
        assert!(stats.used_segments as usize + stats.skipped_segments as usize <= segments);
        assert!(stats.total_km >= 0.0 && stats.total_km.is_finite());

        for (i, (map, chart)) in analysis
            .map_speed_colors
            .iter()
            .zip(&analysis.chart_speeds)
            .enumerate()
        {
            assert_eq!(map.segment_index, i + 1);
            assert_eq!(chart.segment_index, i + 1);
            assert_eq!(chart.recorded_at, analysis.normalized[i + 1].recorded_at);
        }
    }
}

#[test]
fn clean_drive_distance_tracks_ground_truth() {
    for seed in SEEDS {
        let d = drive(
            seed,
            // short enough from the center that the walk never reaches the bounds
            DriveConfig {
                distance_km: 10.0,
                start_point: Some(Region::BUENOS_AIRES.center()),
                gps_jitter_m: 0.0,
                stop_probability: 0.0,
                ..Default::default()
            },
        );
        let stats = analyze(d.fixes).distance_stats;

        assert_eq!(stats.skipped_segments, 0, "seed {seed}");
        let relative = (stats.total_km - d.path_km).abs() / d.path_km;
        assert!(relative < 1e-6, "seed {seed}: {} vs {}", stats.total_km, d.path_km);
    }
}

#[test]
fn teleports_and_gaps_are_skipped() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let d = drive(seed, DriveConfig::default());
        let clean = analyze(d.fixes.clone()).distance_stats;

        let config = AnomalyConfig {
            teleports: 2,
            gaps: 1,
            ..AnomalyConfig::none()
        };
        let noisy = analyze(anomalies::inject(d.fixes, &config, &mut rng)).distance_stats;

        assert!(noisy.skipped_segments > clean.skipped_segments, "seed {seed}");
        assert!(noisy.total_km <= clean.total_km + 1e-9, "seed {seed}");
        assert!(noisy.total_km < 2.0 * d.path_km);
    }
}

#[test]
fn batch_matches_individual_analysis() {
    let inputs: Vec<Vec<Fix>> = SEEDS
        .iter()
        .map(|&seed| drive(seed, DriveConfig::default()).fixes)
        .collect();
    let analytics = TrackAnalytics::default();

    let batch = analytics.analyze_batch(inputs.clone());
    for (input, result) in inputs.into_iter().zip(batch) {
        assert_eq!(analytics.analyze(input), result);
    }
}

#[test]
fn measured_speeds_stay_under_ceiling_for_normal_driving() {
    for seed in SEEDS {
        let d = drive(seed, DriveConfig::default());
        let analysis = analyze(d.fixes);
        assert_eq!(analysis.distance_stats.max_speed_kmh, DEFAULT_MAX_SPEED_KMH);
        assert!(
            analysis
                .map_speed_colors
                .iter()
                .all(|s| s.speed_kmh < DEFAULT_MAX_SPEED_KMH),
            "seed {seed}"
        );
    }
}
