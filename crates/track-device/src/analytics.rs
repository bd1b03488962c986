//! Single entry point over the normalizer, aggregator and speed deriver.
//!
//! The track is normalized once and all outputs are computed from that one
//! sequence in a single pass, so segment `i` means the same pair of fixes in
//! the distance stats, the map colors and the chart.

use geo::BoundingRect as _;
use rayon::prelude::*;

use crate::{
    distance::{DistanceLimits, DistanceMetric},
    models::{ChartPoint, Fix, SpeedColorSample, TrackAnalysis, TrackBounds},
    normalizer::{self, NormalizedTrack},
    segment_metric,
    speed::{SpeedMode, SpeedSeries},
    speed_classifier::SpeedBand,
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackAnalytics {
    limits: DistanceLimits,
}

impl TrackAnalytics {
    pub fn new(limits: DistanceLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> DistanceLimits {
        self.limits
    }

    pub fn analyze(&self, fixes: impl IntoIterator<Item = Fix>) -> TrackAnalysis {
        self.analyze_normalized(normalizer::normalize(fixes))
    }

    pub fn analyze_normalized(&self, track: NormalizedTrack) -> TrackAnalysis {
        let segments = track.segment_count();
        let (distance_stats, map_speeds, chart_speeds) = segment_metric::run(
            &track,
            (
                DistanceMetric::new(self.limits),
                SpeedSeries::with_capacity(SpeedMode::Map, segments),
                SpeedSeries::with_capacity(SpeedMode::Chart, segments),
            ),
        );

        let map_speed_colors = map_speeds
            .into_iter()
            .enumerate()
            .map(|(i, speed_kmh)| SpeedColorSample {
                segment_index: i + 1,
                speed_kmh,
                color: SpeedBand::classify(speed_kmh),
            })
            .collect();

        let chart_speeds = track
            .segments()
            .zip(chart_speeds)
            .map(|((segment_index, _, curr), speed_kmh)| ChartPoint {
                segment_index,
                recorded_at: curr.recorded_at,
                speed_kmh,
            })
            .collect();

        let bounds = compute_bounds(&track);

        tracing::debug!(
            fixes = track.len(),
            total_km = distance_stats.total_km,
            used = distance_stats.used_segments,
            skipped = distance_stats.skipped_segments,
            "Analyzed track"
        );

        TrackAnalysis {
            normalized: track,
            distance_stats,
            map_speed_colors,
            chart_speeds,
            bounds,
        }
    }

    /// Analyze independent inputs in parallel. Output order matches input order.
    pub fn analyze_batch(&self, inputs: Vec<Vec<Fix>>) -> Vec<TrackAnalysis> {
        inputs
            .into_par_iter()
            .map(|fixes| self.analyze(fixes))
            .collect()
    }
}

/// Analyze with the default distance limits.
pub fn analyze(fixes: impl IntoIterator<Item = Fix>) -> TrackAnalysis {
    TrackAnalytics::default().analyze(fixes)
}

fn compute_bounds(track: &NormalizedTrack) -> Option<TrackBounds> {
    let points: geo::MultiPoint<f64> = track.iter().map(Fix::point).collect();
    points.bounding_rect().map(|rect| TrackBounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lon: rect.min().x,
        max_lon: rect.max().x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{distance, speed};
    use time::{Duration, OffsetDateTime, macros::datetime};

    const T0: OffsetDateTime = datetime!(2024-03-01 12:00:00 UTC);

    fn lat_for_km(km: f64) -> f64 {
        (km / crate::geo_math::EARTH_RADIUS_KM).to_degrees()
    }

    fn fix_at(seconds: i64, lat: f64, lon: f64) -> Fix {
        Fix::new(lat, lon, T0 + Duration::seconds(seconds))
    }

    fn sample_fixes() -> Vec<Fix> {
        vec![
            fix_at(120, lat_for_km(2.0), 0.0),
            fix_at(0, 0.0, 0.0),
            fix_at(1, 0.0, 0.001),
            fix_at(60, lat_for_km(1.0), 0.0),
            fix_at(125, lat_for_km(2.002), 0.0),
            fix_at(185, lat_for_km(7.0), 0.0),
            fix_at(1200, lat_for_km(8.0), 0.0).with_speed(95.0),
        ]
    }

    #[test]
    fn test_outputs_share_one_normalized_track() {
        let analysis = analyze(sample_fixes());
        let track = normalizer::normalize(sample_fixes());

        assert_eq!(analysis.normalized, track);
        assert_eq!(
            analysis.distance_stats,
            distance::aggregate(&track, DistanceLimits::default())
        );

        let map: Vec<f64> = analysis.map_speed_colors.iter().map(|s| s.speed_kmh).collect();
        assert_eq!(map, speed::derive_speeds(&track, SpeedMode::Map));

        let chart: Vec<f64> = analysis.chart_speeds.iter().map(|s| s.speed_kmh).collect();
        assert_eq!(chart, speed::derive_speeds(&track, SpeedMode::Chart));
    }

    #[test]
    fn test_segment_indexing_and_colors() {
        let analysis = analyze(sample_fixes());
        let segments = analysis.normalized.segment_count();

        assert_eq!(analysis.map_speed_colors.len(), segments);
        assert_eq!(analysis.chart_speeds.len(), segments);

        for (i, (map, chart)) in analysis
            .map_speed_colors
            .iter()
            .zip(&analysis.chart_speeds)
            .enumerate()
        {
            assert_eq!(map.segment_index, i + 1);
            assert_eq!(chart.segment_index, i + 1);
            assert_eq!(chart.recorded_at, analysis.normalized[i + 1].recorded_at);
            assert_eq!(map.color, SpeedBand::classify(map.speed_kmh));
        }

        let last = analysis.map_speed_colors.last().unwrap();
        assert_eq!(last.speed_kmh, 95.0);
        assert_eq!(last.color, SpeedBand::Red);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut reversed = sample_fixes();
        reversed.reverse();
        // ties aside, any permutation normalizes identically
        assert_eq!(analyze(sample_fixes()), analyze(reversed));
    }

    #[test]
    fn test_empty_input() {
        let analysis = analyze(Vec::new());

        assert!(analysis.normalized.is_empty());
        assert_eq!(analysis.distance_stats.total_km, 0.0);
        assert!(analysis.map_speed_colors.is_empty());
        assert!(analysis.chart_speeds.is_empty());
        assert!(analysis.bounds.is_none());
    }

    #[test]
    fn test_bounds() {
        let analysis = analyze(vec![
            fix_at(0, -34.60, -58.40),
            fix_at(60, -34.58, -58.38),
            fix_at(120, -34.61, -58.37),
        ]);
        let bounds = analysis.bounds.unwrap();

        assert_eq!(bounds.min_lat, -34.61);
        assert_eq!(bounds.max_lat, -34.58);
        assert_eq!(bounds.min_lon, -58.40);
        assert_eq!(bounds.max_lon, -58.37);
    }

    #[test]
    fn test_batch_preserves_order() {
        let analytics = TrackAnalytics::default();
        let inputs = vec![
            sample_fixes(),
            Vec::new(),
            vec![fix_at(0, 0.0, 0.0), fix_at(3600, lat_for_km(60.0), 0.0)],
        ];

        let results = analytics.analyze_batch(inputs.clone());
        assert_eq!(results.len(), 3);
        for (input, result) in inputs.into_iter().zip(results) {
            assert_eq!(result, analytics.analyze(input));
        }
    }
}
