use crate::{models::Fix, normalizer::NormalizedTrack};

/// A computation fed one segment at a time, in track order.
pub trait SegmentMetric {
    type Output;
    fn next_segment(&mut self, index: usize, prev: &Fix, curr: &Fix);
    fn finish(self) -> Self::Output;
}

/// Feed every segment of `track` to `metric`.
pub fn run<M: SegmentMetric>(track: &NormalizedTrack, mut metric: M) -> M::Output {
    for (index, prev, curr) in track.segments() {
        metric.next_segment(index, prev, curr);
    }
    metric.finish()
}

impl<A: SegmentMetric, B: SegmentMetric> SegmentMetric for (A, B) {
    type Output = (A::Output, B::Output);

    fn next_segment(&mut self, index: usize, prev: &Fix, curr: &Fix) {
        self.0.next_segment(index, prev, curr);
        self.1.next_segment(index, prev, curr);
    }

    fn finish(self) -> Self::Output {
        (self.0.finish(), self.1.finish())
    }
}

impl<A: SegmentMetric, B: SegmentMetric, C: SegmentMetric> SegmentMetric for (A, B, C) {
    type Output = (A::Output, B::Output, C::Output);

    fn next_segment(&mut self, index: usize, prev: &Fix, curr: &Fix) {
        self.0.next_segment(index, prev, curr);
        self.1.next_segment(index, prev, curr);
        self.2.next_segment(index, prev, curr);
    }

    fn finish(self) -> Self::Output {
        (self.0.finish(), self.1.finish(), self.2.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use time::{Duration, macros::datetime};

    #[derive(Default)]
    struct Indices(Vec<usize>);

    impl SegmentMetric for Indices {
        type Output = Vec<usize>;

        fn next_segment(&mut self, index: usize, _prev: &Fix, _curr: &Fix) {
            self.0.push(index);
        }

        fn finish(self) -> Vec<usize> {
            self.0
        }
    }

    #[test]
    fn test_tuple_metrics_see_same_segments() {
        let t0 = datetime!(2024-03-01 12:00:00 UTC);
        let track = normalize((0..4).map(|i| {
            Fix::new(0.01 * i as f64, 0.0, t0 + Duration::seconds(10 * i))
        }));

        let (a, b) = run(&track, (Indices::default(), Indices::default()));
        assert_eq!(a, vec![1, 2, 3]);
        assert_eq!(a, b);
    }
}
