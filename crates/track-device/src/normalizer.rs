//! Sorting and de-duplication of raw fixes.

use std::ops::Deref;

use serde::Serialize;

use crate::models::Fix;

/// Minimum spacing between two kept fixes, in seconds.
pub const MIN_FIX_SPACING_SECONDS: f64 = 2.0;

/// Fixes ordered by time with near-duplicates removed.
///
/// Only [`normalize`] builds one, so every consumer of a `NormalizedTrack`
/// can rely on the ordering and spacing invariants without re-checking them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedTrack(Vec<Fix>);

impl NormalizedTrack {
    pub fn fixes(&self) -> &[Fix] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Fix> {
        self.0
    }

    /// Consecutive pairs as `(segment_index, prev, curr)`, indexed from 1.
    pub fn segments(&self) -> impl Iterator<Item = (usize, &Fix, &Fix)> + '_ {
        self.0
            .windows(2)
            .enumerate()
            .map(|(i, pair)| (i + 1, &pair[0], &pair[1]))
    }

    pub fn segment_count(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

impl Deref for NormalizedTrack {
    type Target = [Fix];

    fn deref(&self) -> &[Fix] {
        &self.0
    }
}

/// Sort fixes by time and drop near-duplicates.
///
/// A fix is dropped when it is less than [`MIN_FIX_SPACING_SECONDS`] after the
/// last kept fix, or sits on exactly the same coordinates as it.
pub fn normalize(fixes: impl IntoIterator<Item = Fix>) -> NormalizedTrack {
    let mut sorted: Vec<Fix> = fixes.into_iter().collect();
    // stable: equal timestamps keep their input order
    sorted.sort_by_key(|fix| fix.recorded_at);

    let input_len = sorted.len();
    let mut kept: Vec<Fix> = Vec::with_capacity(input_len);

    for fix in sorted {
        let Some(prev) = kept.last() else {
            kept.push(fix);
            continue;
        };

        let dt = fix.seconds_since(prev);
        let same_position = fix.lat == prev.lat && fix.lon == prev.lon;
        if dt < MIN_FIX_SPACING_SECONDS || same_position {
            continue;
        }
        kept.push(fix);
    }

    tracing::debug!(
        input = input_len,
        kept = kept.len(),
        dropped = input_len - kept.len(),
        "Normalized track"
    );

    NormalizedTrack(kept)
}
