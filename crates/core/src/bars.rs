//! Bar-range selection and the interval normaliser.
//!
//! Users select the bars a variation may touch as a flat list of
//! boundaries, two per range. Before the selection reaches the generator
//! the ranges are paired up and merged into a minimal, sorted,
//! non-overlapping set by [`normalize_bar_ranges`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// BarRange
// ---------------------------------------------------------------------------

/// A closed interval `[start, end]` over bar indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarRange {
    pub start: u32,
    pub end: u32,
}

impl BarRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: u32, end: u32) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::Validation(format!(
                "Bar range start {start} is after its end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Whether `bar` lies inside this range (both bounds inclusive).
    pub fn contains(&self, bar: u32) -> bool {
        self.start <= bar && bar <= self.end
    }

    /// Merge `other` into this range if either of its bounds falls inside
    /// this range. Ranges that share exactly one boundary bar merge.
    fn coalesce(&self, other: &BarRange) -> Option<BarRange> {
        if self.contains(other.start) || self.contains(other.end) {
            Some(BarRange {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            })
        } else {
            None
        }
    }
}

impl TryFrom<(u32, u32)> for BarRange {
    type Error = CoreError;

    fn try_from((start, end): (u32, u32)) -> Result<Self, Self::Error> {
        Self::new(start, end)
    }
}

// ---------------------------------------------------------------------------
// BarSelection
// ---------------------------------------------------------------------------

/// Which bars a variation may alter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "ranges", rename_all = "snake_case")]
pub enum BarSelection {
    /// No bar restriction is applied.
    EntireTrack,
    /// Normalised, sorted, pairwise non-overlapping ranges.
    Ranges(Vec<BarRange>),
}

impl BarSelection {
    /// The restricted ranges, or `None` for the whole track.
    pub fn ranges(&self) -> Option<&[BarRange]> {
        match self {
            BarSelection::EntireTrack => None,
            BarSelection::Ranges(ranges) => Some(ranges),
        }
    }
}

// ---------------------------------------------------------------------------
// Pairing
// ---------------------------------------------------------------------------

/// Pair a flat boundary list into ranges, two consecutive entries at a time.
///
/// Odd-length lists and reversed pairs are rejected here so the normaliser
/// only ever sees well-formed input.
pub fn pair_boundaries(boundaries: &[u32]) -> Result<Vec<BarRange>, CoreError> {
    if boundaries.len() % 2 != 0 {
        return Err(CoreError::Validation(format!(
            "Bar boundaries must come in pairs, got {} values",
            boundaries.len()
        )));
    }

    boundaries
        .chunks_exact(2)
        .map(|pair| BarRange::new(pair[0], pair[1]))
        .collect()
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Merge bar ranges into the minimal sorted set covering the same bars.
///
/// The ranges are sorted by descending start and consumed from the tail,
/// so the two lowest remaining ranges are always compared next. A pair
/// coalesces into its covering range when either bound of the higher one
/// lies within the lower one (inclusive), so `(1, 2)` and `(2, 4)` become
/// `(1, 4)` while `(1, 2)` and `(3, 4)` stay apart. Otherwise the lower
/// range is final.
///
/// Callers must not pass an empty slice; doing so yields an empty result.
pub fn normalize_bar_ranges(ranges: &[BarRange]) -> Vec<BarRange> {
    let mut pending = ranges.to_vec();
    pending.sort_by(|a, b| b.start.cmp(&a.start));

    let mut merged = Vec::with_capacity(pending.len());
    let Some(mut current) = pending.pop() else {
        return merged;
    };

    while let Some(next) = pending.pop() {
        match current.coalesce(&next) {
            Some(covering) => current = covering,
            None => {
                merged.push(current);
                current = next;
            }
        }
    }

    merged.push(current);
    merged
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
