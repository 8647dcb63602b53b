//! Detect overlaps between a candidate window and the windows a service already has.
//!
//! Intervals are half-open: `[start, end)`. Adjacent windows (one ends exactly
//! when the other starts) do NOT overlap, so back-to-back windows are legal.

use chrono::{DateTime, Utc};

use crate::error::{AvailabilityError, Result};
use crate::model::{AvailabilityWindow, WindowId};

/// A half-open `[start, end)` time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether the range contains no instant at all.
    pub fn is_degenerate(&self) -> bool {
        self.start >= self.end
    }

    /// Two ranges overlap iff `a.start < b.end && b.start < a.end`.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl From<&AvailabilityWindow> for TimeRange {
    fn from(window: &AvailabilityWindow) -> Self {
        Self::new(window.start_time(), window.end_time())
    }
}

/// An existing window the candidate collides with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub window_id: WindowId,
    pub overlap_minutes: i64,
}

/// Find every existing window the candidate overlaps.
///
/// The overlap duration is `min(a.end, b.end) - max(a.start, b.start)`.
/// Results follow the order of `existing`.
pub fn find_overlaps(candidate: &TimeRange, existing: &[AvailabilityWindow]) -> Vec<Overlap> {
    existing
        .iter()
        .filter_map(|window| {
            let range = TimeRange::from(window);
            if !candidate.overlaps(&range) {
                return None;
            }
            let overlap_start = candidate.start.max(range.start);
            let overlap_end = candidate.end.min(range.end);
            Some(Overlap {
                window_id: window.id(),
                overlap_minutes: (overlap_end - overlap_start).num_minutes(),
            })
        })
        .collect()
}

/// Decide whether `candidate` may be admitted next to `existing`.
///
/// The order of `existing` is irrelevant. When several windows conflict, the
/// one that starts earliest (then lowest id) is reported, so the answer is the
/// same regardless of how the store happened to return them.
///
/// # Errors
/// Returns `AvailabilityError::InvalidTimeFormat` if the candidate is empty or
/// inverted (checked before any comparison), and
/// `AvailabilityError::OverlappingWindow` if it intersects any existing window.
pub fn check_admissible(candidate: &TimeRange, existing: &[AvailabilityWindow]) -> Result<()> {
    if candidate.is_degenerate() {
        return Err(AvailabilityError::InvalidTimeFormat(format!(
            "window start {} must be before end {}",
            candidate.start.format("%H:%M"),
            candidate.end.format("%H:%M")
        )));
    }

    let conflict = existing
        .iter()
        .filter(|window| candidate.overlaps(&TimeRange::from(*window)))
        .min_by_key(|window| (window.start_time(), window.id()));

    match conflict {
        Some(window) => Err(AvailabilityError::OverlappingWindow {
            conflicting: window.id(),
        }),
        None => Ok(()),
    }
}
