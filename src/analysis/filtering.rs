/// Reportable-duration filter.
///
/// Keeps merged events lasting at least `min_duration_minutes`, in order.
/// Runs after merging and never re-merges.

use crate::model::MergedInterruptionEvent;

/// Minimum reportable duration when none is configured (3 hours).
pub const DEFAULT_MIN_DURATION_MINUTES: f64 = 180.0;

/// Returns `true` if the event counts toward regulatory reporting.
pub fn is_reportable(event: &MergedInterruptionEvent, min_duration_minutes: f64) -> bool {
    event.duration_minutes >= min_duration_minutes
}

pub fn filter_reportable(
    events: Vec<MergedInterruptionEvent>,
    min_duration_minutes: f64,
) -> Vec<MergedInterruptionEvent> {
    events
        .into_iter()
        .filter(|e| is_reportable(e, min_duration_minutes))
        .collect()
}
