/// Gap-based merging of interruptions.
///
/// Pressure often flickers back above threshold for a few minutes during a
/// real outage. Events whose restoration gap is at most `merge_gap_minutes`
/// are folded into one, and the merged duration covers the whole span
/// including the brief restorations.
///
/// Merging is a left fold over the events in order. An open event has no
/// restoration, so nothing after it can merge into it.

use crate::model::{minutes_between, InterruptionEvent, MergedInterruptionEvent};

/// Restoration window treated as noise when none is configured.
pub const DEFAULT_MERGE_GAP_MINUTES: f64 = 60.0;

/// Merges raw interruptions for one property.
pub fn merge_events(
    events: &[InterruptionEvent],
    merge_gap_minutes: f64,
) -> Vec<MergedInterruptionEvent> {
    let lifted: Vec<MergedInterruptionEvent> =
        events.iter().map(MergedInterruptionEvent::from).collect();
    merge_merged(&lifted, merge_gap_minutes)
}

/// Merges already-merged events. Same rules as `merge_events`.
pub fn merge_merged(
    events: &[MergedInterruptionEvent],
    merge_gap_minutes: f64,
) -> Vec<MergedInterruptionEvent> {
    let mut merged = Vec::with_capacity(events.len());
    let mut remaining = events.iter().cloned();

    let Some(mut current) = remaining.next() else {
        return merged;
    };

    for next in remaining {
        match restoration_gap(&current, &next) {
            Some(gap) if gap <= merge_gap_minutes => absorb(&mut current, next),
            _ => merged.push(std::mem::replace(&mut current, next)),
        }
    }
    merged.push(current);
    merged
}

/// Minutes between `current` being restored and `next` being lost.
/// `None` (unbounded) when `current` is still open.
pub fn restoration_gap(
    current: &MergedInterruptionEvent,
    next: &MergedInterruptionEvent,
) -> Option<f64> {
    current
        .regained_time
        .map(|regained| minutes_between(regained, next.lost_time))
}

fn absorb(current: &mut MergedInterruptionEvent, next: MergedInterruptionEvent) {
    current.duration_minutes = match next.regained_time {
        Some(regained) => minutes_between(current.lost_time, regained),
        // open: next's duration already runs to the reference instant
        None => minutes_between(current.lost_time, next.lost_time) + next.duration_minutes,
    };
    current.regained_time = next.regained_time;
    current.constituent_count += next.constituent_count;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
