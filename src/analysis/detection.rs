/// Interruption detection over a classified status series.
///
/// A two-state machine walks the samples in order. Falling into
/// `OutOfSupply` records a lost time; rising back into `InSupply` closes the
/// event. The machine starts in whatever state the first sample reports and
/// emits nothing for that starting state: a series that opens out of supply
/// has no known lost time, so that leading outage is not an event.
///
/// # Open-ended events
/// An event still open at the end of the series is measured against an
/// explicit reference instant. Callers pick the policy (`LastSample` or
/// `CalculationTime`) and inject `now`, so results never depend on the wall
/// clock implicitly and tests stay deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{minutes_between, InterruptionEvent, SupplyError, SupplyStatusSample};

/// Where an open-ended interruption stops counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenEventReference {
    /// The last observed timestamp in the series.
    LastSample,
    /// The moment the calculation runs.
    CalculationTime,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DetectorState {
    InSupply,
    /// `lost_time` is `None` while still in the series' initial outage.
    OutOfSupply { lost_time: Option<DateTime<Utc>> },
}

// ---------------------------------------------------------------------------
// Reference resolution
// ---------------------------------------------------------------------------

/// Resolves the reference instant for open events.
///
/// Returns `None` for `LastSample` on an empty series.
pub fn resolve_reference(
    policy: OpenEventReference,
    samples: &[SupplyStatusSample],
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match policy {
        OpenEventReference::LastSample => samples.last().map(|s| s.timestamp),
        OpenEventReference::CalculationTime => Some(now),
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Detects raw interruptions for one property.
///
/// Events come out in discovery order (ascending `lost_time`). An open event's
/// duration runs from its lost time to `open_reference`, floored at zero.
///
/// Fails with `UnsortedInput` if a sample's timestamp precedes the previous
/// one. Equal timestamps are accepted.
pub fn detect_interruptions(
    property_id: &str,
    samples: &[SupplyStatusSample],
    open_reference: DateTime<Utc>,
) -> Result<Vec<InterruptionEvent>, SupplyError> {
    let Some(first) = samples.first() else {
        return Ok(Vec::new());
    };

    let mut state = if first.in_supply {
        DetectorState::InSupply
    } else {
        DetectorState::OutOfSupply { lost_time: None }
    };
    let mut events = Vec::new();

    for pair in samples.windows(2) {
        let (previous, sample) = (&pair[0], &pair[1]);
        if sample.timestamp < previous.timestamp {
            return Err(SupplyError::UnsortedInput {
                property_id: property_id.to_string(),
                timestamp: sample.timestamp,
                previous: previous.timestamp,
            });
        }

        state = match (state, sample.in_supply) {
            (DetectorState::InSupply, false) => DetectorState::OutOfSupply {
                lost_time: Some(sample.timestamp),
            },
            (DetectorState::OutOfSupply { lost_time }, true) => {
                if let Some(lost_time) = lost_time {
                    events.push(InterruptionEvent {
                        lost_time,
                        regained_time: Some(sample.timestamp),
                        duration_minutes: minutes_between(lost_time, sample.timestamp),
                    });
                }
                DetectorState::InSupply
            }
            (unchanged, _) => unchanged,
        };
    }

    if let DetectorState::OutOfSupply { lost_time: Some(lost_time) } = state {
        events.push(InterruptionEvent {
            lost_time,
            regained_time: None,
            duration_minutes: minutes_between(lost_time, open_reference).max(0.0),
        });
    }

    Ok(events)
}

/// Resolves the open-event reference from `policy` and detects.
pub fn detect_with_policy(
    property_id: &str,
    samples: &[SupplyStatusSample],
    policy: OpenEventReference,
    now: DateTime<Utc>,
) -> Result<Vec<InterruptionEvent>, SupplyError> {
    match resolve_reference(policy, samples, now) {
        Some(reference) => detect_interruptions(property_id, samples, reference),
        None => Ok(Vec::new()),
    }
}

/// True when the series opens out of supply. That leading outage has no
/// known start and is not reported as an event.
pub fn starts_out_of_supply(samples: &[SupplyStatusSample]) -> bool {
    samples.first().is_some_and(|s| !s.in_supply)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    /// Minute zero for every test: 2024-02-01 00:00:00 UTC.
    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    fn at(minute: i64) -> DateTime<Utc> {
        base() + Duration::minutes(minute)
    }

    fn series(points: &[(i64, bool)]) -> Vec<SupplyStatusSample> {
        points
            .iter()
            .map(|&(minute, in_supply)| SupplyStatusSample { timestamp: at(minute), in_supply })
            .collect()
    }

    // --- Closed events ------------------------------------------------------

    #[test]
    fn test_single_dip_produces_one_closed_event() {
        // T,T,F,F,T at 0,10,20,30,40
        let samples = series(&[(0, true), (10, true), (20, false), (30, false), (40, true)]);
        let events = detect_interruptions("P1", &samples, at(40)).unwrap();
        assert_eq!(
            events,
            vec![InterruptionEvent {
                lost_time: at(20),
                regained_time: Some(at(40)),
                duration_minutes: 20.0,
            }]
        );
    }

    #[test]
    fn test_multiple_dips_are_reported_in_order() {
        let samples = series(&[
            (0, true),
            (5, false),
            (15, true),
            (30, false),
            (31, false),
            (90, true),
        ]);
        let events = detect_interruptions("P1", &samples, at(90)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].lost_time, at(5));
        assert_eq!(events[0].duration_minutes, 10.0);
        assert_eq!(events[1].lost_time, at(30));
        assert_eq!(events[1].regained_time, Some(at(90)));
        assert_eq!(events[1].duration_minutes, 60.0);
    }

    #[test]
    fn test_irregular_sampling_uses_actual_timestamps() {
        let samples = series(&[(0, true), (7, false), (8, false), (133, true)]);
        let events = detect_interruptions("P1", &samples, at(133)).unwrap();
        assert_eq!(events[0].duration_minutes, 126.0);
    }

    #[test]
    fn test_continuous_supply_produces_no_events() {
        let samples = series(&[(0, true), (15, true), (30, true)]);
        assert!(detect_interruptions("P1", &samples, at(30)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_series_produces_no_events() {
        assert!(detect_interruptions("P1", &[], at(0)).unwrap().is_empty());
    }

    // --- Initial state ------------------------------------------------------

    #[test]
    fn test_leading_outage_is_not_an_event() {
        let samples = series(&[(0, false), (10, false), (20, true), (30, true)]);
        assert!(starts_out_of_supply(&samples));
        assert!(
            detect_interruptions("P1", &samples, at(30)).unwrap().is_empty(),
            "an outage already in progress at the first sample has no lost time"
        );
    }

    #[test]
    fn test_series_never_in_supply_produces_no_events() {
        let samples = series(&[(0, false), (10, false)]);
        assert!(detect_interruptions("P1", &samples, at(10)).unwrap().is_empty());
    }

    // --- Open events --------------------------------------------------------

    #[test]
    fn test_open_event_measured_to_last_sample() {
        let samples = series(&[(0, true), (20, false), (50, false)]);
        let events = detect_with_policy("P1", &samples, OpenEventReference::LastSample, at(500)).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_open());
        assert_eq!(events[0].duration_minutes, 30.0);
    }

    #[test]
    fn test_open_event_measured_to_calculation_time() {
        let samples = series(&[(0, true), (20, false), (50, false)]);
        let events =
            detect_with_policy("P1", &samples, OpenEventReference::CalculationTime, at(500)).unwrap();
        assert_eq!(events[0].duration_minutes, 480.0);
    }

    #[test]
    fn test_reference_before_lost_time_floors_at_zero() {
        let samples = series(&[(0, true), (20, false)]);
        let events = detect_interruptions("P1", &samples, at(10)).unwrap();
        assert_eq!(events[0].duration_minutes, 0.0);
    }

    #[test]
    fn test_resolve_reference_last_sample_on_empty_series() {
        assert_eq!(resolve_reference(OpenEventReference::LastSample, &[], at(0)), None);
        assert_eq!(
            resolve_reference(OpenEventReference::CalculationTime, &[], at(3)),
            Some(at(3))
        );
    }

    // --- Ordering -----------------------------------------------------------

    #[test]
    fn test_backwards_timestamp_fails_fast() {
        let samples = series(&[(0, true), (20, false), (10, true)]);
        let result = detect_interruptions("P7", &samples, at(20));
        assert_eq!(
            result,
            Err(SupplyError::UnsortedInput {
                property_id: "P7".to_string(),
                timestamp: at(10),
                previous: at(20),
            })
        );
    }

    #[test]
    fn test_duplicate_timestamps_are_tolerated() {
        let samples = series(&[(0, true), (10, false), (10, true), (20, true)]);
        let events = detect_interruptions("P1", &samples, at(20)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration_minutes, 0.0);
    }

    #[test]
    fn test_reference_policy_parses_from_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: OpenEventReference,
        }
        let parsed: Wrapper = toml::from_str("policy = \"calculation_time\"").unwrap();
        assert_eq!(parsed.policy, OpenEventReference::CalculationTime);
    }
}
