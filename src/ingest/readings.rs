/// Reading series preparation.
///
/// Logger exports arrive as timestamp strings in a mix of formats: full
/// RFC 3339 with an offset, or naive "YYYY-MM-DD HH:MM[:SS]" in logger time.
/// This module parses them, checks that values are usable, enforces the
/// configured ordering policy, and applies the run's time zone adjustment.
///
/// The adjustment must be applied to every series in a run (and to the
/// calculation-time clock) or merge windows stop lining up between
/// properties, so `prepare_series` is the only entry point the pipeline uses.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Reading, SupplyError};

/// Naive layouts accepted in addition to RFC 3339. Interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

// ============================================================================
// Types
// ============================================================================

/// A reading as handed over by an upstream parser, before timestamp parsing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawReading {
    pub timestamp: String,
    pub value: f64,
}

/// What to do with a series whose timestamps go backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Fail with `UnsortedInput` at the first backwards step.
    #[default]
    Strict,
    /// Stable-sort by timestamp; equal timestamps keep their input order.
    Sort,
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses a logger timestamp into a UTC instant.
pub fn parse_timestamp(property_id: &str, text: &str) -> Result<DateTime<Utc>, SupplyError> {
    let trimmed = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .ok_or_else(|| SupplyError::MalformedTimestamp {
            property_id: property_id.to_string(),
            value: text.to_string(),
        })
}

/// Parses every timestamp in a raw series. Fails on the first bad one.
pub fn readings_from_raw(property_id: &str, raw: &[RawReading]) -> Result<Vec<Reading>, SupplyError> {
    raw.iter()
        .map(|r| parse_timestamp(property_id, &r.timestamp).map(|ts| Reading::new(ts, r.value)))
        .collect()
}

// ============================================================================
// Validation
// ============================================================================

/// Rejects NaN and infinite values, naming the first offending timestamp.
pub fn check_finite(property_id: &str, readings: &[Reading]) -> Result<(), SupplyError> {
    match readings.iter().find(|r| !r.value.is_finite()) {
        Some(bad) => Err(SupplyError::InvalidInput {
            property_id: property_id.to_string(),
            timestamp: Some(bad.timestamp),
            reason: format!("non-finite reading {}", bad.value),
        }),
        None => Ok(()),
    }
}

/// Applies the ordering policy. Duplicate timestamps are always accepted.
pub fn enforce_ordering(
    property_id: &str,
    mut readings: Vec<Reading>,
    policy: OrderingPolicy,
) -> Result<Vec<Reading>, SupplyError> {
    match policy {
        OrderingPolicy::Strict => {
            if let Some(pair) = readings.windows(2).find(|w| w[1].timestamp < w[0].timestamp) {
                return Err(SupplyError::UnsortedInput {
                    property_id: property_id.to_string(),
                    timestamp: pair[1].timestamp,
                    previous: pair[0].timestamp,
                });
            }
            Ok(readings)
        }
        OrderingPolicy::Sort => {
            readings.sort_by_key(|r| r.timestamp);
            Ok(readings)
        }
    }
}

// ============================================================================
// Time zone adjustment
// ============================================================================

/// Shifts a single instant by the run's adjustment.
///
/// Fails with `InvalidInput` instead of overflowing when the shifted instant
/// falls outside chrono's representable range.
pub fn adjust_instant(
    property_id: &str,
    instant: DateTime<Utc>,
    adjustment_minutes: i64,
) -> Result<DateTime<Utc>, SupplyError> {
    TimeDelta::try_minutes(adjustment_minutes)
        .and_then(|shift| instant.checked_add_signed(shift))
        .ok_or_else(|| SupplyError::InvalidInput {
            property_id: property_id.to_string(),
            timestamp: Some(instant),
            reason: format!("time zone adjustment of {} minutes is out of range", adjustment_minutes),
        })
}

/// Shifts every timestamp in the series by the same number of minutes.
pub fn apply_time_zone_adjustment(
    property_id: &str,
    readings: Vec<Reading>,
    adjustment_minutes: i64,
) -> Result<Vec<Reading>, SupplyError> {
    if adjustment_minutes == 0 {
        return Ok(readings);
    }
    readings
        .into_iter()
        .map(|r| {
            adjust_instant(property_id, r.timestamp, adjustment_minutes)
                .map(|ts| Reading::new(ts, r.value))
        })
        .collect()
}

/// Validates and normalizes one property's series: finite values, ordering
/// policy, then the time zone shift.
pub fn prepare_series(
    property_id: &str,
    readings: Vec<Reading>,
    policy: OrderingPolicy,
    adjustment_minutes: i64,
) -> Result<Vec<Reading>, SupplyError> {
    check_finite(property_id, &readings)?;
    let ordered = enforce_ordering(property_id, readings, policy)?;
    apply_time_zone_adjustment(property_id, ordered, adjustment_minutes)
}

// ============================================================================
// Tests
// ============================================================================
