/// Core data types for the supply interruption service.
///
/// This module defines the shared domain model imported by all other modules:
/// readings, per-property thresholds, the event types produced by each
/// pipeline stage, and the error type. It contains no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A single pressure (or flow) sample from a logger.
///
/// Series are expected in ascending timestamp order. Duplicate timestamps
/// are kept as-is and sampling intervals may be irregular.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A reportable property and the head it needs to be considered in supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyThreshold {
    pub property_id: String,
    /// Ground elevation (or storey height) of the property, in metres head.
    #[serde(alias = "elevation_or_height")]
    pub elevation: f64,
    /// Number of customers at the property.
    #[serde(alias = "population_count")]
    pub population: u64,
}

// ---------------------------------------------------------------------------
// Derived types
// ---------------------------------------------------------------------------

/// Supply adequacy at one reading timestamp, for one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupplyStatusSample {
    pub timestamp: DateTime<Utc>,
    pub in_supply: bool,
}

/// A raw interruption found by the edge detector.
///
/// `regained_time` is `None` when supply had not been restored by the end of
/// the observed series ("still off").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterruptionEvent {
    pub lost_time: DateTime<Utc>,
    pub regained_time: Option<DateTime<Utc>>,
    pub duration_minutes: f64,
}

impl InterruptionEvent {
    pub fn is_open(&self) -> bool {
        self.regained_time.is_none()
    }
}

/// One or more interruptions coalesced across short restoration gaps.
///
/// The duration spans the first `lost_time` to the last `regained_time`,
/// restoration windows included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedInterruptionEvent {
    pub lost_time: DateTime<Utc>,
    pub regained_time: Option<DateTime<Utc>>,
    pub duration_minutes: f64,
    /// How many raw interruptions were folded into this one.
    pub constituent_count: usize,
}

impl MergedInterruptionEvent {
    pub fn is_open(&self) -> bool {
        self.regained_time.is_none()
    }
}

impl From<&InterruptionEvent> for MergedInterruptionEvent {
    fn from(event: &InterruptionEvent) -> Self {
        Self {
            lost_time: event.lost_time,
            regained_time: event.regained_time,
            duration_minutes: event.duration_minutes,
            constituent_count: 1,
        }
    }
}

/// Regulatory impact of one reportable event at one property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactRecord {
    pub property_id: String,
    /// Population the impact was calculated for.
    pub population: u64,
    pub event: MergedInterruptionEvent,
    pub cml_impact: f64,
    pub cost: f64,
}

/// Elapsed minutes from `from` to `to`, with sub-minute precision.
/// Negative if `to` precedes `from`.
pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while configuring or running the interruption pipeline.
///
/// An empty reading series is not an error: it produces zero events.
#[derive(Debug, Clone, PartialEq)]
pub enum SupplyError {
    /// Missing or contradictory threshold, offset or pipeline parameters.
    InvalidConfiguration(String),
    /// A reading's timestamp precedes the one before it.
    UnsortedInput {
        property_id: String,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
    /// A timestamp string could not be parsed into an instant.
    MalformedTimestamp { property_id: String, value: String },
    /// A value that cannot be used in a calculation (non-finite reading,
    /// negative duration or population).
    InvalidInput {
        property_id: String,
        timestamp: Option<DateTime<Utc>>,
        reason: String,
    },
}

impl SupplyError {
    /// The property the error relates to, when there is one.
    pub fn property_id(&self) -> Option<&str> {
        match self {
            SupplyError::InvalidConfiguration(_) => None,
            SupplyError::UnsortedInput { property_id, .. }
            | SupplyError::MalformedTimestamp { property_id, .. }
            | SupplyError::InvalidInput { property_id, .. } => Some(property_id),
        }
    }
}

impl std::fmt::Display for SupplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupplyError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            SupplyError::UnsortedInput { property_id, timestamp, previous } => write!(
                f,
                "Unsorted input for property {}: {} follows {}",
                property_id,
                timestamp.to_rfc3339(),
                previous.to_rfc3339()
            ),
            SupplyError::MalformedTimestamp { property_id, value } => {
                write!(f, "Malformed timestamp for property {}: '{}'", property_id, value)
            }
            SupplyError::InvalidInput { property_id, timestamp, reason } => match timestamp {
                Some(ts) => write!(
                    f,
                    "Invalid input for property {} at {}: {}",
                    property_id,
                    ts.to_rfc3339(),
                    reason
                ),
                None => write!(f, "Invalid input for property {}: {}", property_id, reason),
            },
        }
    }
}

impl std::error::Error for SupplyError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
