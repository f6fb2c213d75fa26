//! Run-level aggregation of impact records.
//!
//! Produces the per-event result table, per-property totals and the grand
//! totals consumed by table renderers and spreadsheet exporters. Nothing in
//! here formats for display or writes anywhere; `to_json` is the hand-off.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{ImpactRecord, PropertyThreshold};

/// Label used in tables for an event with no regained time.
pub const STILL_OFF: &str = "still off";

// ============================================================================
// Output types
// ============================================================================

/// One row of the per-event result table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub property_id: String,
    pub lost_time: DateTime<Utc>,
    /// `None` when supply had not been restored ("still off").
    pub regained_time: Option<DateTime<Utc>>,
    pub duration_minutes: f64,
    pub cml_impact: f64,
    pub cost: f64,
}

impl ResultRow {
    /// Regained time as RFC 3339, or `STILL_OFF` for an open event.
    pub fn regained_label(&self) -> String {
        self.regained_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| STILL_OFF.to_string())
    }
}

impl From<&ImpactRecord> for ResultRow {
    fn from(record: &ImpactRecord) -> Self {
        Self {
            property_id: record.property_id.clone(),
            lost_time: record.event.lost_time,
            regained_time: record.event.regained_time,
            duration_minutes: record.event.duration_minutes,
            cml_impact: record.cml_impact,
            cost: record.cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyTotals {
    pub property_id: String,
    pub population: u64,
    pub event_count: usize,
    pub cml_impact: f64,
    pub cost: f64,
}

impl PropertyTotals {
    fn empty(property_id: &str, population: u64) -> Self {
        Self {
            property_id: property_id.to_string(),
            population,
            event_count: 0,
            cml_impact: 0.0,
            cost: 0.0,
        }
    }
}

/// Everything a calculation run hands to reporting. Rebuilt from scratch on
/// every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    /// Ordered by property id, then lost time.
    pub rows: Vec<ResultRow>,
    /// Ordered by property id.
    pub by_property: Vec<PropertyTotals>,
    pub total_cml_impact: f64,
    pub total_cost: f64,
}

impl AggregateResult {
    pub fn totals_for(&self, property_id: &str) -> Option<&PropertyTotals> {
        self.by_property.iter().find(|t| t.property_id == property_id)
    }

    /// Serializes the table and totals for exporters.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Accumulates impact records for one run.
#[derive(Debug, Default)]
pub struct Aggregator {
    totals: BTreeMap<String, PropertyTotals>,
    rows: Vec<ResultRow>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures the property appears in the totals even with no events.
    pub fn register_property(&mut self, property: &PropertyThreshold) {
        self.totals
            .entry(property.property_id.clone())
            .or_insert_with(|| PropertyTotals::empty(&property.property_id, property.population));
    }

    pub fn add(&mut self, record: &ImpactRecord) {
        let totals = self
            .totals
            .entry(record.property_id.clone())
            .or_insert_with(|| PropertyTotals::empty(&record.property_id, record.population));
        totals.event_count += 1;
        totals.cml_impact += record.cml_impact;
        totals.cost += record.cost;
        self.rows.push(ResultRow::from(record));
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a ImpactRecord>) {
        for record in records {
            self.add(record);
        }
    }

    pub fn finish(self) -> AggregateResult {
        let mut rows = self.rows;
        rows.sort_by(|a, b| {
            a.property_id
                .cmp(&b.property_id)
                .then(a.lost_time.cmp(&b.lost_time))
        });

        let by_property: Vec<PropertyTotals> = self.totals.into_values().collect();
        let total_cml_impact = by_property.iter().map(|t| t.cml_impact).sum();
        let total_cost = by_property.iter().map(|t| t.cost).sum();

        AggregateResult {
            rows,
            by_property,
            total_cml_impact,
            total_cost,
        }
    }
}

/// Aggregates a finished set of records in one call.
pub fn aggregate(records: &[ImpactRecord]) -> AggregateResult {
    let mut aggregator = Aggregator::new();
    aggregator.extend(records);
    aggregator.finish()
}

// ============================================================================
// Tests
// ============================================================================
