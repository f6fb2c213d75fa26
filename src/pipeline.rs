//! Calculation run orchestration.
//!
//! One run takes a configuration, one reading series per property and an
//! injected "now", and produces the impact table and totals:
//!
//! ```text
//! readings → status samples → raw events → merged → reportable → impact → totals
//! ```
//!
//! Each property runs independently. A malformed series aborts that
//! property's pipeline (no partial results) and is reported in
//! `RunReport::failures`; other properties carry on. Only an invalid
//! configuration fails the whole run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::detection::{detect_with_policy, starts_out_of_supply, OpenEventReference};
use crate::analysis::filtering::filter_reportable;
use crate::analysis::merging::merge_events;
use crate::analysis::status::{build_classifier, classify_series, SupplyClassifier};
use crate::config::SupplyConfig;
use crate::impact::aggregate::{AggregateResult, Aggregator};
use crate::impact::cml::{impact_records, ImpactConstants};
use crate::ingest::readings::{adjust_instant, prepare_series, readings_from_raw, OrderingPolicy, RawReading};
use crate::logging::{self, Stage};
use crate::model::{ImpactRecord, MergedInterruptionEvent, PropertyThreshold, Reading, SupplyError};
use crate::properties::PropertyRegistry;

// ============================================================================
// Run context
// ============================================================================

/// Validated, ready-to-use parameters for one run. Built from a
/// `SupplyConfig` and passed by reference to every property's pipeline.
pub struct RunContext {
    classifier: Box<dyn SupplyClassifier>,
    pub open_event_reference: OpenEventReference,
    pub merge_gap_minutes: f64,
    pub min_duration_minutes: f64,
    pub ordering: OrderingPolicy,
    pub time_zone_adjustment_minutes: i64,
    pub constants: ImpactConstants,
}

impl RunContext {
    pub fn from_config(config: &SupplyConfig) -> Result<Self, SupplyError> {
        config.validate()?;
        Ok(Self {
            classifier: build_classifier(&config.classification)?,
            open_event_reference: config.events.open_event_reference()?,
            merge_gap_minutes: config.events.merge_gap_minutes,
            min_duration_minutes: config.events.min_duration_minutes,
            ordering: config.events.ordering,
            time_zone_adjustment_minutes: config.time.time_zone_adjustment_minutes,
            constants: ImpactConstants::from(&config.impact),
        })
    }

    pub fn classifier(&self) -> &dyn SupplyClassifier {
        self.classifier.as_ref()
    }
}

// ============================================================================
// Results
// ============================================================================

/// Output of one property's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyResult {
    pub property_id: String,
    pub raw_event_count: usize,
    /// Every merged event, reportable or not.
    pub merged_events: Vec<MergedInterruptionEvent>,
    /// One record per reportable event.
    pub records: Vec<ImpactRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyFailure {
    pub property_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub properties_total: usize,
    pub properties_succeeded: usize,
    pub properties_failed: usize,
    pub raw_events: usize,
    pub merged_events: usize,
    pub reportable_events: usize,
    /// Series supplied for ids that are not configured properties.
    pub unmatched_series: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub result: AggregateResult,
    pub properties: Vec<PropertyResult>,
    pub failures: Vec<PropertyFailure>,
    pub summary: RunSummary,
}

// ============================================================================
// Per-property pipeline
// ============================================================================

fn at_stage<T>(stage: Stage, property_id: &str, result: Result<T, SupplyError>) -> Result<T, SupplyError> {
    result.inspect_err(|e| logging::log_property_failure(property_id, stage, e))
}

/// Runs classify → detect → merge → filter → impact for one property.
///
/// `now` is the calculation time in UTC; it is shifted by the run's time zone
/// adjustment along with the readings.
pub fn run_property(
    property: &PropertyThreshold,
    readings: Vec<Reading>,
    ctx: &RunContext,
    now: DateTime<Utc>,
) -> Result<PropertyResult, SupplyError> {
    let id = property.property_id.as_str();

    let readings = at_stage(
        Stage::Ingest,
        id,
        prepare_series(id, readings, ctx.ordering, ctx.time_zone_adjustment_minutes),
    )?;
    if readings.is_empty() {
        logging::debug(Stage::Ingest, Some(id), "No readings; property has no events");
    }

    let samples = at_stage(
        Stage::Classifier,
        id,
        classify_series(&readings, property, ctx.classifier()),
    )?;
    if starts_out_of_supply(&samples) {
        logging::warn(
            Stage::Detector,
            Some(id),
            "Series starts out of supply; the leading outage has no lost time and is not reported",
        );
    }

    let now = at_stage(
        Stage::Detector,
        id,
        adjust_instant(id, now, ctx.time_zone_adjustment_minutes),
    )?;
    let raw = at_stage(
        Stage::Detector,
        id,
        detect_with_policy(id, &samples, ctx.open_event_reference, now),
    )?;

    let merged = merge_events(&raw, ctx.merge_gap_minutes);
    logging::debug(
        Stage::Merger,
        Some(id),
        &format!("{} raw events merged into {}", raw.len(), merged.len()),
    );

    let reportable = filter_reportable(merged.clone(), ctx.min_duration_minutes);
    logging::debug(
        Stage::Filter,
        Some(id),
        &format!(
            "{} of {} merged events meet the {} minute minimum",
            reportable.len(),
            merged.len(),
            ctx.min_duration_minutes
        ),
    );

    let records = at_stage(
        Stage::Impact,
        id,
        impact_records(property, reportable, &ctx.constants),
    )?;

    Ok(PropertyResult {
        property_id: property.property_id.clone(),
        raw_event_count: raw.len(),
        merged_events: merged,
        records,
    })
}

/// Parses string timestamps, then runs the property pipeline.
pub fn run_property_raw(
    property: &PropertyThreshold,
    raw: &[RawReading],
    ctx: &RunContext,
    now: DateTime<Utc>,
) -> Result<PropertyResult, SupplyError> {
    let readings = at_stage(
        Stage::Ingest,
        &property.property_id,
        readings_from_raw(&property.property_id, raw),
    )?;
    run_property(property, readings, ctx, now)
}

// ============================================================================
// Whole run
// ============================================================================

/// Runs every configured property and aggregates the results.
///
/// A property with no series in `series` is treated as an empty series.
/// Fails only if the configuration is invalid.
pub fn run_at(
    config: &SupplyConfig,
    mut series: HashMap<String, Vec<Reading>>,
    now: DateTime<Utc>,
) -> Result<RunReport, SupplyError> {
    let ctx = RunContext::from_config(config)?;
    let registry = PropertyRegistry::new(config.properties.clone())?;

    logging::info(
        Stage::System,
        None,
        &format!(
            "Starting calculation for {} properties ({} classification)",
            registry.len(),
            ctx.classifier().name()
        ),
    );

    let mut summary = RunSummary {
        properties_total: registry.len(),
        ..RunSummary::default()
    };
    let mut aggregator = Aggregator::new();
    let mut properties = Vec::new();
    let mut failures = Vec::new();

    for property in registry.iter() {
        let readings = series.remove(&property.property_id).unwrap_or_default();
        match run_property(property, readings, &ctx, now) {
            Ok(result) => {
                summary.properties_succeeded += 1;
                summary.raw_events += result.raw_event_count;
                summary.merged_events += result.merged_events.len();
                summary.reportable_events += result.records.len();
                aggregator.register_property(property);
                aggregator.extend(&result.records);
                properties.push(result);
            }
            Err(e) => {
                summary.properties_failed += 1;
                failures.push(PropertyFailure {
                    property_id: property.property_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    summary.unmatched_series = series.len();
    for id in series.keys() {
        logging::warn(
            Stage::Ingest,
            Some(id),
            "Series supplied for a property that is not configured; ignored",
        );
    }

    let result = aggregator.finish();
    logging::log_run_summary(
        summary.properties_total,
        summary.properties_succeeded,
        summary.properties_failed,
        summary.reportable_events,
    );

    Ok(RunReport {
        result,
        properties,
        failures,
        summary,
    })
}

/// Convenience wrapper that uses the real current time as the calculation
/// time. Use `run_at` in tests to keep them deterministic.
pub fn run(
    config: &SupplyConfig,
    series: HashMap<String, Vec<Reading>>,
) -> Result<RunReport, SupplyError> {
    run_at(config, series, Utc::now())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::status::Formulation;
    use crate::config::{ClassificationConfig, EventConfig, ImpactConfig, TimeConfig};
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn at(minute: i64) -> DateTime<Utc> {
        base() + Duration::minutes(minute)
    }

    fn property(id: &str, elevation: f64, population: u64) -> PropertyThreshold {
        PropertyThreshold {
            property_id: id.to_string(),
            elevation,
            population,
        }
    }

    fn config(reference: OpenEventReference) -> SupplyConfig {
        SupplyConfig {
            classification: ClassificationConfig {
                formulation: Formulation::EffectiveHead,
                logger_height_offset: Some(0.0),
                headloss_allowance: None,
            },
            events: EventConfig {
                open_event_reference: Some(reference),
                ..EventConfig::default()
            },
            impact: ImpactConfig {
                total_customer_base: 1_000_000,
                unit_cost_per_cml: 61_000.0,
            },
            time: TimeConfig::default(),
            properties: vec![property("LOW", 10.0, 100), property("HIGH", 30.0, 50)],
        }
    }

    /// Pressure series: (minute, metres head).
    fn series(points: &[(i64, f64)]) -> Vec<Reading> {
        points.iter().map(|&(m, v)| Reading::new(at(m), v)).collect()
    }

    #[test]
    fn test_context_requires_reference_policy() {
        let mut cfg = config(OpenEventReference::LastSample);
        cfg.events.open_event_reference = None;
        assert!(matches!(
            RunContext::from_config(&cfg),
            Err(SupplyError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_run_property_reports_long_outage() {
        let ctx = RunContext::from_config(&config(OpenEventReference::LastSample)).unwrap();
        // HIGH needs 30m; pressure drops to 20m for four hours.
        let readings = series(&[(0, 40.0), (60, 20.0), (120, 20.0), (300, 40.0), (360, 40.0)]);
        let result = run_property(&property("HIGH", 30.0, 100), readings, &ctx, at(400)).unwrap();
        assert_eq!(result.raw_event_count, 1);
        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.event.duration_minutes, 240.0);
        assert!((record.cml_impact - 0.0096).abs() < 1e-12);
        assert!((record.cost - 585.6).abs() < 1e-6);
    }

    #[test]
    fn test_run_property_merges_flicker_before_filtering() {
        let ctx = RunContext::from_config(&config(OpenEventReference::LastSample)).unwrap();
        // Two 100-minute outages separated by a 30-minute restoration:
        // each alone is below 180, merged span is 230.
        let readings = series(&[(0, 40.0), (10, 5.0), (110, 40.0), (140, 5.0), (240, 40.0)]);
        let result = run_property(&property("P", 30.0, 10), readings, &ctx, at(300)).unwrap();
        assert_eq!(result.raw_event_count, 2);
        assert_eq!(result.merged_events.len(), 1);
        assert_eq!(result.merged_events[0].duration_minutes, 230.0);
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_run_property_short_outage_contributes_nothing() {
        let ctx = RunContext::from_config(&config(OpenEventReference::LastSample)).unwrap();
        let readings = series(&[(0, 40.0), (10, 5.0), (130, 40.0)]);
        let result = run_property(&property("P", 30.0, 10), readings, &ctx, at(300)).unwrap();
        assert_eq!(result.merged_events.len(), 1);
        assert!(result.records.is_empty(), "a 120-minute outage is not reportable");
    }

    #[test]
    fn test_open_event_reference_changes_duration() {
        let readings = series(&[(0, 40.0), (60, 5.0), (120, 5.0)]);
        let p = property("P", 30.0, 10);

        let last = RunContext::from_config(&config(OpenEventReference::LastSample)).unwrap();
        let by_last = run_property(&p, readings.clone(), &last, at(600)).unwrap();
        assert_eq!(by_last.merged_events[0].duration_minutes, 60.0);
        assert!(by_last.records.is_empty());

        let calc = RunContext::from_config(&config(OpenEventReference::CalculationTime)).unwrap();
        let by_now = run_property(&p, readings, &calc, at(600)).unwrap();
        assert_eq!(by_now.merged_events[0].duration_minutes, 540.0);
        assert_eq!(by_now.records.len(), 1);
        assert!(by_now.records[0].event.is_open());
    }

    #[test]
    fn test_time_zone_adjustment_shifts_calculation_time_too() {
        let mut cfg = config(OpenEventReference::CalculationTime);
        cfg.time.time_zone_adjustment_minutes = 60;
        let ctx = RunContext::from_config(&cfg).unwrap();
        let readings = series(&[(0, 40.0), (60, 5.0)]);
        let result = run_property(&property("P", 30.0, 10), readings, &ctx, at(300)).unwrap();
        let event = &result.merged_events[0];
        assert_eq!(event.lost_time, at(120));
        assert_eq!(event.duration_minutes, 240.0, "both ends shift by the same hour");
    }

    #[test]
    fn test_run_at_refuses_out_of_range_adjustment_without_panicking() {
        let mut cfg = config(OpenEventReference::CalculationTime);
        cfg.time.time_zone_adjustment_minutes = 1_000_000_000_000;
        let mut input = HashMap::new();
        input.insert("LOW".to_string(), series(&[(0, 20.0), (10, 5.0)]));
        assert!(matches!(
            run_at(&cfg, input, at(300)),
            Err(SupplyError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_unsorted_series_fails_property() {
        let ctx = RunContext::from_config(&config(OpenEventReference::LastSample)).unwrap();
        let readings = series(&[(0, 40.0), (30, 5.0), (10, 40.0)]);
        let result = run_property(&property("P", 30.0, 10), readings, &ctx, at(60));
        assert!(matches!(result, Err(SupplyError::UnsortedInput { .. })), "got {:?}", result);
    }

    #[test]
    fn test_run_property_raw_rejects_malformed_timestamp() {
        let ctx = RunContext::from_config(&config(OpenEventReference::LastSample)).unwrap();
        let raw = vec![RawReading { timestamp: "yesterday".to_string(), value: 1.0 }];
        let result = run_property_raw(&property("P", 30.0, 10), &raw, &ctx, at(0));
        assert!(matches!(result, Err(SupplyError::MalformedTimestamp { .. })));
    }

    #[test]
    fn test_run_at_isolates_failing_property() {
        let mut input = HashMap::new();
        input.insert(
            "LOW".to_string(),
            series(&[(0, 20.0), (10, 5.0), (250, 20.0)]),
        );
        input.insert(
            "HIGH".to_string(),
            series(&[(0, 40.0), (10, f64::NAN)]),
        );

        let report = run_at(&config(OpenEventReference::LastSample), input, at(300)).unwrap();
        assert_eq!(report.summary.properties_total, 2);
        assert_eq!(report.summary.properties_succeeded, 1);
        assert_eq!(report.summary.properties_failed, 1);
        assert_eq!(report.failures[0].property_id, "HIGH");
        assert!(report.result.totals_for("HIGH").is_none());

        let low = report.result.totals_for("LOW").expect("LOW succeeded");
        assert_eq!(low.event_count, 1);
        assert_eq!(low.population, 100);
        assert_eq!(report.result.total_cost, low.cost);
    }

    #[test]
    fn test_run_at_missing_series_is_empty_not_an_error() {
        let report = run_at(&config(OpenEventReference::LastSample), HashMap::new(), at(0)).unwrap();
        assert_eq!(report.summary.properties_succeeded, 2);
        assert!(report.failures.is_empty());
        assert_eq!(report.result.total_cml_impact, 0.0);
        assert_eq!(report.result.by_property.len(), 2);
    }

    #[test]
    fn test_run_at_counts_unmatched_series() {
        let mut input = HashMap::new();
        input.insert("STRAY".to_string(), series(&[(0, 1.0)]));
        let report = run_at(&config(OpenEventReference::LastSample), input, at(0)).unwrap();
        assert_eq!(report.summary.unmatched_series, 1);
    }

    #[test]
    fn test_run_at_rejects_invalid_configuration() {
        let mut cfg = config(OpenEventReference::LastSample);
        cfg.classification.logger_height_offset = None;
        assert!(matches!(
            run_at(&cfg, HashMap::new(), at(0)),
            Err(SupplyError::InvalidConfiguration(_))
        ));
    }
}
