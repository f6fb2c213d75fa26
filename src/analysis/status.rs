//! Supply status classification.
//!
//! A property is in supply when the head delivered at the logger, corrected
//! for the logger's own height and any losses on the way, reaches the
//! property's elevation. Two equivalent-in-intent formulations are in use:
//!
//! - effective head: `logger_height_offset + pressure - correction >= elevation`
//! - pressure threshold: `pressure >= elevation - logger_height_offset + headloss_allowance`
//!
//! Both are `SupplyClassifier` implementations chosen by configuration.

use serde::{Deserialize, Serialize};

use crate::config::ClassificationConfig;
use crate::model::{PropertyThreshold, Reading, SupplyError, SupplyStatusSample};

/// Which comparison a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formulation {
    #[default]
    EffectiveHead,
    PressureThreshold,
}

/// Decides whether a single reading keeps a property in supply.
pub trait SupplyClassifier {
    fn classify(&self, reading: &Reading, threshold: &PropertyThreshold) -> bool;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Converts the reading to an effective head and compares it with elevation.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveHead {
    pub logger_height_offset: f64,
    /// Subtracted from the effective head; zero when no allowance is configured.
    pub correction: f64,
}

impl EffectiveHead {
    pub fn effective_head(&self, reading: &Reading) -> f64 {
        self.logger_height_offset + reading.value - self.correction
    }
}

impl SupplyClassifier for EffectiveHead {
    fn classify(&self, reading: &Reading, threshold: &PropertyThreshold) -> bool {
        self.effective_head(reading) >= threshold.elevation
    }

    fn name(&self) -> &'static str {
        "effective_head"
    }
}

/// Derives a per-property pressure threshold and compares raw readings with it.
#[derive(Debug, Clone, PartialEq)]
pub struct PressureThreshold {
    pub logger_height_offset: f64,
    pub headloss_allowance: f64,
}

impl PressureThreshold {
    pub fn threshold_for(&self, property: &PropertyThreshold) -> f64 {
        property.elevation - self.logger_height_offset + self.headloss_allowance
    }
}

impl SupplyClassifier for PressureThreshold {
    fn classify(&self, reading: &Reading, threshold: &PropertyThreshold) -> bool {
        reading.value >= self.threshold_for(threshold)
    }

    fn name(&self) -> &'static str {
        "pressure_threshold"
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

fn required(value: Option<f64>, key: &str, formulation: &str) -> Result<f64, SupplyError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(SupplyError::InvalidConfiguration(format!(
            "classification.{} must be finite, got {}",
            key, v
        ))),
        None => Err(SupplyError::InvalidConfiguration(format!(
            "classification.{} is required by the {} formulation",
            key, formulation
        ))),
    }
}

/// Builds the configured strategy. Fails with `InvalidConfiguration` when a
/// parameter the formulation needs is missing or non-finite.
///
/// The effective-head formulation requires `logger_height_offset`; the
/// headloss allowance is optional there. The pressure-threshold formulation
/// requires both.
pub fn build_classifier(
    config: &ClassificationConfig,
) -> Result<Box<dyn SupplyClassifier>, SupplyError> {
    match config.formulation {
        Formulation::EffectiveHead => {
            let offset = required(config.logger_height_offset, "logger_height_offset", "effective_head")?;
            let correction = match config.headloss_allowance {
                Some(_) => required(config.headloss_allowance, "headloss_allowance", "effective_head")?,
                None => 0.0,
            };
            Ok(Box::new(EffectiveHead {
                logger_height_offset: offset,
                correction,
            }))
        }
        Formulation::PressureThreshold => {
            let offset = required(
                config.logger_height_offset,
                "logger_height_offset",
                "pressure_threshold",
            )?;
            let headloss = required(
                config.headloss_allowance,
                "headloss_allowance",
                "pressure_threshold",
            )?;
            Ok(Box::new(PressureThreshold {
                logger_height_offset: offset,
                headloss_allowance: headloss,
            }))
        }
    }
}

/// Classifies every reading for one property. Output has the same length and
/// order as the input.
///
/// Fails fast with `InvalidInput` on a non-finite reading rather than letting
/// a NaN compare as "out of supply". The pipeline has already run
/// `prepare_series` by this point; the check stays for direct callers.
pub fn classify_series(
    readings: &[Reading],
    threshold: &PropertyThreshold,
    classifier: &dyn SupplyClassifier,
) -> Result<Vec<SupplyStatusSample>, SupplyError> {
    readings
        .iter()
        .map(|reading| {
            if !reading.value.is_finite() {
                return Err(SupplyError::InvalidInput {
                    property_id: threshold.property_id.clone(),
                    timestamp: Some(reading.timestamp),
                    reason: format!("non-finite reading {}", reading.value),
                });
            }
            Ok(SupplyStatusSample {
                timestamp: reading.timestamp,
                in_supply: classifier.classify(reading, threshold),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
