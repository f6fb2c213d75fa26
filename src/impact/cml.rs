//! Customer-minutes-lost (CML) calculation.
//!
//! For one reportable event at one property:
//!
//! ```text
//! outage_hours = duration_minutes / 60
//! cml_impact   = outage_hours * 24 * population / total_customer_base
//! cost         = cml_impact * unit_cost_per_cml
//! ```
//!
//! Both outputs are linear in duration and in population. Population is
//! unsigned, so a negative head count cannot reach this module.

use crate::config::ImpactConfig;
use crate::model::{ImpactRecord, MergedInterruptionEvent, PropertyThreshold, SupplyError};

/// Regulator constants used by every impact calculation in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactConstants {
    pub total_customer_base: u64,
    pub unit_cost_per_cml: f64,
}

impl From<&ImpactConfig> for ImpactConstants {
    fn from(config: &ImpactConfig) -> Self {
        Self {
            total_customer_base: config.total_customer_base,
            unit_cost_per_cml: config.unit_cost_per_cml,
        }
    }
}

impl ImpactConstants {
    fn check(&self) -> Result<(), SupplyError> {
        if self.total_customer_base == 0 {
            return Err(SupplyError::InvalidConfiguration(
                "total_customer_base must be greater than zero".to_string(),
            ));
        }
        if !self.unit_cost_per_cml.is_finite() || self.unit_cost_per_cml < 0.0 {
            return Err(SupplyError::InvalidConfiguration(format!(
                "unit_cost_per_cml must be a non-negative number, got {}",
                self.unit_cost_per_cml
            )));
        }
        Ok(())
    }
}

/// CML and cost for one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub cml_impact: f64,
    pub cost: f64,
}

/// Computes the impact of an outage of `duration_minutes` on `population`
/// customers. Fails with `InvalidInput` on a negative or non-finite duration.
pub fn calculate_impact(
    property_id: &str,
    duration_minutes: f64,
    population: u64,
    constants: &ImpactConstants,
) -> Result<Impact, SupplyError> {
    constants.check()?;
    if !duration_minutes.is_finite() || duration_minutes < 0.0 {
        return Err(SupplyError::InvalidInput {
            property_id: property_id.to_string(),
            timestamp: None,
            reason: format!("duration must be a non-negative number, got {}", duration_minutes),
        });
    }

    let outage_hours = duration_minutes / 60.0;
    let cml_impact = outage_hours * 24.0 * population as f64 / constants.total_customer_base as f64;
    Ok(Impact {
        cml_impact,
        cost: cml_impact * constants.unit_cost_per_cml,
    })
}

/// Builds the impact record for one reportable event.
pub fn impact_record(
    property: &PropertyThreshold,
    event: MergedInterruptionEvent,
    constants: &ImpactConstants,
) -> Result<ImpactRecord, SupplyError> {
    let impact = match calculate_impact(
        &property.property_id,
        event.duration_minutes,
        property.population,
        constants,
    ) {
        Ok(impact) => impact,
        Err(SupplyError::InvalidInput { property_id, reason, .. }) => {
            return Err(SupplyError::InvalidInput {
                property_id,
                timestamp: Some(event.lost_time),
                reason,
            });
        }
        Err(other) => return Err(other),
    };

    Ok(ImpactRecord {
        property_id: property.property_id.clone(),
        population: property.population,
        event,
        cml_impact: impact.cml_impact,
        cost: impact.cost,
    })
}

/// Impact records for every reportable event at one property, in event order.
pub fn impact_records(
    property: &PropertyThreshold,
    events: Vec<MergedInterruptionEvent>,
    constants: &ImpactConstants,
) -> Result<Vec<ImpactRecord>, SupplyError> {
    events
        .into_iter()
        .map(|event| impact_record(property, event, constants))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
