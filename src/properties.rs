/// Registry of reportable properties for a calculation run.
///
/// Built from the `[[properties]]` list in the configuration. This is the
/// single place property ids are checked for uniqueness, so the rest of the
/// pipeline can key results by id without collisions.

use crate::model::{PropertyThreshold, SupplyError};

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Validated, ordered set of property thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRegistry {
    properties: Vec<PropertyThreshold>,
}

impl PropertyRegistry {
    /// Validates the threshold list. Fails on empty or duplicate ids and on
    /// non-finite elevations. Configured order is preserved.
    pub fn new(properties: Vec<PropertyThreshold>) -> Result<Self, SupplyError> {
        let mut seen = std::collections::HashSet::new();
        for property in &properties {
            if property.property_id.trim().is_empty() {
                return Err(SupplyError::InvalidConfiguration(
                    "property_id must not be empty".to_string(),
                ));
            }
            if !seen.insert(property.property_id.as_str()) {
                return Err(SupplyError::InvalidConfiguration(format!(
                    "duplicate property_id '{}'",
                    property.property_id
                )));
            }
            if !property.elevation.is_finite() {
                return Err(SupplyError::InvalidConfiguration(format!(
                    "elevation for '{}' must be a finite number, got {}",
                    property.property_id, property.elevation
                )));
            }
        }
        Ok(Self { properties })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyThreshold> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Looks up a property by id. Returns `None` if not registered.
    pub fn find(&self, property_id: &str) -> Option<&PropertyThreshold> {
        self.properties.iter().find(|p| p.property_id == property_id)
    }

    /// Property ids in configured order.
    pub fn ids(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.property_id.as_str()).collect()
    }

    /// Sum of customers over all registered properties.
    pub fn total_population(&self) -> u64 {
        self.properties.iter().map(|p| p.population).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
