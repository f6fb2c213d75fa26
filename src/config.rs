//! Pipeline configuration loaded from TOML.
//!
//! A `SupplyConfig` is built once per calculation and passed explicitly to
//! every stage; nothing here is cached process-wide.
//!
//! Load with `SupplyConfig::load()` which searches:
//! 1. `$SUPPLY_CONFIG` (a `.env` file in the working directory is honoured)
//! 2. `./supply_config.toml`
//!
//! There is no built-in fallback: the open-event reference has no default,
//! so a run cannot start without a config that names one.

use crate::analysis::detection::OpenEventReference;
use crate::analysis::filtering::DEFAULT_MIN_DURATION_MINUTES;
use crate::analysis::merging::DEFAULT_MERGE_GAP_MINUTES;
use crate::analysis::status::{build_classifier, Formulation};
use crate::ingest::readings::OrderingPolicy;
use crate::model::{PropertyThreshold, SupplyError};
use crate::properties::PropertyRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "SUPPLY_CONFIG";

/// Config file looked for in the working directory when the env var is unset.
pub const DEFAULT_CONFIG_FILE: &str = "supply_config.toml";

/// Largest time zone shift accepted, in either direction (one day).
pub const MAX_TIME_ZONE_ADJUSTMENT_MINUTES: i64 = 24 * 60;

/// Customers served by the company, as used in the regulator's CML formula.
pub const DEFAULT_TOTAL_CUSTOMER_BASE: u64 = 1_473_786;

/// Cost per unit of CML, in pounds.
pub const DEFAULT_UNIT_COST_PER_CML: f64 = 61_000.0;

// ============================================================================
// Top-Level Config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplyConfig {
    #[serde(default)]
    pub classification: ClassificationConfig,

    #[serde(default)]
    pub events: EventConfig,

    #[serde(default)]
    pub impact: ImpactConfig,

    #[serde(default)]
    pub time: TimeConfig,

    /// Reportable properties and their thresholds.
    #[serde(default)]
    pub properties: Vec<PropertyThreshold>,
}

// ============================================================================
// Sections
// ============================================================================

/// How readings are compared against a property's elevation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default)]
    pub formulation: Formulation,

    /// Height of the logger above datum, in metres.
    #[serde(default)]
    pub logger_height_offset: Option<f64>,

    /// Head lost between the logger and the property, in metres.
    #[serde(default)]
    pub headloss_allowance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Restorations no longer than this are treated as noise.
    #[serde(default = "default_merge_gap")]
    pub merge_gap_minutes: f64,

    /// Merged events shorter than this are not reportable.
    #[serde(default = "default_min_duration")]
    pub min_duration_minutes: f64,

    /// Required. Where open-ended events stop counting.
    #[serde(default)]
    pub open_event_reference: Option<OpenEventReference>,

    #[serde(default)]
    pub ordering: OrderingPolicy,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            merge_gap_minutes: DEFAULT_MERGE_GAP_MINUTES,
            min_duration_minutes: DEFAULT_MIN_DURATION_MINUTES,
            open_event_reference: None,
            ordering: OrderingPolicy::default(),
        }
    }
}

impl EventConfig {
    /// The configured open-event reference, or `InvalidConfiguration` if the
    /// config does not name one.
    pub fn open_event_reference(&self) -> Result<OpenEventReference, SupplyError> {
        self.open_event_reference.ok_or_else(|| {
            SupplyError::InvalidConfiguration(
                "events.open_event_reference must be set to \"last_sample\" or \"calculation_time\""
                    .to_string(),
            )
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactConfig {
    #[serde(default = "default_customer_base")]
    pub total_customer_base: u64,

    #[serde(default = "default_unit_cost")]
    pub unit_cost_per_cml: f64,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            total_customer_base: DEFAULT_TOTAL_CUSTOMER_BASE,
            unit_cost_per_cml: DEFAULT_UNIT_COST_PER_CML,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Shift applied to every timestamp, e.g. 60 for BST.
    #[serde(default)]
    pub time_zone_adjustment_minutes: i64,
}

fn default_merge_gap() -> f64 {
    DEFAULT_MERGE_GAP_MINUTES
}

fn default_min_duration() -> f64 {
    DEFAULT_MIN_DURATION_MINUTES
}

fn default_customer_base() -> u64 {
    DEFAULT_TOTAL_CUSTOMER_BASE
}

fn default_unit_cost() -> f64 {
    DEFAULT_UNIT_COST_PER_CML
}

// ============================================================================
// Loading
// ============================================================================

impl SupplyConfig {
    /// Load configuration using the standard search order. The loaded config
    /// is validated before it is returned.
    pub fn load() -> Result<Self, SupplyError> {
        dotenv::dotenv().ok();

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if !p.exists() {
                return Err(SupplyError::InvalidConfiguration(format!(
                    "{} points to non-existent file {}",
                    CONFIG_ENV_VAR, path
                )));
            }
            return Self::load_from_file(&p);
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::load_from_file(&local);
        }

        Err(SupplyError::InvalidConfiguration(format!(
            "no configuration found: set {} or create ./{}",
            CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE
        )))
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, SupplyError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SupplyError::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text).map_err(|e| match e {
            SupplyError::InvalidConfiguration(msg) => {
                SupplyError::InvalidConfiguration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        crate::logging::info(
            crate::logging::Stage::Config,
            None,
            &format!(
                "Loaded configuration from {} ({} properties)",
                path.display(),
                config.properties.len()
            ),
        );
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, SupplyError> {
        let config: SupplyConfig = toml::from_str(text)
            .map_err(|e| SupplyError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every parameter a run depends on.
    pub fn validate(&self) -> Result<(), SupplyError> {
        build_classifier(&self.classification)?;
        self.events.open_event_reference()?;

        let events = &self.events;
        if !events.merge_gap_minutes.is_finite() || events.merge_gap_minutes < 0.0 {
            return Err(SupplyError::InvalidConfiguration(format!(
                "merge_gap_minutes must be a non-negative number, got {}",
                events.merge_gap_minutes
            )));
        }
        if !events.min_duration_minutes.is_finite() || events.min_duration_minutes < 0.0 {
            return Err(SupplyError::InvalidConfiguration(format!(
                "min_duration_minutes must be a non-negative number, got {}",
                events.min_duration_minutes
            )));
        }

        let adjustment = self.time.time_zone_adjustment_minutes;
        if adjustment.abs() > MAX_TIME_ZONE_ADJUSTMENT_MINUTES {
            return Err(SupplyError::InvalidConfiguration(format!(
                "time_zone_adjustment_minutes must be within ±{}, got {}",
                MAX_TIME_ZONE_ADJUSTMENT_MINUTES, adjustment
            )));
        }

        if self.impact.total_customer_base == 0 {
            return Err(SupplyError::InvalidConfiguration(
                "total_customer_base must be greater than zero".to_string(),
            ));
        }
        if !self.impact.unit_cost_per_cml.is_finite() || self.impact.unit_cost_per_cml < 0.0 {
            return Err(SupplyError::InvalidConfiguration(format!(
                "unit_cost_per_cml must be a non-negative number, got {}",
                self.impact.unit_cost_per_cml
            )));
        }

        PropertyRegistry::new(self.properties.clone())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
