//! Supply interruption reporting.
//!
//! Converts logger pressure/flow readings into reportable supply
//! interruptions per property, and quantifies each one's customer minutes
//! lost (CML) and cost for regulatory returns.
//!
//! Modules, leaf first:
//! - `model`: shared types and `SupplyError`.
//! - `config`: TOML configuration and validation.
//! - `properties`: the registry of reportable properties.
//! - `ingest`: reading series preparation.
//! - `analysis`: classification, detection, merging, filtering.
//! - `impact`: CML/cost and aggregation.
//! - `pipeline`: runs the stages per property and for a whole run.
//! - `logging`: structured, leveled logging.

pub mod analysis;
pub mod config;
pub mod impact;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod properties;
