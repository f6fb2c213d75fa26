/// Regulatory impact of reportable interruptions.
///
/// Submodules:
/// - `cml`: customer-minutes-lost and cost per event.
/// - `aggregate`: per-property and run-wide totals, and the result table
///   handed to exporters.

pub mod aggregate;
pub mod cml;
