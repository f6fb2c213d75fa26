/// Interruption analysis for the supply interruption service.
///
/// Each stage consumes the previous stage's output by value or slice and
/// produces a fresh collection; nothing reads downstream state.
///
/// Submodules:
/// - `status`: per-reading supply adequacy against a property threshold.
/// - `detection`: edge detection over status samples into raw events.
/// - `merging`: coalesces events separated by short restorations.
/// - `filtering`: drops merged events below the reportable duration.

pub mod detection;
pub mod filtering;
pub mod merging;
pub mod status;
