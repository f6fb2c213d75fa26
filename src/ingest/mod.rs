/// Input preparation for the interruption pipeline.
///
/// Reading files are parsed by upstream collaborators; this module only
/// turns their output into validated, consistently shifted `Reading` series.
///
/// Submodules:
/// - `readings`: timestamp parsing, ordering checks, time zone adjustment.

pub mod readings;
