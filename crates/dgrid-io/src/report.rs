//! Per-table statistics for an import.

use serde::Serialize;

/// Row counts per table read by [`crate::import_topology`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub buses: usize,
    pub lines: usize,
    pub transformers: usize,
    pub loads: usize,
    pub generators: usize,
    pub storage_units: usize,
    pub switches: usize,
}

impl ImportReport {
    /// Total number of imported rows across all tables
    pub fn total(&self) -> usize {
        self.buses
            + self.lines
            + self.transformers
            + self.loads
            + self.generators
            + self.storage_units
            + self.switches
    }
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} transformers, {} loads, {} generators, {} storage units, {} switches",
            self.buses,
            self.lines,
            self.transformers,
            self.loads,
            self.generators,
            self.storage_units,
            self.switches
        )
    }
}
