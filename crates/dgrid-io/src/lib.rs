//! # dgrid-io: Grid Topology CSV I/O
//!
//! Reads and writes [`dgrid_core::Topology`] as a directory of per-table CSV
//! files, the on-disk shape produced by distribution grid data tooling.
//!
//! ## Design Philosophy
//!
//! **Load, then validate**: importers fill the tables wholesale and run the
//! core integrity checks afterwards, so a broken dataset reports every
//! dangling reference in one pass instead of failing on the first row.
//!
//! **Lossless round trips**: export writes rows in identifier order with the
//! exact column set import expects, so export-import cycles reproduce the
//! topology.
//!
//! ## Directory Layout
//!
//! | File | Table | Required |
//! |------|-------|----------|
//! | `buses.csv` | connection points | no (absent = empty) |
//! | `lines.csv` | lines and cables | no |
//! | `transformers.csv` | MV/LV transformers | no |
//! | `loads.csv` | conventional loads, charging points, heat pumps | no |
//! | `generators.csv` | generators | no |
//! | `storage_units.csv` | storage units | no |
//! | `switches.csv` | switch disconnectors | no |
//!
//! The first column of every table is `name`, the component identifier.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dgrid_io::{import_topology, validate};
//!
//! fn main() -> anyhow::Result<()> {
//!     let (topology, report) = import_topology("grid_data/")?;
//!     println!("imported {report}");
//!
//!     let diagnostics = validate(&topology);
//!     println!("{diagnostics}");
//!     Ok(())
//! }
//! ```

pub mod export;
pub mod import;
mod records;
pub mod report;

pub use export::export_topology;
pub use import::{import_topology, read_topology};
pub use report::ImportReport;

use dgrid_core::{Diagnostics, Topology};

/// Run the core integrity checks over an imported topology.
///
/// Import already rejects hard errors; this surfaces the soft findings
/// (isolated buses, disconnected islands, suspicious power values) a caller
/// may want to show or log.
pub fn validate(topology: &Topology) -> Diagnostics {
    topology.check_integrity()
}
