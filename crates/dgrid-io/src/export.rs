//! CSV directory export.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use dgrid_core::Topology;

use crate::import::{
    BUSES_FILE, GENERATORS_FILE, LINES_FILE, LOADS_FILE, STORAGE_UNITS_FILE, SWITCHES_FILE,
    TRANSFORMERS_FILE,
};
use crate::records::{
    BusRecord, GeneratorRecord, LineRecord, LoadRecord, StorageUnitRecord, SwitchRecord,
    TransformerRecord,
};

/// Write a grid topology as a directory of CSV tables.
///
/// The directory is created if needed. Rows are written in identifier order,
/// so exporting the same topology twice yields byte-identical files. Empty
/// tables produce no file, mirroring how absent files import as empty tables.
pub fn export_topology(topology: &Topology, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating grid directory '{}'", dir.display()))?;

    write_table(
        dir,
        BUSES_FILE,
        topology
            .buses()
            .iter()
            .map(|(name, row)| BusRecord::from_row(name, row)),
    )?;
    write_table(
        dir,
        LINES_FILE,
        topology
            .lines()
            .iter()
            .map(|(name, row)| LineRecord::from_row(name, row)),
    )?;
    write_table(
        dir,
        TRANSFORMERS_FILE,
        topology
            .transformers()
            .iter()
            .map(|(name, row)| TransformerRecord::from_row(name, row)),
    )?;
    write_table(
        dir,
        LOADS_FILE,
        topology
            .loads()
            .iter()
            .map(|(name, row)| LoadRecord::from_row(name, row)),
    )?;
    write_table(
        dir,
        GENERATORS_FILE,
        topology
            .generators()
            .iter()
            .map(|(name, row)| GeneratorRecord::from_row(name, row)),
    )?;
    write_table(
        dir,
        STORAGE_UNITS_FILE,
        topology
            .storage_units()
            .iter()
            .map(|(name, row)| StorageUnitRecord::from_row(name, row)),
    )?;
    write_table(
        dir,
        SWITCHES_FILE,
        topology
            .switches()
            .iter()
            .map(|(name, row)| SwitchRecord::from_row(name, row)),
    )?;

    Ok(())
}

fn write_table<R>(dir: &Path, file: &str, records: impl Iterator<Item = R>) -> Result<()>
where
    R: Serialize,
{
    let mut records = records.peekable();
    if records.peek().is_none() {
        return Ok(());
    }

    let path = dir.join(file);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("creating '{}'", path.display()))?;
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("writing record to '{}'", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing '{}'", path.display()))?;
    Ok(())
}
