//! CSV directory import.
//!
//! A grid lives in a directory of per-table CSV files (`buses.csv`,
//! `lines.csv`, ...). Import reads every table that is present, builds a
//! [`Topology`] and then gates it on the core integrity checks: dangling
//! references, duplicate identifiers and broken switches abort the import,
//! while soft findings (isolated buses, islands) are left to
//! [`crate::validate`].

use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;

use dgrid_core::Topology;

use crate::records::{
    BusRecord, GeneratorRecord, LineRecord, LoadRecord, StorageUnitRecord, SwitchRecord,
    TransformerRecord,
};
use crate::report::ImportReport;

pub const BUSES_FILE: &str = "buses.csv";
pub const LINES_FILE: &str = "lines.csv";
pub const TRANSFORMERS_FILE: &str = "transformers.csv";
pub const LOADS_FILE: &str = "loads.csv";
pub const GENERATORS_FILE: &str = "generators.csv";
pub const STORAGE_UNITS_FILE: &str = "storage_units.csv";
pub const SWITCHES_FILE: &str = "switches.csv";

/// Read a grid topology from a directory of CSV tables.
///
/// Absent table files mean empty tables. Malformed rows, duplicate
/// identifiers and references to missing buses or branches are hard errors.
pub fn import_topology(dir: impl AsRef<Path>) -> Result<(Topology, ImportReport)> {
    let dir = dir.as_ref();
    let (topology, report) = read_topology(dir)?;

    let diagnostics = topology.check_integrity();
    if diagnostics.has_errors() {
        let details: Vec<String> = diagnostics.errors().map(|issue| issue.to_string()).collect();
        bail!(
            "imported topology from '{}' fails integrity checks:\n  {}",
            dir.display(),
            details.join("\n  ")
        );
    }

    Ok((topology, report))
}

/// Read the tables without gating on integrity.
///
/// Malformed rows and duplicates within a file are still hard errors, but
/// cross-table problems (dangling references, broken switches) are left for
/// the caller to inspect via [`crate::validate`]. Diagnostic tooling uses
/// this to show a broken dataset instead of refusing to load it.
pub fn read_topology(dir: impl AsRef<Path>) -> Result<(Topology, ImportReport)> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        bail!("grid directory '{}' does not exist", dir.display());
    }

    let mut topology = Topology::new();
    let mut report = ImportReport::default();

    report.buses = read_table(dir, BUSES_FILE, |record: BusRecord| {
        let (name, row) = record.into_row();
        if topology.buses().contains_key(&name) {
            bail!("duplicate bus '{name}'");
        }
        topology.insert_bus_row(name, row);
        Ok(())
    })?;
    report.lines = read_table(dir, LINES_FILE, |record: LineRecord| {
        let (name, row) = record.into_row()?;
        if topology.lines().contains_key(&name) {
            bail!("duplicate line '{name}'");
        }
        topology.insert_line_row(name, row);
        Ok(())
    })?;
    report.transformers = read_table(dir, TRANSFORMERS_FILE, |record: TransformerRecord| {
        let (name, row) = record.into_row();
        if topology.transformers().contains_key(&name) {
            bail!("duplicate transformer '{name}'");
        }
        topology.insert_transformer_row(name, row);
        Ok(())
    })?;
    report.loads = read_table(dir, LOADS_FILE, |record: LoadRecord| {
        let (name, row) = record.into_row()?;
        if topology.loads().contains_key(&name) {
            bail!("duplicate load '{name}'");
        }
        topology.insert_load_row(name, row);
        Ok(())
    })?;
    report.generators = read_table(dir, GENERATORS_FILE, |record: GeneratorRecord| {
        let (name, row) = record.into_row()?;
        if topology.generators().contains_key(&name) {
            bail!("duplicate generator '{name}'");
        }
        topology.insert_generator_row(name, row);
        Ok(())
    })?;
    report.storage_units = read_table(dir, STORAGE_UNITS_FILE, |record: StorageUnitRecord| {
        let (name, row) = record.into_row()?;
        if topology.storage_units().contains_key(&name) {
            bail!("duplicate storage unit '{name}'");
        }
        topology.insert_storage_unit_row(name, row);
        Ok(())
    })?;
    report.switches = read_table(dir, SWITCHES_FILE, |record: SwitchRecord| {
        let (name, row) = record.into_row();
        if topology.switches().contains_key(&name) {
            bail!("duplicate switch '{name}'");
        }
        topology.insert_switch_row(name, row);
        Ok(())
    })?;

    Ok((topology, report))
}

fn read_table<R, F>(dir: &Path, file: &str, mut insert: F) -> Result<usize>
where
    R: DeserializeOwned,
    F: FnMut(R) -> Result<()>,
{
    let path = dir.join(file);
    if !path.exists() {
        return Ok(0);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("opening '{}'", path.display()))?;

    let mut count = 0;
    for result in reader.deserialize() {
        let record: R =
            result.with_context(|| format!("parsing record in '{}'", path.display()))?;
        insert(record).with_context(|| format!("importing '{}'", path.display()))?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, file: &str, content: &str) {
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_import_minimal_grid() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            BUSES_FILE,
            "name,v_nom,x,y,mv_grid_id,lv_grid_id,in_building\n\
             Bus_MVStation_1,20.0,,,1,,false\n\
             Bus_BranchTee_MVGrid_1_1,20.0,10.1,52.3,1,,false\n",
        );
        write(
            tmp.path(),
            LINES_FILE,
            "name,bus0,bus1,length,r,x,s_nom,num_parallel,kind,type_info\n\
             Line_1,Bus_MVStation_1,Bus_BranchTee_MVGrid_1_1,1.2,0.15,0.42,7.27,1,cable,NA2XS2Y\n",
        );

        let (topology, report) = import_topology(tmp.path()).unwrap();

        assert_eq!(report.buses, 2);
        assert_eq!(report.lines, 1);
        assert_eq!(report.total(), 3);
        assert_eq!(topology.buses().len(), 2);
        let line = topology.line("Line_1").unwrap();
        assert_eq!(line.bus0, "Bus_MVStation_1");
        assert_eq!(line.type_info.as_deref(), Some("NA2XS2Y"));
    }

    #[test]
    fn test_absent_tables_are_empty() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            BUSES_FILE,
            "name,v_nom,x,y,mv_grid_id,lv_grid_id,in_building\n\
             Bus_1,20.0,,,1,,false\n",
        );

        let (topology, report) = import_topology(tmp.path()).unwrap();

        assert_eq!(report.buses, 1);
        assert_eq!(report.loads, 0);
        assert!(topology.loads().is_empty());
        assert!(topology.switches().is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        let err = import_topology(&missing).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_dangling_reference_is_hard_error() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            BUSES_FILE,
            "name,v_nom,x,y,mv_grid_id,lv_grid_id,in_building\n\
             Bus_1,20.0,,,1,,false\n",
        );
        write(
            tmp.path(),
            LOADS_FILE,
            "name,bus,p_set,annual_consumption,sector,type\n\
             Load_1,Bus_unknown,0.05,,residential,conventional_load\n",
        );

        let err = import_topology(tmp.path()).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("integrity checks"));
        assert!(text.contains("Load_1"));
    }

    #[test]
    fn test_read_topology_keeps_broken_dataset() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            BUSES_FILE,
            "name,v_nom,x,y,mv_grid_id,lv_grid_id,in_building\n\
             Bus_1,20.0,,,1,,false\n",
        );
        write(
            tmp.path(),
            LOADS_FILE,
            "name,bus,p_set,annual_consumption,sector,type\n\
             Load_1,Bus_unknown,0.05,,residential,conventional_load\n",
        );

        let (topology, report) = read_topology(tmp.path()).unwrap();
        assert_eq!(report.loads, 1);
        assert!(topology.check_integrity().has_errors());
    }

    #[test]
    fn test_duplicate_identifier_is_hard_error() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            BUSES_FILE,
            "name,v_nom,x,y,mv_grid_id,lv_grid_id,in_building\n\
             Bus_1,20.0,,,1,,false\n\
             Bus_1,10.0,,,1,,false\n",
        );

        let err = import_topology(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate bus 'Bus_1'"));
    }

    #[test]
    fn test_malformed_row_is_hard_error() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            BUSES_FILE,
            "name,v_nom,x,y,mv_grid_id,lv_grid_id,in_building\n\
             Bus_1,not_a_number,,,1,,false\n",
        );

        let err = import_topology(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing record"));
    }

    #[test]
    fn test_unknown_control_mode_is_hard_error() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            BUSES_FILE,
            "name,v_nom,x,y,mv_grid_id,lv_grid_id,in_building\n\
             Bus_1,20.0,,,1,,false\n",
        );
        write(
            tmp.path(),
            GENERATORS_FILE,
            "name,bus,control,p_nom,type,subtype,weather_cell_id\n\
             Generator_1,Bus_1,PX,1.0,solar,,\n",
        );

        let err = import_topology(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("unknown control mode 'PX'"));
    }
}
