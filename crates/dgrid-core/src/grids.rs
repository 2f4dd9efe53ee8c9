//! MV/LV grid aggregation views.
//!
//! A [`Grid`] is a read-only view over the slice of the topology belonging to
//! one voltage-level partition. Every aggregate is a pure function of the
//! current store contents at call time; nothing is cached across mutations,
//! so callers needing a stable value must snapshot it themselves.
//!
//! Membership rules:
//!
//! - buses: grid assignment matches (`lv_grid_id` for LV grids; `mv_grid_id`
//!   with no `lv_grid_id` for the MV grid)
//! - lines: both endpoints belong to the grid
//! - transformers: the secondary bus belongs to the grid, so station
//!   transformers surface through the LV grid they feed
//! - loads, generators, storage units: their bus belongs to the grid; the MV
//!   grid additionally excludes the slack generator at the station
//! - switches: their `bus_closed` belongs to the grid

use std::collections::BTreeMap;

use crate::units::{Kilovolts, Megawatts};
use crate::{
    BusRow, Control, GeneratorRow, LineRow, LoadRow, StorageUnitRow, SwitchRow, Topology,
    TransformerRow,
};

/// Key of one voltage-level partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GridId {
    Mv(i64),
    Lv(i64),
}

impl std::fmt::Display for GridId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridId::Mv(id) => write!(f, "MVGrid_{id}"),
            GridId::Lv(id) => write!(f, "LVGrid_{id}"),
        }
    }
}

/// Read-only aggregation view over one MV or LV grid.
#[derive(Debug, Clone, Copy)]
pub struct Grid<'a> {
    topology: &'a Topology,
    id: GridId,
}

impl Topology {
    /// View over the grid with the given key.
    pub fn grid(&self, id: GridId) -> Grid<'_> {
        Grid { topology: self, id }
    }

    /// View over the MV grid, if any bus is assigned to one.
    pub fn mv_grid(&self) -> Option<Grid<'_>> {
        self.mv_grid_id().map(|id| self.grid(GridId::Mv(id)))
    }

    /// View over one LV grid; `None` when no bus carries the identifier.
    pub fn get_lv_grid(&self, id: i64) -> Option<Grid<'_>> {
        self.buses()
            .values()
            .any(|b| b.lv_grid_id == Some(id))
            .then(|| self.grid(GridId::Lv(id)))
    }

    /// Iterate over all LV grids, sorted by identifier.
    pub fn lv_grids(&self) -> impl Iterator<Item = Grid<'_>> {
        self.lv_grid_ids()
            .into_iter()
            .map(|id| self.grid(GridId::Lv(id)))
    }
}

impl<'a> Grid<'a> {
    pub fn new(topology: &'a Topology, id: GridId) -> Self {
        Self { topology, id }
    }

    pub fn id(&self) -> GridId {
        self.id
    }

    /// Grid name, e.g. `MVGrid_1` or `LVGrid_452669`.
    pub fn name(&self) -> String {
        self.id.to_string()
    }

    fn bus_row_in_grid(&self, row: &BusRow) -> bool {
        match self.id {
            GridId::Mv(id) => row.mv_grid_id == id && row.lv_grid_id.is_none(),
            GridId::Lv(id) => row.lv_grid_id == Some(id),
        }
    }

    /// Whether the given bus belongs to this grid.
    pub fn contains_bus(&self, bus: &str) -> bool {
        self.topology
            .buses()
            .get(bus)
            .map(|row| self.bus_row_in_grid(row))
            .unwrap_or(false)
    }

    /// Member buses, in identifier order.
    pub fn buses(&self) -> impl Iterator<Item = (&'a String, &'a BusRow)> + '_ {
        self.topology
            .buses()
            .iter()
            .filter(|(_, row)| self.bus_row_in_grid(row))
    }

    /// Member lines: both endpoints belong to the grid.
    pub fn lines(&self) -> impl Iterator<Item = (&'a String, &'a LineRow)> + '_ {
        self.topology
            .lines()
            .iter()
            .filter(|(_, row)| self.contains_bus(&row.bus0) && self.contains_bus(&row.bus1))
    }

    /// Member transformers: the secondary bus belongs to the grid.
    pub fn transformers(&self) -> impl Iterator<Item = (&'a String, &'a TransformerRow)> + '_ {
        self.topology
            .transformers()
            .iter()
            .filter(|(_, row)| self.contains_bus(&row.bus1))
    }

    /// Member loads.
    pub fn loads(&self) -> impl Iterator<Item = (&'a String, &'a LoadRow)> + '_ {
        self.topology
            .loads()
            .iter()
            .filter(|(_, row)| self.contains_bus(&row.bus))
    }

    /// Member generators. The MV grid excludes the slack generator, which
    /// models the superordinate grid rather than feed-in.
    pub fn generators(&self) -> impl Iterator<Item = (&'a String, &'a GeneratorRow)> + '_ {
        let exclude_slack = matches!(self.id, GridId::Mv(_));
        self.topology.generators().iter().filter(move |(_, row)| {
            self.contains_bus(&row.bus) && !(exclude_slack && row.control == Control::Slack)
        })
    }

    /// Member storage units.
    pub fn storage_units(&self) -> impl Iterator<Item = (&'a String, &'a StorageUnitRow)> + '_ {
        self.topology
            .storage_units()
            .iter()
            .filter(|(_, row)| self.contains_bus(&row.bus))
    }

    /// Member switch disconnectors: their closed bus belongs to the grid.
    pub fn switches(&self) -> impl Iterator<Item = (&'a String, &'a SwitchRow)> + '_ {
        self.topology
            .switches()
            .iter()
            .filter(|(_, row)| self.contains_bus(&row.bus_closed))
    }

    /// Highest nominal voltage over member buses; 0 kV for an empty grid.
    pub fn nominal_voltage(&self) -> Kilovolts {
        self.buses()
            .map(|(_, row)| row.v_nom)
            .fold(Kilovolts(0.0), Kilovolts::max)
    }

    /// Total nominal power of member generators.
    pub fn peak_generation_capacity(&self) -> Megawatts {
        self.generators().map(|(_, row)| row.p_nom).sum()
    }

    /// Nominal power of member generators, grouped by technology.
    pub fn peak_generation_capacity_per_technology(&self) -> BTreeMap<String, Megawatts> {
        let mut result = BTreeMap::new();
        for (_, row) in self.generators() {
            let entry = result
                .entry(row.technology.clone())
                .or_insert(Megawatts(0.0));
            *entry = *entry + row.p_nom;
        }
        result
    }

    /// Total peak load of member loads.
    pub fn p_set(&self) -> Megawatts {
        self.loads().map(|(_, row)| row.p_set).sum()
    }

    /// Peak load of member loads, grouped by sector. Loads without a sector
    /// are left out of the grouping.
    pub fn p_set_per_sector(&self) -> BTreeMap<String, Megawatts> {
        let mut result = BTreeMap::new();
        for (_, row) in self.loads() {
            if let Some(sector) = &row.sector {
                let entry = result.entry(sector.clone()).or_insert(Megawatts(0.0));
                *entry = *entry + row.p_set;
            }
        }
        result
    }

    /// Sorted distinct weather cells over member generators.
    pub fn weather_cells(&self) -> Vec<i64> {
        let cells: std::collections::BTreeSet<i64> = self
            .generators()
            .filter_map(|(_, row)| row.weather_cell_id)
            .collect();
        cells.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::ding0_style_topology;

    #[test]
    fn test_grid_id_display() {
        assert_eq!(GridId::Mv(1).to_string(), "MVGrid_1");
        assert_eq!(GridId::Lv(452669).to_string(), "LVGrid_452669");
    }

    #[test]
    fn test_mv_grid_membership() {
        let t = ding0_style_topology();
        let mv = t.mv_grid().unwrap();

        let buses: Vec<&str> = mv.buses().map(|(id, _)| id.as_str()).collect();
        assert_eq!(
            buses,
            vec![
                "Bus_BranchTee_MVGrid_1_1",
                "Bus_BranchTee_MVGrid_1_2",
                "Bus_MVStation_1",
                "Bus_virtual_MVGrid_1",
            ]
        );

        let lines: Vec<&str> = mv.lines().map(|(id, _)| id.as_str()).collect();
        assert_eq!(
            lines,
            vec!["Line_station_tee_1", "Line_station_tee_2", "Line_tee_1_tee_2"]
        );

        // slack is not part of the MV generators
        let gens: Vec<&str> = mv.generators().map(|(id, _)| id.as_str()).collect();
        assert_eq!(
            gens,
            vec!["Generator_1", "GeneratorFluctuating_1", "GeneratorFluctuating_2"]
        );

        let switches: Vec<&str> = mv.switches().map(|(id, _)| id.as_str()).collect();
        assert_eq!(switches, vec!["circuit_breaker_1"]);

        // the station transformer surfaces through the LV grid it feeds
        assert_eq!(mv.transformers().count(), 0);
    }

    #[test]
    fn test_lv_grid_membership() {
        let t = ding0_style_topology();
        let lv = t.get_lv_grid(1).unwrap();

        let buses: Vec<&str> = lv.buses().map(|(id, _)| id.as_str()).collect();
        assert_eq!(
            buses,
            vec!["Bus_BranchTee_LVGrid_1_1", "Bus_secondary_LVGrid_1"]
        );

        let lines: Vec<&str> = lv.lines().map(|(id, _)| id.as_str()).collect();
        assert_eq!(lines, vec!["Line_lv_feeder_1"]);

        let transformers: Vec<&str> = lv.transformers().map(|(id, _)| id.as_str()).collect();
        assert_eq!(transformers, vec!["Transformer_LVGrid_1_1"]);
    }

    #[test]
    fn test_nominal_voltage() {
        let t = ding0_style_topology();
        assert_eq!(t.mv_grid().unwrap().nominal_voltage(), Kilovolts(20.0));
        assert_eq!(t.get_lv_grid(1).unwrap().nominal_voltage(), Kilovolts(0.4));
    }

    #[test]
    fn test_mv_peak_generation_capacity() {
        let t = ding0_style_topology();
        let mv = t.mv_grid().unwrap();
        assert!((mv.peak_generation_capacity().value() - 19.025).abs() < 1e-12);

        let per_tech = mv.peak_generation_capacity_per_technology();
        assert_eq!(per_tech["solar"], Megawatts(4.6));
        assert_eq!(per_tech["wind"], Megawatts(12.5));
        assert_eq!(per_tech["gas"], Megawatts(1.925));
    }

    #[test]
    fn test_lv_peak_generation_capacity() {
        let t = ding0_style_topology();
        let lv = t.get_lv_grid(1).unwrap();
        assert_eq!(lv.peak_generation_capacity(), Megawatts(0.023));
        let per_tech = lv.peak_generation_capacity_per_technology();
        assert_eq!(per_tech.len(), 1);
        assert_eq!(per_tech["solar"], Megawatts(0.023));
    }

    #[test]
    fn test_empty_grid_aggregates_to_zero() {
        let t = ding0_style_topology();
        assert!(t.get_lv_grid(99).is_none());

        // a view can still be formed over a key with no members
        let empty = t.grid(GridId::Lv(99));
        assert_eq!(empty.buses().count(), 0);
        assert_eq!(empty.peak_generation_capacity(), Megawatts(0.0));
        assert!(empty.peak_generation_capacity_per_technology().is_empty());
        assert_eq!(empty.p_set(), Megawatts(0.0));
        assert!(empty.p_set_per_sector().is_empty());
        assert!(empty.weather_cells().is_empty());
        assert_eq!(empty.nominal_voltage(), Kilovolts(0.0));
    }

    #[test]
    fn test_p_set_aggregates() {
        let t = ding0_style_topology();
        let lv = t.get_lv_grid(1).unwrap();
        assert!((lv.p_set().value() - 0.054627).abs() < 1e-12);

        let per_sector = lv.p_set_per_sector();
        assert_eq!(per_sector["agricultural"], Megawatts(0.051));
        assert_eq!(per_sector["residential"], Megawatts(0.003627));
    }

    #[test]
    fn test_weather_cells() {
        let t = ding0_style_topology();
        let mv = t.mv_grid().unwrap();
        assert_eq!(mv.weather_cells(), vec![1122074, 1122075]);

        let lv = t.get_lv_grid(1).unwrap();
        assert_eq!(lv.weather_cells(), vec![1122074]);
    }

    #[test]
    fn test_aggregates_track_mutation() {
        let mut t = ding0_style_topology();
        assert!((t.mv_grid().unwrap().peak_generation_capacity().value() - 19.025).abs() < 1e-12);

        t.remove_generator("GeneratorFluctuating_2").unwrap();
        assert!((t.mv_grid().unwrap().peak_generation_capacity().value() - 6.525).abs() < 1e-12);
    }

    #[test]
    fn test_lv_grids_iterator() {
        let t = ding0_style_topology();
        let ids: Vec<GridId> = t.lv_grids().map(|g| g.id()).collect();
        assert_eq!(ids, vec![GridId::Lv(1)]);
        assert_eq!(t.lv_grids().next().unwrap().name(), "LVGrid_1");
    }
}
