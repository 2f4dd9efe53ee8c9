//! # dgrid-core: Distribution Grid Topology Model
//!
//! Provides the tabular topology store and component model for medium- and
//! low-voltage distribution grids.
//!
//! ## Design Philosophy
//!
//! A [`Topology`] owns one table per component kind (buses, lines,
//! transformers, loads, generators, storage units, switches), each keyed by a
//! unique string identifier. Tables are `BTreeMap` arenas, so iteration order
//! is the sorted identifier order and exports are deterministic.
//!
//! All component access goes through views that hold a topology reference and
//! an identifier, never a copy of the row:
//!
//! - [`Load`], [`Generator`], [`StorageUnit`] implement the [`Component`]
//!   capability trait (id, bus, grid, set_bus)
//! - [`Switch`] adds the open/close state machine over its branch endpoints
//! - [`Grid`] is a read-only aggregation view over one MV or LV grid
//!
//! Mutations flow through `&mut Topology`, so every view observes them
//! immediately and no view can outlive a row it is bound to.
//!
//! ## Quick Start
//!
//! ```
//! use dgrid_core::*;
//!
//! let mut topology = Topology::new();
//!
//! topology.add_bus("Bus_MVStation_1", BusRow {
//!     v_nom: Kilovolts(20.0),
//!     mv_grid_id: 1,
//!     ..BusRow::default()
//! })?;
//! topology.add_bus("Bus_BranchTee_MVGrid_1_1", BusRow {
//!     v_nom: Kilovolts(20.0),
//!     mv_grid_id: 1,
//!     ..BusRow::default()
//! })?;
//!
//! let line = topology.add_line(None, LineRow {
//!     bus0: "Bus_MVStation_1".into(),
//!     bus1: "Bus_BranchTee_MVGrid_1_1".into(),
//!     length: Kilometers(0.9),
//!     r: 0.1,
//!     x: 0.3,
//!     ..LineRow::default()
//! })?;
//! assert_eq!(line, "Line_Bus_MVStation_1_Bus_BranchTee_MVGrid_1_1");
//!
//! topology.add_generator(None, GeneratorRow {
//!     bus: "Bus_BranchTee_MVGrid_1_1".into(),
//!     p_nom: Megawatts(2.3),
//!     technology: "solar".into(),
//!     ..GeneratorRow::default()
//! })?;
//!
//! println!("{}", topology.stats());
//! # Ok::<(), dgrid_core::TopologyError>(())
//! ```
//!
//! ## Modules
//!
//! - [`components`] - Component capability trait and node-like views
//! - [`switch`] - Switch disconnector state machine
//! - [`grids`] - MV/LV grid aggregation views
//! - [`diagnostics`] - Issue collection for integrity checks
//! - [`graph`] - petgraph derivation and island analysis

use std::collections::{BTreeMap, BTreeSet};

pub mod components;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod grids;
pub mod switch;
pub mod units;

pub use components::{Component, Generator, Load, StorageUnit, VoltageLevel};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{ComponentKind, TopologyError, TopologyResult};
pub use graph::{BusAssignment, GraphEdge, IslandAnalysis, IslandSummary, TopologyGraph};
pub use grids::{Grid, GridId};
pub use switch::{Switch, SwitchState};
pub use units::{Kilometers, Kilovolts, MegavoltAmperes, MegawattHours, Megawatts};

/// Classification of a line segment's construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineKind {
    /// Overhead line
    #[default]
    Line,
    /// Underground cable
    Cable,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Line => "line",
            LineKind::Cable => "cable",
        }
    }
}

impl std::fmt::Display for LineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "line" => Ok(LineKind::Line),
            "cable" => Ok(LineKind::Cable),
            other => Err(format!("unknown line kind '{other}'")),
        }
    }
}

/// Classification of a load row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadKind {
    #[default]
    ConventionalLoad,
    ChargingPoint,
    HeatPump,
}

impl LoadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadKind::ConventionalLoad => "conventional_load",
            LoadKind::ChargingPoint => "charging_point",
            LoadKind::HeatPump => "heat_pump",
        }
    }

    /// Prefix used when auto-deriving load identifiers.
    fn name_prefix(&self) -> &'static str {
        match self {
            LoadKind::ConventionalLoad => "Conventional_Load",
            LoadKind::ChargingPoint => "Charging_Point",
            LoadKind::HeatPump => "Heat_Pump",
        }
    }
}

impl std::fmt::Display for LoadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conventional_load" => Ok(LoadKind::ConventionalLoad),
            "charging_point" => Ok(LoadKind::ChargingPoint),
            "heat_pump" => Ok(LoadKind::HeatPump),
            other => Err(format!("unknown load kind '{other}'")),
        }
    }
}

/// Control mode of a generator or storage unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Control {
    #[default]
    PQ,
    PV,
    Slack,
}

impl Control {
    pub fn as_str(&self) -> &'static str {
        match self {
            Control::PQ => "PQ",
            Control::PV => "PV",
            Control::Slack => "Slack",
        }
    }
}

impl std::fmt::Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Control {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PQ" => Ok(Control::PQ),
            "PV" => Ok(Control::PV),
            "Slack" => Ok(Control::Slack),
            other => Err(format!("unknown control mode '{other}'")),
        }
    }
}

// Row structs. One struct per table; the identifier is the map key, not a
// field, so a row can never disagree with the key it is stored under.

/// A topological connection point.
#[derive(Debug, Clone, PartialEq)]
pub struct BusRow {
    /// Nominal voltage
    pub v_nom: Kilovolts,
    /// Geographic x coordinate (longitude), if known
    pub x: Option<f64>,
    /// Geographic y coordinate (latitude), if known
    pub y: Option<f64>,
    /// MV grid the bus belongs to
    pub mv_grid_id: i64,
    /// LV grid the bus belongs to; `None` means the bus is an MV bus
    pub lv_grid_id: Option<i64>,
    pub in_building: bool,
}

impl Default for BusRow {
    fn default() -> Self {
        Self {
            v_nom: Kilovolts(0.0),
            x: None,
            y: None,
            mv_grid_id: 0,
            lv_grid_id: None,
            in_building: false,
        }
    }
}

/// A line segment connecting two buses.
///
/// The two endpoint slots `bus0`/`bus1` are what switch operations rewrite;
/// see [`Switch`].
#[derive(Debug, Clone, PartialEq)]
pub struct LineRow {
    pub bus0: String,
    pub bus1: String,
    pub length: Kilometers,
    /// Series resistance in ohms
    pub r: f64,
    /// Series reactance in ohms
    pub x: f64,
    /// Thermal rating
    pub s_nom: MegavoltAmperes,
    pub num_parallel: u32,
    pub kind: LineKind,
    /// Equipment type name (e.g. "NA2XS2Y 3x1x185 RM/25")
    pub type_info: Option<String>,
}

impl Default for LineRow {
    fn default() -> Self {
        Self {
            bus0: String::new(),
            bus1: String::new(),
            length: Kilometers(0.0),
            r: 0.0,
            x: 0.0,
            s_nom: MegavoltAmperes(0.0),
            num_parallel: 1,
            kind: LineKind::Line,
            type_info: None,
        }
    }
}

/// A transformer joining two voltage levels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformerRow {
    /// Primary (higher-voltage) side bus
    pub bus0: String,
    /// Secondary (lower-voltage) side bus
    pub bus1: String,
    pub s_nom: MegavoltAmperes,
    pub r_pu: f64,
    pub x_pu: f64,
    pub type_info: Option<String>,
}

/// A load drawing power at a bus.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadRow {
    pub bus: String,
    /// Peak load
    pub p_set: Megawatts,
    pub annual_consumption: Option<MegawattHours>,
    /// Demand sector (e.g. "residential", "agricultural")
    pub sector: Option<String>,
    pub kind: LoadKind,
}

/// A generator feeding power in at a bus.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorRow {
    pub bus: String,
    /// Nominal power
    pub p_nom: Megawatts,
    pub control: Control,
    /// Technology (e.g. "solar", "wind", "gas")
    pub technology: String,
    pub subtype: Option<String>,
    /// Weather cell the feed-in profile is taken from, for fluctuating
    /// technologies
    pub weather_cell_id: Option<i64>,
}

impl Default for GeneratorRow {
    fn default() -> Self {
        Self {
            bus: String::new(),
            p_nom: Megawatts(0.0),
            control: Control::PQ,
            technology: String::new(),
            subtype: None,
            weather_cell_id: None,
        }
    }
}

/// A storage unit attached to a bus.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnitRow {
    pub bus: String,
    pub p_nom: Megawatts,
    pub control: Control,
    /// Energy capacity expressed as hours of full-power dispatch
    pub max_hours: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
}

impl Default for StorageUnitRow {
    fn default() -> Self {
        Self {
            bus: String::new(),
            p_nom: Megawatts(0.0),
            control: Control::PQ,
            max_hours: 6.0,
            efficiency_store: 1.0,
            efficiency_dispatch: 1.0,
        }
    }
}

/// A switch disconnector embedded in a branch.
///
/// The switch toggles which of two candidate buses the branch currently
/// terminates at. Its state is not stored as a flag; it is inferred from the
/// branch endpoints and cached here. See [`Switch`] for the state machine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SwitchRow {
    /// Line the switch is embedded in
    pub branch: String,
    /// Bus the branch terminates at while the switch is open
    pub bus_open: String,
    /// Bus the branch terminates at while the switch is closed
    pub bus_closed: String,
    pub type_info: Option<String>,
    /// Cached state, lazily determined through [`Switch::state`]. Mutating
    /// the branch endpoints through another path does not invalidate it.
    pub state: Option<SwitchState>,
}

/// Identifiers of everything attached to one bus, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentsAtBus {
    pub lines: Vec<String>,
    pub transformers: Vec<String>,
    pub loads: Vec<String>,
    pub generators: Vec<String>,
    pub storage_units: Vec<String>,
    pub switches: Vec<String>,
}

impl ComponentsAtBus {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
            && self.transformers.is_empty()
            && self.loads.is_empty()
            && self.generators.is_empty()
            && self.storage_units.is_empty()
            && self.switches.is_empty()
    }
}

/// The topology store: one sorted table per component kind.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    buses: BTreeMap<String, BusRow>,
    lines: BTreeMap<String, LineRow>,
    transformers: BTreeMap<String, TransformerRow>,
    loads: BTreeMap<String, LoadRow>,
    generators: BTreeMap<String, GeneratorRow>,
    storage_units: BTreeMap<String, StorageUnitRow>,
    switches: BTreeMap<String, SwitchRow>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Table access
    // =========================================================================

    pub fn buses(&self) -> &BTreeMap<String, BusRow> {
        &self.buses
    }

    pub fn lines(&self) -> &BTreeMap<String, LineRow> {
        &self.lines
    }

    pub fn transformers(&self) -> &BTreeMap<String, TransformerRow> {
        &self.transformers
    }

    pub fn loads(&self) -> &BTreeMap<String, LoadRow> {
        &self.loads
    }

    pub fn generators(&self) -> &BTreeMap<String, GeneratorRow> {
        &self.generators
    }

    pub fn storage_units(&self) -> &BTreeMap<String, StorageUnitRow> {
        &self.storage_units
    }

    pub fn switches(&self) -> &BTreeMap<String, SwitchRow> {
        &self.switches
    }

    /// Look up one bus row.
    pub fn bus(&self, id: &str) -> TopologyResult<&BusRow> {
        self.buses
            .get(id)
            .ok_or_else(|| TopologyError::UnknownComponent {
                kind: ComponentKind::Bus,
                id: id.to_string(),
            })
    }

    /// Look up one line row.
    pub fn line(&self, id: &str) -> TopologyResult<&LineRow> {
        self.lines
            .get(id)
            .ok_or_else(|| TopologyError::UnknownComponent {
                kind: ComponentKind::Line,
                id: id.to_string(),
            })
    }

    pub(crate) fn line_mut(&mut self, id: &str) -> TopologyResult<&mut LineRow> {
        self.lines
            .get_mut(id)
            .ok_or_else(|| TopologyError::UnknownComponent {
                kind: ComponentKind::Line,
                id: id.to_string(),
            })
    }

    pub(crate) fn loads_mut(&mut self) -> &mut BTreeMap<String, LoadRow> {
        &mut self.loads
    }

    pub(crate) fn generators_mut(&mut self) -> &mut BTreeMap<String, GeneratorRow> {
        &mut self.generators
    }

    pub(crate) fn storage_units_mut(&mut self) -> &mut BTreeMap<String, StorageUnitRow> {
        &mut self.storage_units
    }

    pub(crate) fn switches_mut(&mut self) -> &mut BTreeMap<String, SwitchRow> {
        &mut self.switches
    }

    fn require_bus(&self, bus: &str) -> TopologyResult<()> {
        if self.buses.contains_key(bus) {
            Ok(())
        } else {
            Err(TopologyError::UnknownBus {
                bus: bus.to_string(),
            })
        }
    }

    // =========================================================================
    // Adding components
    // =========================================================================

    /// Add a bus under an explicit identifier.
    pub fn add_bus(&mut self, name: impl Into<String>, row: BusRow) -> TopologyResult<String> {
        let name = name.into();
        if self.buses.contains_key(&name) {
            return Err(TopologyError::DuplicateComponent {
                kind: ComponentKind::Bus,
                id: name,
            });
        }
        self.buses.insert(name.clone(), row);
        Ok(name)
    }

    /// Add a line. Both endpoint buses must exist.
    ///
    /// When `name` is `None` the identifier is derived as
    /// `Line_{bus0}_{bus1}`. If a line between the same pair of buses already
    /// exists (in either orientation), its identifier is returned and the
    /// given row is discarded.
    pub fn add_line(&mut self, name: Option<String>, row: LineRow) -> TopologyResult<String> {
        self.require_bus(&row.bus0)?;
        self.require_bus(&row.bus1)?;

        if name.is_none() {
            if let Some(existing) = self.lines.iter().find_map(|(id, l)| {
                let same = (l.bus0 == row.bus0 && l.bus1 == row.bus1)
                    || (l.bus0 == row.bus1 && l.bus1 == row.bus0);
                same.then(|| id.clone())
            }) {
                return Ok(existing);
            }
        }

        let name = match name {
            Some(name) => {
                if self.lines.contains_key(&name) {
                    return Err(TopologyError::DuplicateComponent {
                        kind: ComponentKind::Line,
                        id: name,
                    });
                }
                name
            }
            None => {
                let base = format!("Line_{}_{}", row.bus0, row.bus1);
                self.free_name(&base, |t, n| t.lines.contains_key(n))
            }
        };
        self.lines.insert(name.clone(), row);
        Ok(name)
    }

    /// Add a transformer. Both endpoint buses must exist.
    pub fn add_transformer(
        &mut self,
        name: Option<String>,
        row: TransformerRow,
    ) -> TopologyResult<String> {
        self.require_bus(&row.bus0)?;
        self.require_bus(&row.bus1)?;
        let name = match name {
            Some(name) => {
                if self.transformers.contains_key(&name) {
                    return Err(TopologyError::DuplicateComponent {
                        kind: ComponentKind::Transformer,
                        id: name,
                    });
                }
                name
            }
            None => {
                let base = format!("Transformer_{}_{}", row.bus0, row.bus1);
                self.free_name(&base, |t, n| t.transformers.contains_key(n))
            }
        };
        self.transformers.insert(name.clone(), row);
        Ok(name)
    }

    /// Add a load. The bus must exist.
    ///
    /// Derived identifiers follow `{kind}_{grid}_{sector}_{n}` where `n`
    /// counts loads of that kind in the bus's grid, e.g.
    /// `Conventional_Load_LVGrid_1_residential_10`.
    pub fn add_load(&mut self, name: Option<String>, row: LoadRow) -> TopologyResult<String> {
        self.require_bus(&row.bus)?;
        let name = match name {
            Some(name) => {
                if self.loads.contains_key(&name) {
                    return Err(TopologyError::DuplicateComponent {
                        kind: ComponentKind::Load,
                        id: name,
                    });
                }
                name
            }
            None => {
                let grid = self.grid_of_bus(&row.bus)?;
                let in_grid = self
                    .loads
                    .values()
                    .filter(|l| l.kind == row.kind && self.bus_in_grid(&l.bus, grid))
                    .count();
                let base = match &row.sector {
                    Some(sector) => {
                        format!("{}_{}_{}_{}", row.kind.name_prefix(), grid, sector, in_grid + 1)
                    }
                    None => format!("{}_{}_{}", row.kind.name_prefix(), grid, in_grid + 1),
                };
                self.free_name(&base, |t, n| t.loads.contains_key(n))
            }
        };
        self.loads.insert(name.clone(), row);
        Ok(name)
    }

    /// Add a generator. The bus must exist.
    ///
    /// Derived identifiers follow `Generator_{grid}_{technology}`, numbered
    /// once the plain form is taken, e.g. `Generator_MVGrid_1_solar_2`.
    pub fn add_generator(
        &mut self,
        name: Option<String>,
        row: GeneratorRow,
    ) -> TopologyResult<String> {
        self.require_bus(&row.bus)?;
        let name = match name {
            Some(name) => {
                if self.generators.contains_key(&name) {
                    return Err(TopologyError::DuplicateComponent {
                        kind: ComponentKind::Generator,
                        id: name,
                    });
                }
                name
            }
            None => {
                let grid = self.grid_of_bus(&row.bus)?;
                let base = format!("Generator_{}_{}", grid, row.technology);
                self.free_name(&base, |t, n| t.generators.contains_key(n))
            }
        };
        self.generators.insert(name.clone(), row);
        Ok(name)
    }

    /// Add a storage unit. The bus must exist.
    ///
    /// Derived identifiers follow `StorageUnit_{grid}_{n}` where `n` counts
    /// storage units in the bus's grid.
    pub fn add_storage_unit(
        &mut self,
        name: Option<String>,
        row: StorageUnitRow,
    ) -> TopologyResult<String> {
        self.require_bus(&row.bus)?;
        let name = match name {
            Some(name) => {
                if self.storage_units.contains_key(&name) {
                    return Err(TopologyError::DuplicateComponent {
                        kind: ComponentKind::StorageUnit,
                        id: name,
                    });
                }
                name
            }
            None => {
                let grid = self.grid_of_bus(&row.bus)?;
                let in_grid = self
                    .storage_units
                    .values()
                    .filter(|s| self.bus_in_grid(&s.bus, grid))
                    .count();
                let base = format!("StorageUnit_{}_{}", grid, in_grid + 1);
                self.free_name(&base, |t, n| t.storage_units.contains_key(n))
            }
        };
        self.storage_units.insert(name.clone(), row);
        Ok(name)
    }

    /// Add a switch under an explicit identifier. The branch and both
    /// candidate buses must exist.
    pub fn add_switch(&mut self, name: impl Into<String>, row: SwitchRow) -> TopologyResult<String> {
        let name = name.into();
        if self.switches.contains_key(&name) {
            return Err(TopologyError::DuplicateComponent {
                kind: ComponentKind::Switch,
                id: name,
            });
        }
        self.line(&row.branch)?;
        self.require_bus(&row.bus_open)?;
        self.require_bus(&row.bus_closed)?;
        self.switches.insert(name.clone(), row);
        Ok(name)
    }

    /// Find a free identifier: the base itself, else `{base}_2`, `{base}_3`, ...
    fn free_name(&self, base: &str, taken: impl Fn(&Self, &str) -> bool) -> String {
        if !taken(self, base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if !taken(self, &candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // =========================================================================
    // Raw insertion
    // =========================================================================

    // Importers load whole tables before cross-references can be resolved, so
    // these skip reference validation. Callers are expected to run
    // [`Topology::check_integrity`] once all tables are in place. Inserting
    // under an existing identifier replaces the stored row.

    pub fn insert_bus_row(&mut self, name: impl Into<String>, row: BusRow) {
        self.buses.insert(name.into(), row);
    }

    pub fn insert_line_row(&mut self, name: impl Into<String>, row: LineRow) {
        self.lines.insert(name.into(), row);
    }

    pub fn insert_transformer_row(&mut self, name: impl Into<String>, row: TransformerRow) {
        self.transformers.insert(name.into(), row);
    }

    pub fn insert_load_row(&mut self, name: impl Into<String>, row: LoadRow) {
        self.loads.insert(name.into(), row);
    }

    pub fn insert_generator_row(&mut self, name: impl Into<String>, row: GeneratorRow) {
        self.generators.insert(name.into(), row);
    }

    pub fn insert_storage_unit_row(&mut self, name: impl Into<String>, row: StorageUnitRow) {
        self.storage_units.insert(name.into(), row);
    }

    pub fn insert_switch_row(&mut self, name: impl Into<String>, row: SwitchRow) {
        self.switches.insert(name.into(), row);
    }

    // =========================================================================
    // Removing components
    // =========================================================================

    /// Remove a bus. Refused while any line, transformer, component or switch
    /// still attaches to it.
    pub fn remove_bus(&mut self, name: &str) -> TopologyResult<BusRow> {
        self.bus(name)?;
        let attached = self.components_at_bus(name);
        if !attached.is_empty() {
            return Err(TopologyError::BusInUse {
                bus: name.to_string(),
            });
        }
        match self.buses.remove(name) {
            Some(row) => Ok(row),
            None => Err(TopologyError::UnknownComponent {
                kind: ComponentKind::Bus,
                id: name.to_string(),
            }),
        }
    }

    pub fn remove_line(&mut self, name: &str) -> TopologyResult<LineRow> {
        self.lines
            .remove(name)
            .ok_or_else(|| TopologyError::UnknownComponent {
                kind: ComponentKind::Line,
                id: name.to_string(),
            })
    }

    pub fn remove_transformer(&mut self, name: &str) -> TopologyResult<TransformerRow> {
        self.transformers
            .remove(name)
            .ok_or_else(|| TopologyError::UnknownComponent {
                kind: ComponentKind::Transformer,
                id: name.to_string(),
            })
    }

    pub fn remove_load(&mut self, name: &str) -> TopologyResult<LoadRow> {
        self.loads
            .remove(name)
            .ok_or_else(|| TopologyError::UnknownComponent {
                kind: ComponentKind::Load,
                id: name.to_string(),
            })
    }

    pub fn remove_generator(&mut self, name: &str) -> TopologyResult<GeneratorRow> {
        self.generators
            .remove(name)
            .ok_or_else(|| TopologyError::UnknownComponent {
                kind: ComponentKind::Generator,
                id: name.to_string(),
            })
    }

    pub fn remove_storage_unit(&mut self, name: &str) -> TopologyResult<StorageUnitRow> {
        self.storage_units
            .remove(name)
            .ok_or_else(|| TopologyError::UnknownComponent {
                kind: ComponentKind::StorageUnit,
                id: name.to_string(),
            })
    }

    pub fn remove_switch(&mut self, name: &str) -> TopologyResult<SwitchRow> {
        self.switches
            .remove(name)
            .ok_or_else(|| TopologyError::UnknownComponent {
                kind: ComponentKind::Switch,
                id: name.to_string(),
            })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Lines with the given bus as either endpoint.
    pub fn lines_at_bus(&self, bus: &str) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(_, l)| l.bus0 == bus || l.bus1 == bus)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Everything attached to the given bus, grouped by kind.
    pub fn components_at_bus(&self, bus: &str) -> ComponentsAtBus {
        let mut result = ComponentsAtBus::default();
        for (id, l) in &self.lines {
            if l.bus0 == bus || l.bus1 == bus {
                result.lines.push(id.clone());
            }
        }
        for (id, t) in &self.transformers {
            if t.bus0 == bus || t.bus1 == bus {
                result.transformers.push(id.clone());
            }
        }
        for (id, l) in &self.loads {
            if l.bus == bus {
                result.loads.push(id.clone());
            }
        }
        for (id, g) in &self.generators {
            if g.bus == bus {
                result.generators.push(id.clone());
            }
        }
        for (id, s) in &self.storage_units {
            if s.bus == bus {
                result.storage_units.push(id.clone());
            }
        }
        for (id, s) in &self.switches {
            if s.bus_open == bus || s.bus_closed == bus {
                result.switches.push(id.clone());
            }
        }
        result
    }

    /// Buses reachable from the given bus over one line or transformer.
    pub fn neighbours(&self, bus: &str) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        for l in self.lines.values() {
            if l.bus0 == bus {
                result.insert(l.bus1.clone());
            } else if l.bus1 == bus {
                result.insert(l.bus0.clone());
            }
        }
        for t in self.transformers.values() {
            if t.bus0 == bus {
                result.insert(t.bus1.clone());
            } else if t.bus1 == bus {
                result.insert(t.bus0.clone());
            }
        }
        result
    }

    /// Grid assignment of one bus.
    pub fn grid_of_bus(&self, bus: &str) -> TopologyResult<GridId> {
        let row = self.bus(bus)?;
        Ok(match row.lv_grid_id {
            Some(lv) => GridId::Lv(lv),
            None => GridId::Mv(row.mv_grid_id),
        })
    }

    fn bus_in_grid(&self, bus: &str, grid: GridId) -> bool {
        self.grid_of_bus(bus).map(|g| g == grid).unwrap_or(false)
    }

    /// The MV grid identifier, taken from the buses table.
    pub fn mv_grid_id(&self) -> Option<i64> {
        self.buses
            .values()
            .find(|b| b.lv_grid_id.is_none())
            .map(|b| b.mv_grid_id)
            .or_else(|| self.buses.values().next().map(|b| b.mv_grid_id))
    }

    /// Sorted distinct LV grid identifiers.
    pub fn lv_grid_ids(&self) -> Vec<i64> {
        let ids: BTreeSet<i64> = self.buses.values().filter_map(|b| b.lv_grid_id).collect();
        ids.into_iter().collect()
    }

    /// Compute basic statistics about the topology
    pub fn stats(&self) -> TopologyStats {
        TopologyStats {
            num_buses: self.buses.len(),
            num_lines: self.lines.len(),
            num_transformers: self.transformers.len(),
            num_loads: self.loads.len(),
            num_generators: self.generators.len(),
            num_storage_units: self.storage_units.len(),
            num_switches: self.switches.len(),
            num_lv_grids: self.lv_grid_ids().len(),
            total_peak_load: self.loads.values().map(|l| l.p_set).sum(),
            total_generation_capacity: self.generators.values().map(|g| g.p_nom).sum(),
            total_storage_capacity: self.storage_units.values().map(|s| s.p_nom).sum(),
        }
    }

    // =========================================================================
    // Integrity checks
    // =========================================================================

    /// Run all structural checks, returning the collected diagnostics.
    pub fn check_integrity(&self) -> Diagnostics {
        let mut diag = Diagnostics::new();
        self.check_integrity_into(&mut diag);
        diag
    }

    /// Check the topology for structural problems.
    ///
    /// Populates the provided `Diagnostics` with any warnings/errors found:
    /// dangling bus references, duplicate identifiers across tables, isolated
    /// buses and islands, non-positive powers, and broken switches.
    pub fn check_integrity_into(&self, diag: &mut Diagnostics) {
        if self.buses.is_empty() {
            diag.add_warning("structure", "topology has no buses");
            return;
        }

        for (id, l) in &self.lines {
            for bus in [&l.bus0, &l.bus1] {
                if !self.buses.contains_key(bus) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("line endpoint references missing bus {bus}"),
                        id,
                    );
                }
            }
        }
        for (id, t) in &self.transformers {
            for bus in [&t.bus0, &t.bus1] {
                if !self.buses.contains_key(bus) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("transformer endpoint references missing bus {bus}"),
                        id,
                    );
                }
            }
        }
        for (id, l) in &self.loads {
            if !self.buses.contains_key(&l.bus) {
                diag.add_error_with_entity(
                    "reference",
                    &format!("load references missing bus {}", l.bus),
                    id,
                );
            }
        }
        for (id, g) in &self.generators {
            if !self.buses.contains_key(&g.bus) {
                diag.add_error_with_entity(
                    "reference",
                    &format!("generator references missing bus {}", g.bus),
                    id,
                );
            }
        }
        for (id, s) in &self.storage_units {
            if !self.buses.contains_key(&s.bus) {
                diag.add_error_with_entity(
                    "reference",
                    &format!("storage unit references missing bus {}", s.bus),
                    id,
                );
            }
        }

        self.check_duplicate_names(diag);

        for (id, s) in &self.switches {
            if !self.lines.contains_key(&s.branch) {
                diag.add_error_with_entity(
                    "switch",
                    &format!("switch references missing branch {}", s.branch),
                    id,
                );
                continue;
            }
            for bus in [&s.bus_open, &s.bus_closed] {
                if !self.buses.contains_key(bus) {
                    diag.add_error_with_entity(
                        "switch",
                        &format!("switch references missing bus {bus}"),
                        id,
                    );
                }
            }
            if switch::infer_state(self, s).is_err() {
                diag.add_warning_with_entity(
                    "switch",
                    "switch state cannot be determined from branch endpoints",
                    id,
                );
            }
        }

        for (id, b) in &self.buses {
            if b.v_nom.value() <= 0.0 {
                diag.add_warning_with_entity("power", "bus has non-positive v_nom", id);
            }
            if b.v_nom.value() < 1.0 && b.v_nom.value() > 0.0 && b.lv_grid_id.is_none() {
                diag.add_warning_with_entity(
                    "grid",
                    "low-voltage bus carries no lv_grid_id",
                    id,
                );
            }
        }
        for (id, g) in &self.generators {
            if g.p_nom.value() <= 0.0 {
                diag.add_warning_with_entity("power", "generator has non-positive p_nom", id);
            }
        }
        for (id, l) in &self.loads {
            if l.p_set.value() < 0.0 {
                diag.add_warning_with_entity("power", "load has negative p_set", id);
            }
        }
        for (id, s) in &self.storage_units {
            if s.p_nom.value() <= 0.0 {
                diag.add_warning_with_entity("power", "storage unit has non-positive p_nom", id);
            }
        }

        let graph = self.to_graph();
        let analysis = graph::find_islands(&graph);
        if analysis.islands.len() > 1 {
            diag.add_warning(
                "connectivity",
                &format!("topology splits into {} islands", analysis.islands.len()),
            );
        }
        for bus in graph::isolated_buses(&graph) {
            diag.add_warning_with_entity("connectivity", "bus has no connected branch", &bus);
        }
    }

    /// Identifiers must be unique across all component tables, not just
    /// within one, so views and diagnostics can name components unambiguously.
    fn check_duplicate_names(&self, diag: &mut Diagnostics) {
        let mut seen: BTreeMap<&str, &'static str> = BTreeMap::new();
        let tables: [(&'static str, Box<dyn Iterator<Item = &String> + '_>); 7] = [
            ("bus", Box::new(self.buses.keys())),
            ("line", Box::new(self.lines.keys())),
            ("transformer", Box::new(self.transformers.keys())),
            ("load", Box::new(self.loads.keys())),
            ("generator", Box::new(self.generators.keys())),
            ("storage unit", Box::new(self.storage_units.keys())),
            ("switch", Box::new(self.switches.keys())),
        ];
        for (kind, keys) in tables {
            for key in keys {
                if let Some(other) = seen.insert(key.as_str(), kind) {
                    diag.add_error_with_entity(
                        "identity",
                        &format!("identifier used by both a {other} and a {kind}"),
                        key,
                    );
                }
            }
        }
    }
}

/// Statistics about a topology's size and capacity
#[derive(Debug, Clone, Default)]
pub struct TopologyStats {
    pub num_buses: usize,
    pub num_lines: usize,
    pub num_transformers: usize,
    pub num_loads: usize,
    pub num_generators: usize,
    pub num_storage_units: usize,
    pub num_switches: usize,
    pub num_lv_grids: usize,
    pub total_peak_load: Megawatts,
    pub total_generation_capacity: Megawatts,
    pub total_storage_capacity: Megawatts,
}

impl std::fmt::Display for TopologyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} transformers, {} loads ({:.3} MW), {} generators ({:.3} MW), {} storage units ({:.3} MW), {} switches, {} LV grids",
            self.num_buses,
            self.num_lines,
            self.num_transformers,
            self.num_loads,
            self.total_peak_load.value(),
            self.num_generators,
            self.total_generation_capacity.value(),
            self.num_storage_units,
            self.total_storage_capacity.value(),
            self.num_switches,
            self.num_lv_grids
        )
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::ding0_style_topology;
    use super::*;

    #[test]
    fn test_add_bus_and_duplicate() {
        let mut t = Topology::new();
        let name = t
            .add_bus(
                "Test_bus",
                BusRow {
                    v_nom: Kilovolts(20.0),
                    mv_grid_id: 1,
                    ..BusRow::default()
                },
            )
            .unwrap();
        assert_eq!(name, "Test_bus");

        let err = t.add_bus("Test_bus", BusRow::default()).unwrap_err();
        assert!(matches!(err, TopologyError::DuplicateComponent { .. }));
    }

    #[test]
    fn test_add_line_derives_name() {
        let mut t = ding0_style_topology();
        let name = t
            .add_line(
                None,
                LineRow {
                    bus0: "Bus_BranchTee_MVGrid_1_1".into(),
                    bus1: "Bus_virtual_MVGrid_1".into(),
                    length: Kilometers(1.0),
                    r: 1.0,
                    x: 1.0,
                    ..LineRow::default()
                },
            )
            .unwrap();
        assert_eq!(name, "Line_Bus_BranchTee_MVGrid_1_1_Bus_virtual_MVGrid_1");
    }

    #[test]
    fn test_add_line_reuses_existing_between_same_buses() {
        let mut t = ding0_style_topology();
        let before = t.lines().len();
        let name = t
            .add_line(
                None,
                LineRow {
                    bus0: "Bus_BranchTee_MVGrid_1_1".into(),
                    bus1: "Bus_MVStation_1".into(),
                    length: Kilometers(9.0),
                    r: 9.0,
                    x: 9.0,
                    ..LineRow::default()
                },
            )
            .unwrap();
        assert_eq!(name, "Line_station_tee_1");
        assert_eq!(t.lines().len(), before);
        // existing row untouched
        assert_eq!(t.line("Line_station_tee_1").unwrap().r, 0.15);
    }

    #[test]
    fn test_add_line_unknown_bus() {
        let mut t = ding0_style_topology();
        let err = t
            .add_line(
                None,
                LineRow {
                    bus0: "Testbus".into(),
                    bus1: "Bus_MVStation_1".into(),
                    ..LineRow::default()
                },
            )
            .unwrap_err();
        assert_eq!(
            err,
            TopologyError::UnknownBus {
                bus: "Testbus".into()
            }
        );
    }

    #[test]
    fn test_add_load_derives_name() {
        let mut t = ding0_style_topology();
        let name = t
            .add_load(
                None,
                LoadRow {
                    bus: "Bus_BranchTee_LVGrid_1_1".into(),
                    p_set: Megawatts(1.0),
                    sector: Some("residential".into()),
                    ..LoadRow::default()
                },
            )
            .unwrap();
        // two conventional loads already live in LVGrid_1
        assert_eq!(name, "Conventional_Load_LVGrid_1_residential_3");

        let name = t
            .add_load(
                None,
                LoadRow {
                    bus: "Bus_BranchTee_LVGrid_1_1".into(),
                    p_set: Megawatts(2.0),
                    ..LoadRow::default()
                },
            )
            .unwrap();
        assert_eq!(name, "Conventional_Load_LVGrid_1_4");
    }

    #[test]
    fn test_add_charging_point_derives_name() {
        let mut t = ding0_style_topology();
        let name = t
            .add_load(
                None,
                LoadRow {
                    bus: "Bus_BranchTee_MVGrid_1_1".into(),
                    p_set: Megawatts(0.5),
                    sector: Some("home".into()),
                    kind: LoadKind::ChargingPoint,
                    ..LoadRow::default()
                },
            )
            .unwrap();
        assert_eq!(name, "Charging_Point_MVGrid_1_home_1");
    }

    #[test]
    fn test_add_load_unknown_bus() {
        let mut t = ding0_style_topology();
        let err = t
            .add_load(
                None,
                LoadRow {
                    bus: "Unknown_bus".into(),
                    p_set: Megawatts(1.0),
                    ..LoadRow::default()
                },
            )
            .unwrap_err();
        assert_eq!(
            err,
            TopologyError::UnknownBus {
                bus: "Unknown_bus".into()
            }
        );
    }

    #[test]
    fn test_add_generator_derives_name() {
        let mut t = ding0_style_topology();
        let name = t
            .add_generator(
                None,
                GeneratorRow {
                    bus: "Bus_BranchTee_MVGrid_1_1".into(),
                    p_nom: Megawatts(1.0),
                    technology: "solar".into(),
                    ..GeneratorRow::default()
                },
            )
            .unwrap();
        assert_eq!(name, "Generator_MVGrid_1_solar");

        // plain form now taken, next one gets numbered
        let name = t
            .add_generator(
                None,
                GeneratorRow {
                    bus: "Bus_BranchTee_MVGrid_1_1".into(),
                    p_nom: Megawatts(1.0),
                    technology: "solar".into(),
                    ..GeneratorRow::default()
                },
            )
            .unwrap();
        assert_eq!(name, "Generator_MVGrid_1_solar_2");
    }

    #[test]
    fn test_add_storage_unit_derives_name() {
        let mut t = ding0_style_topology();
        let name = t
            .add_storage_unit(
                None,
                StorageUnitRow {
                    bus: "Bus_BranchTee_LVGrid_1_1".into(),
                    p_nom: Megawatts(1.0),
                    ..StorageUnitRow::default()
                },
            )
            .unwrap();
        // one storage unit already lives in LVGrid_1
        assert_eq!(name, "StorageUnit_LVGrid_1_2");
    }

    #[test]
    fn test_remove_bus_refused_while_attached() {
        let mut t = ding0_style_topology();
        let err = t.remove_bus("Bus_BranchTee_LVGrid_1_1").unwrap_err();
        assert_eq!(
            err,
            TopologyError::BusInUse {
                bus: "Bus_BranchTee_LVGrid_1_1".into()
            }
        );
    }

    #[test]
    fn test_remove_bus_after_detaching() {
        let mut t = ding0_style_topology();
        t.remove_load("Load_agricultural_LVGrid_1_1").unwrap();
        t.remove_load("Load_residential_LVGrid_1_1").unwrap();
        t.remove_generator("Generator_LVGrid_1_solar").unwrap();
        t.remove_storage_unit("StorageUnit_LVGrid_1_1").unwrap();
        t.remove_line("Line_lv_feeder_1").unwrap();
        assert!(t.remove_bus("Bus_BranchTee_LVGrid_1_1").is_ok());
        assert!(!t.buses().contains_key("Bus_BranchTee_LVGrid_1_1"));
    }

    #[test]
    fn test_lines_at_bus() {
        let t = ding0_style_topology();
        let lines = t.lines_at_bus("Bus_MVStation_1");
        assert_eq!(lines, vec!["Line_station_tee_1", "Line_station_tee_2"]);
    }

    #[test]
    fn test_components_at_bus() {
        let t = ding0_style_topology();
        let c = t.components_at_bus("Bus_BranchTee_LVGrid_1_1");
        assert_eq!(c.lines, vec!["Line_lv_feeder_1"]);
        assert_eq!(c.generators, vec!["Generator_LVGrid_1_solar"]);
        assert_eq!(
            c.loads,
            vec!["Load_agricultural_LVGrid_1_1", "Load_residential_LVGrid_1_1"]
        );
        assert_eq!(c.storage_units, vec!["StorageUnit_LVGrid_1_1"]);
        assert!(c.transformers.is_empty());
    }

    #[test]
    fn test_neighbours() {
        let t = ding0_style_topology();
        let n = t.neighbours("Bus_BranchTee_MVGrid_1_2");
        let expected: Vec<&str> = vec![
            "Bus_BranchTee_MVGrid_1_1",
            "Bus_MVStation_1",
            "Bus_secondary_LVGrid_1",
        ];
        assert_eq!(n.iter().map(String::as_str).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_grid_of_bus() {
        let t = ding0_style_topology();
        assert_eq!(t.grid_of_bus("Bus_MVStation_1").unwrap(), GridId::Mv(1));
        assert_eq!(
            t.grid_of_bus("Bus_BranchTee_LVGrid_1_1").unwrap(),
            GridId::Lv(1)
        );
        assert!(t.grid_of_bus("Unknown_bus").is_err());
    }

    #[test]
    fn test_lv_grid_ids() {
        let t = ding0_style_topology();
        assert_eq!(t.lv_grid_ids(), vec![1]);
        assert_eq!(t.mv_grid_id(), Some(1));
    }

    #[test]
    fn test_stats() {
        let t = ding0_style_topology();
        let stats = t.stats();
        assert_eq!(stats.num_buses, 6);
        assert_eq!(stats.num_lines, 4);
        assert_eq!(stats.num_transformers, 1);
        assert_eq!(stats.num_loads, 3);
        assert_eq!(stats.num_generators, 5);
        assert_eq!(stats.num_storage_units, 1);
        assert_eq!(stats.num_switches, 1);
        assert!((stats.total_generation_capacity.value() - 19.048).abs() < 1e-9);
        assert!((stats.total_peak_load.value() - 0.364627).abs() < 1e-9);

        let text = format!("{}", stats);
        assert!(text.contains("6 buses"));
        assert!(text.contains("4 lines"));
    }

    #[test]
    fn test_check_integrity_clean() {
        let t = ding0_style_topology();
        let diag = t.check_integrity();
        assert!(!diag.has_errors(), "unexpected: {diag}");
        // slack p_nom 0.0 is reported as a power warning
        assert!(diag
            .warnings()
            .any(|i| i.entity.as_deref() == Some("Generator_slack")));
    }

    #[test]
    fn test_check_integrity_dangling_reference() {
        let mut t = ding0_style_topology();
        t.loads_mut().insert(
            "Load_broken".into(),
            LoadRow {
                bus: "Bus_gone".into(),
                p_set: Megawatts(1.0),
                ..LoadRow::default()
            },
        );
        let diag = t.check_integrity();
        assert!(diag.has_errors());
        assert!(diag
            .errors()
            .any(|i| i.entity.as_deref() == Some("Load_broken")));
    }

    #[test]
    fn test_check_integrity_duplicate_across_tables() {
        let mut t = ding0_style_topology();
        t.generators_mut().insert(
            "Load_agricultural_LVGrid_1_1".into(),
            GeneratorRow {
                bus: "Bus_BranchTee_LVGrid_1_1".into(),
                p_nom: Megawatts(1.0),
                technology: "solar".into(),
                ..GeneratorRow::default()
            },
        );
        let diag = t.check_integrity();
        assert!(diag
            .issues_by_category("identity")
            .any(|i| i.severity == Severity::Error));
    }

    #[test]
    fn test_check_integrity_isolated_bus() {
        let mut t = ding0_style_topology();
        t.add_bus(
            "Bus_floating",
            BusRow {
                v_nom: Kilovolts(20.0),
                mv_grid_id: 1,
                ..BusRow::default()
            },
        )
        .unwrap();
        let diag = t.check_integrity();
        assert!(diag
            .issues_by_category("connectivity")
            .any(|i| i.entity.as_deref() == Some("Bus_floating")));
    }

    #[test]
    fn test_check_integrity_empty() {
        let t = Topology::new();
        let diag = t.check_integrity();
        assert!(diag.has_issues());
        assert!(!diag.has_errors());
    }
}
