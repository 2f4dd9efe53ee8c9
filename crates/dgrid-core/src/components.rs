//! Component capability trait and node-like component views.
//!
//! [`Load`], [`Generator`] and [`StorageUnit`] are thin accessors bound to
//! one row of the topology store by identifier. They read and write through
//! their topology reference, so every mutation is immediately visible to all
//! other views. The shared surface (id, bus, grid, set_bus) lives in the
//! [`Component`] trait; typed getters and setters for the row fields live on
//! the concrete views.

use crate::error::{ComponentKind, TopologyError, TopologyResult};
use crate::grids::{Grid, GridId};
use crate::units::{Kilovolts, MegawattHours, Megawatts};
use crate::{Control, GeneratorRow, LoadKind, LoadRow, StorageUnitRow, Topology};

/// Voltage level of the grid a component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoltageLevel {
    Mv,
    Lv,
}

impl std::fmt::Display for VoltageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoltageLevel::Mv => f.write_str("mv"),
            VoltageLevel::Lv => f.write_str("lv"),
        }
    }
}

/// Shared capability surface of node-like components.
pub trait Component {
    /// Identifier of the bound row.
    fn id(&self) -> &str;

    /// Bus the component attaches to.
    fn bus(&self) -> String;

    /// Grid the component belongs to, resolved through its bus.
    fn grid(&self) -> TopologyResult<GridId>;

    /// Rebind the component to another bus. The target must exist.
    fn set_bus(&mut self, bus: &str) -> TopologyResult<()>;

    /// Voltage level of the owning grid (nominal voltage above 1 kV is MV).
    fn voltage_level(&self) -> TopologyResult<VoltageLevel>;
}

fn voltage_level_of(topology: &Topology, bus: &str) -> TopologyResult<VoltageLevel> {
    let grid = Grid::new(topology, topology.grid_of_bus(bus)?);
    Ok(if grid.nominal_voltage() > Kilovolts(1.0) {
        VoltageLevel::Mv
    } else {
        VoltageLevel::Lv
    })
}

fn check_bus(topology: &Topology, bus: &str) -> TopologyResult<()> {
    if topology.buses().contains_key(bus) {
        Ok(())
    } else {
        Err(TopologyError::UnknownBus {
            bus: bus.to_string(),
        })
    }
}

/// Mutable view over one load row.
#[derive(Debug)]
pub struct Load<'a> {
    topology: &'a mut Topology,
    id: String,
}

/// Mutable view over one generator row.
#[derive(Debug)]
pub struct Generator<'a> {
    topology: &'a mut Topology,
    id: String,
}

/// Mutable view over one storage unit row.
#[derive(Debug)]
pub struct StorageUnit<'a> {
    topology: &'a mut Topology,
    id: String,
}

impl Topology {
    /// Bind a load view to an existing row.
    pub fn load(&mut self, id: &str) -> TopologyResult<Load<'_>> {
        if !self.loads().contains_key(id) {
            return Err(TopologyError::UnknownComponent {
                kind: ComponentKind::Load,
                id: id.to_string(),
            });
        }
        Ok(Load {
            topology: self,
            id: id.to_string(),
        })
    }

    /// Bind a generator view to an existing row.
    pub fn generator(&mut self, id: &str) -> TopologyResult<Generator<'_>> {
        if !self.generators().contains_key(id) {
            return Err(TopologyError::UnknownComponent {
                kind: ComponentKind::Generator,
                id: id.to_string(),
            });
        }
        Ok(Generator {
            topology: self,
            id: id.to_string(),
        })
    }

    /// Bind a storage unit view to an existing row.
    pub fn storage_unit(&mut self, id: &str) -> TopologyResult<StorageUnit<'_>> {
        if !self.storage_units().contains_key(id) {
            return Err(TopologyError::UnknownComponent {
                kind: ComponentKind::StorageUnit,
                id: id.to_string(),
            });
        }
        Ok(StorageUnit {
            topology: self,
            id: id.to_string(),
        })
    }
}

impl Load<'_> {
    fn row(&self) -> &LoadRow {
        self.topology
            .loads()
            .get(&self.id)
            .expect("load row pinned while the view borrows the topology")
    }

    fn row_mut(&mut self) -> &mut LoadRow {
        self.topology
            .loads_mut()
            .get_mut(&self.id)
            .expect("load row pinned while the view borrows the topology")
    }

    /// Peak load
    pub fn p_set(&self) -> Megawatts {
        self.row().p_set
    }

    pub fn set_p_set(&mut self, p_set: Megawatts) {
        self.row_mut().p_set = p_set;
    }

    pub fn annual_consumption(&self) -> Option<MegawattHours> {
        self.row().annual_consumption
    }

    pub fn sector(&self) -> Option<String> {
        self.row().sector.clone()
    }

    pub fn kind(&self) -> LoadKind {
        self.row().kind
    }
}

impl Component for Load<'_> {
    fn id(&self) -> &str {
        &self.id
    }

    fn bus(&self) -> String {
        self.row().bus.clone()
    }

    fn grid(&self) -> TopologyResult<GridId> {
        self.topology.grid_of_bus(&self.row().bus)
    }

    fn set_bus(&mut self, bus: &str) -> TopologyResult<()> {
        check_bus(self.topology, bus)?;
        self.row_mut().bus = bus.to_string();
        Ok(())
    }

    fn voltage_level(&self) -> TopologyResult<VoltageLevel> {
        voltage_level_of(self.topology, &self.row().bus)
    }
}

impl Generator<'_> {
    fn row(&self) -> &GeneratorRow {
        self.topology
            .generators()
            .get(&self.id)
            .expect("generator row pinned while the view borrows the topology")
    }

    fn row_mut(&mut self) -> &mut GeneratorRow {
        self.topology
            .generators_mut()
            .get_mut(&self.id)
            .expect("generator row pinned while the view borrows the topology")
    }

    /// Nominal power
    pub fn nominal_power(&self) -> Megawatts {
        self.row().p_nom
    }

    pub fn set_nominal_power(&mut self, p_nom: Megawatts) {
        self.row_mut().p_nom = p_nom;
    }

    pub fn control(&self) -> Control {
        self.row().control
    }

    /// Technology (e.g. "solar", "wind")
    pub fn technology(&self) -> String {
        self.row().technology.clone()
    }

    pub fn subtype(&self) -> Option<String> {
        self.row().subtype.clone()
    }

    pub fn weather_cell_id(&self) -> Option<i64> {
        self.row().weather_cell_id
    }
}

impl Component for Generator<'_> {
    fn id(&self) -> &str {
        &self.id
    }

    fn bus(&self) -> String {
        self.row().bus.clone()
    }

    fn grid(&self) -> TopologyResult<GridId> {
        self.topology.grid_of_bus(&self.row().bus)
    }

    fn set_bus(&mut self, bus: &str) -> TopologyResult<()> {
        check_bus(self.topology, bus)?;
        self.row_mut().bus = bus.to_string();
        Ok(())
    }

    fn voltage_level(&self) -> TopologyResult<VoltageLevel> {
        voltage_level_of(self.topology, &self.row().bus)
    }
}

impl StorageUnit<'_> {
    fn row(&self) -> &StorageUnitRow {
        self.topology
            .storage_units()
            .get(&self.id)
            .expect("storage unit row pinned while the view borrows the topology")
    }

    fn row_mut(&mut self) -> &mut StorageUnitRow {
        self.topology
            .storage_units_mut()
            .get_mut(&self.id)
            .expect("storage unit row pinned while the view borrows the topology")
    }

    pub fn nominal_power(&self) -> Megawatts {
        self.row().p_nom
    }

    pub fn set_nominal_power(&mut self, p_nom: Megawatts) {
        self.row_mut().p_nom = p_nom;
    }

    pub fn control(&self) -> Control {
        self.row().control
    }

    pub fn max_hours(&self) -> f64 {
        self.row().max_hours
    }

    pub fn efficiency_store(&self) -> f64 {
        self.row().efficiency_store
    }

    pub fn efficiency_dispatch(&self) -> f64 {
        self.row().efficiency_dispatch
    }
}

impl Component for StorageUnit<'_> {
    fn id(&self) -> &str {
        &self.id
    }

    fn bus(&self) -> String {
        self.row().bus.clone()
    }

    fn grid(&self) -> TopologyResult<GridId> {
        self.topology.grid_of_bus(&self.row().bus)
    }

    fn set_bus(&mut self, bus: &str) -> TopologyResult<()> {
        check_bus(self.topology, bus)?;
        self.row_mut().bus = bus.to_string();
        Ok(())
    }

    fn voltage_level(&self) -> TopologyResult<VoltageLevel> {
        voltage_level_of(self.topology, &self.row().bus)
    }
}
