//! Switch disconnector state machine.
//!
//! A switch is not a separate edge in the topology. It toggles which of two
//! candidate buses its branch currently terminates at: while closed the
//! branch ends at `bus_closed`, while open it ends at `bus_open` (usually an
//! otherwise isolated bus, so an open ring splits without any special-casing
//! in traversal code). The state is therefore inferred from the branch
//! endpoints rather than stored as a flag, and cached in the switch row until
//! the next transition.

use crate::error::{ComponentKind, TopologyError, TopologyResult};
use crate::{SwitchRow, Topology};

/// Observable state of a switch disconnector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Open,
    Closed,
}

impl SwitchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchState::Open => "open",
            SwitchState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SwitchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Determine a switch's state from its branch endpoints, without touching
/// the cache. Errors carry a human-readable detail naming which invariant
/// failed.
pub(crate) fn infer_state(topology: &Topology, row: &SwitchRow) -> Result<SwitchState, String> {
    let line = match topology.lines().get(&row.branch) {
        Some(line) => line,
        None => return Err(format!("branch {} is not defined", row.branch)),
    };

    let open_slots = [&line.bus0, &line.bus1]
        .iter()
        .filter(|b| ***b == row.bus_open)
        .count();
    let closed_slots = [&line.bus0, &line.bus1]
        .iter()
        .filter(|b| ***b == row.bus_closed)
        .count();

    match (open_slots, closed_slots) {
        (1, 0) => Ok(SwitchState::Open),
        (0, 1) => Ok(SwitchState::Closed),
        (0, 0) => Err(format!(
            "neither bus_open {} nor bus_closed {} is an endpoint of branch {}",
            row.bus_open, row.bus_closed, row.branch
        )),
        (0, 2) | (2, 0) => Err(format!(
            "a candidate bus occupies both endpoints of branch {}",
            row.branch
        )),
        _ => Err(format!(
            "both bus_open {} and bus_closed {} are endpoints of branch {}",
            row.bus_open, row.bus_closed, row.branch
        )),
    }
}

/// Mutable view over one switch row.
///
/// Obtained through [`Topology::switch`]; holds the topology exclusively for
/// its lifetime, so the row it is bound to cannot disappear underneath it.
#[derive(Debug)]
pub struct Switch<'a> {
    topology: &'a mut Topology,
    id: String,
}

impl Topology {
    /// Bind a switch view to an existing row.
    pub fn switch(&mut self, id: &str) -> TopologyResult<Switch<'_>> {
        if !self.switches().contains_key(id) {
            return Err(TopologyError::UnknownComponent {
                kind: ComponentKind::Switch,
                id: id.to_string(),
            });
        }
        Ok(Switch {
            topology: self,
            id: id.to_string(),
        })
    }
}

impl Switch<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn row(&self) -> &SwitchRow {
        self.topology
            .switches()
            .get(&self.id)
            .expect("switch row pinned while the view borrows the topology")
    }

    /// Line the switch is embedded in.
    pub fn branch(&self) -> String {
        self.row().branch.clone()
    }

    pub fn bus_open(&self) -> String {
        self.row().bus_open.clone()
    }

    pub fn bus_closed(&self) -> String {
        self.row().bus_closed.clone()
    }

    pub fn type_info(&self) -> Option<String> {
        self.row().type_info.clone()
    }

    /// Current state, determined from the branch endpoints on first read and
    /// cached until the next `open`/`close` transition.
    ///
    /// Rewiring the branch endpoints through another path does not invalidate
    /// the cache.
    pub fn state(&mut self) -> TopologyResult<SwitchState> {
        if let Some(state) = self.row().state {
            return Ok(state);
        }
        let state = match infer_state(self.topology, self.row()) {
            Ok(state) => state,
            Err(detail) => {
                return Err(TopologyError::InconsistentTopology {
                    switch: self.id.clone(),
                    detail,
                })
            }
        };
        self.cache_state(state);
        Ok(state)
    }

    /// Open the switch: rewrite the branch endpoint holding `bus_closed` to
    /// `bus_open`. No-op when already open. The branch is left untouched on
    /// failure.
    pub fn open(&mut self) -> TopologyResult<()> {
        if self.state()? == SwitchState::Open {
            return Ok(());
        }
        self.swap_endpoint(SwitchState::Open)
    }

    /// Close the switch: rewrite the branch endpoint holding `bus_open` to
    /// `bus_closed`. No-op when already closed.
    pub fn close(&mut self) -> TopologyResult<()> {
        if self.state()? == SwitchState::Closed {
            return Ok(());
        }
        self.swap_endpoint(SwitchState::Closed)
    }

    fn swap_endpoint(&mut self, target: SwitchState) -> TopologyResult<()> {
        let row = self.row();
        let branch = row.branch.clone();
        let (leaving, arriving) = match target {
            SwitchState::Open => (row.bus_closed.clone(), row.bus_open.clone()),
            SwitchState::Closed => (row.bus_open.clone(), row.bus_closed.clone()),
        };

        let line = self.topology.line_mut(&branch)?;
        if line.bus0 == leaving {
            line.bus0 = arriving;
        } else if line.bus1 == leaving {
            line.bus1 = arriving;
        } else {
            return Err(TopologyError::InvalidTopology {
                switch: self.id.clone(),
                branch,
                bus: leaving,
            });
        }
        self.cache_state(target);
        Ok(())
    }

    fn cache_state(&mut self, state: SwitchState) {
        if let Some(row) = self.topology.switches_mut().get_mut(&self.id) {
            row.state = Some(state);
        }
    }
}
