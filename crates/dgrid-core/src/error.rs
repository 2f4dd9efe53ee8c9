//! Error types for topology operations.
//!
//! All variants signal local invariant violations. They are never recovered
//! internally; callers receive them through [`TopologyResult`] and decide how
//! to proceed. Conversion into `anyhow::Error` happens at binary boundaries.

use thiserror::Error;

/// Kinds of components held by a topology, used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Bus,
    Line,
    Transformer,
    Load,
    Generator,
    StorageUnit,
    Switch,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Bus => "bus",
            ComponentKind::Line => "line",
            ComponentKind::Transformer => "transformer",
            ComponentKind::Load => "load",
            ComponentKind::Generator => "generator",
            ComponentKind::StorageUnit => "storage unit",
            ComponentKind::Switch => "switch",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by topology mutation and switch operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// Switch state cannot be determined from the branch endpoints.
    #[error("state of switch {switch} cannot be determined: {detail}")]
    InconsistentTopology { switch: String, detail: String },

    /// Open/close cannot find the expected candidate bus on the branch.
    #[error("branch {branch} of switch {switch} has no endpoint at bus {bus}")]
    InvalidTopology {
        switch: String,
        branch: String,
        bus: String,
    },

    /// Component (re)bound to a bus identifier absent from the topology.
    #[error("specified bus {bus} is not valid as it is not defined in the topology")]
    UnknownBus { bus: String },

    /// Lookup of a component identifier that is not defined.
    #[error("{kind} {id} is not defined in the topology")]
    UnknownComponent { kind: ComponentKind, id: String },

    /// Add with an identifier that already exists.
    #[error("{kind} {id} already exists in the topology")]
    DuplicateComponent { kind: ComponentKind, id: String },

    /// Bus removal refused while lines or components still attach to it.
    #[error("bus {bus} still has attached lines or components and cannot be removed")]
    BusInUse { bus: String },
}

/// Convenience alias for Results using [`TopologyError`].
pub type TopologyResult<T> = Result<T, TopologyError>;
