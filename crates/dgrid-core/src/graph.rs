//! Graph derivation and island analysis.
//!
//! A [`Topology`] stores components in flat tables; connectivity questions
//! (islands, isolated buses, visualization) are answered on a derived
//! [`petgraph`] view. The graph is rebuilt on demand from the tables, so it
//! never goes stale: buses become nodes, lines and transformers become
//! undirected edges.

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::{Graph, Undirected};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::Topology;

/// Branch that joins two buses in the derived graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEdge {
    /// Line identifier
    Line(String),
    /// Transformer identifier
    Transformer(String),
}

impl GraphEdge {
    /// Identifier of the underlying branch component
    pub fn branch_id(&self) -> &str {
        match self {
            GraphEdge::Line(id) | GraphEdge::Transformer(id) => id,
        }
    }
}

/// Undirected bus graph derived from a topology.
///
/// Node weights are bus identifiers, edge weights name the joining branch.
pub type TopologyGraph = Graph<String, GraphEdge, Undirected>;

/// Summary of one connected component of the bus graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandSummary {
    pub island_id: usize,
    pub bus_count: usize,
}

/// Island membership of a single bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusAssignment {
    pub bus: String,
    pub island_id: usize,
}

/// Aggregated island analysis result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandAnalysis {
    pub islands: Vec<IslandSummary>,
    pub assignments: Vec<BusAssignment>,
}

impl Topology {
    /// Derive the undirected bus graph.
    ///
    /// Every bus becomes a node. Lines and transformers become edges when
    /// both endpoints exist; branches with dangling references are skipped
    /// here and reported by [`Topology::check_integrity`] instead.
    pub fn to_graph(&self) -> TopologyGraph {
        let mut graph = TopologyGraph::new_undirected();
        let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();

        for id in self.buses().keys() {
            let node = graph.add_node(id.clone());
            index_of.insert(id.as_str(), node);
        }
        for (id, line) in self.lines() {
            if let (Some(&a), Some(&b)) = (
                index_of.get(line.bus0.as_str()),
                index_of.get(line.bus1.as_str()),
            ) {
                graph.add_edge(a, b, GraphEdge::Line(id.clone()));
            }
        }
        for (id, transformer) in self.transformers() {
            if let (Some(&a), Some(&b)) = (
                index_of.get(transformer.bus0.as_str()),
                index_of.get(transformer.bus1.as_str()),
            ) {
                graph.add_edge(a, b, GraphEdge::Transformer(id.clone()));
            }
        }
        graph
    }
}

/// Labels connected components (breadth-first search) and collects island
/// membership per bus. Islands are numbered in node insertion order, which
/// follows the sorted bus table.
pub fn find_islands(graph: &TopologyGraph) -> IslandAnalysis {
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    let mut assignments = Vec::new();
    let mut island_id = 0;
    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            members.push(node);
            for neighbor in graph.neighbors(node) {
                if !visited.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        islands.push(IslandSummary {
            island_id,
            bus_count: members.len(),
        });
        for node in members {
            assignments.push(BusAssignment {
                bus: graph[node].clone(),
                island_id,
            });
        }
        island_id += 1;
    }
    assignments.sort_by(|a, b| a.bus.cmp(&b.bus));
    IslandAnalysis {
        islands,
        assignments,
    }
}

/// Buses with no connected line or transformer
pub fn isolated_buses(graph: &TopologyGraph) -> Vec<String> {
    let mut isolated: Vec<String> = graph
        .node_indices()
        .filter(|&node| graph.neighbors(node).next().is_none())
        .map(|node| graph[node].clone())
        .collect();
    isolated.sort();
    isolated
}

/// Render the bus graph as a DOT string (Graphviz) for external visualization
pub fn to_dot(graph: &TopologyGraph) -> String {
    let mut buffer = String::new();
    buffer.push_str("graph dgrid_topology {\n");
    for node in graph.node_indices() {
        let label = graph[node].replace('"', "\\\"");
        buffer.push_str(&format!("  n{} [label=\"{}\"];\n", node.index(), label));
    }
    for edge in graph.edge_references() {
        let source = edge.source().index();
        let target = edge.target().index();
        let label = edge.weight().branch_id().replace('"', "\\\"");
        buffer.push_str(&format!(
            "  n{source} -- n{target} [label=\"{label}\"];\n"
        ));
    }
    buffer.push('}');
    buffer
}
