//! [`PointGraph`]: free-standing nodes joined by explicit connections.

use crate::geom::Int3;
use crate::graph::NavGraph;
use crate::node::{Connection, GraphNode};
use crate::update::GraphUpdate;

/// A graph of arbitrary points with explicit, weighted connections.
///
/// Connections to unwalkable nodes are kept; the search filters them out.
#[derive(Clone, Debug, Default)]
pub struct PointGraph {
    nodes: Vec<GraphNode>,
    /// Outgoing edges per local slot: (neighbour slot, cost).
    edges: Vec<Vec<(u32, u32)>>,
}

impl PointGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a walkable node and return its local slot.
    pub fn add_node(&mut self, position: Int3) -> usize {
        self.nodes.push(GraphNode::new(position));
        self.edges.push(Vec::new());
        self.nodes.len() - 1
    }

    /// Connect two slots in both directions. `cost` defaults to the
    /// distance between the nodes, rounded up. Existing connections are updated.
    ///
    /// # Panics
    ///
    /// Panics if either slot does not exist.
    pub fn connect(&mut self, a: usize, b: usize, cost: Option<u32>) {
        assert!(a < self.nodes.len() && b < self.nodes.len(), "connect: slot out of range");
        let cost = cost.unwrap_or_else(|| (self.nodes[a].position - self.nodes[b].position).ceil_magnitude());
        self.add_edge(a, b, cost);
        self.add_edge(b, a, cost);
    }

    fn add_edge(&mut self, from: usize, to: usize, cost: u32) {
        let edges = &mut self.edges[from];
        match edges.iter_mut().find(|(n, _)| *n as usize == to) {
            Some(e) => e.1 = cost,
            None => edges.push((to as u32, cost)),
        }
    }

    /// Remove the connection between two slots in both directions.
    pub fn disconnect(&mut self, a: usize, b: usize) {
        self.edges[a].retain(|(n, _)| *n as usize != b);
        self.edges[b].retain(|(n, _)| *n as usize != a);
    }

    pub fn node(&self, local: usize) -> Option<&GraphNode> {
        self.nodes.get(local)
    }

    pub fn node_mut(&mut self, local: usize) -> Option<&mut GraphNode> {
        self.nodes.get_mut(local)
    }

    /// Number of outgoing connections of a slot.
    pub fn degree(&self, local: usize) -> usize {
        self.edges.get(local).map_or(0, Vec::len)
    }
}

impl NavGraph for PointGraph {
    #[inline]
    fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    #[inline]
    fn nodes_mut(&mut self) -> &mut [GraphNode] {
        &mut self.nodes
    }

    #[inline]
    fn for_each_connection<F: FnMut(Connection)>(&self, local: usize, mut f: F) {
        for &(n, cost) in &self.edges[local] {
            f(Connection {
                node: self.nodes[n as usize].index,
                cost,
            });
        }
    }

    fn apply_update(&mut self, update: &GraphUpdate) -> bool {
        let mut changed = false;
        for node in &mut self.nodes {
            if update.bounds.contains(node.position) {
                changed |= update.apply(node);
            }
        }
        changed
    }
}
