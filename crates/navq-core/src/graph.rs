//! The graph registry: [`NavGraph`], [`GraphKind`] and [`GraphSet`].
//!
//! Graph types are a closed set. [`GraphKind`] enumerates every supported
//! kind and dispatches to it with a `match`, so the per-connection callback
//! used by the search inner loop is monomorphized rather than boxed.

use crate::constraint::{NearestConstraint, NearestNode};
use crate::error::GraphError;
use crate::geom::Int3;
use crate::grid::GridGraph;
use crate::node::{Connection, GraphNode, NodeIndex};
use crate::point::PointGraph;
use crate::update::GraphUpdate;

/// Maximum number of graphs in a [`GraphSet`].
pub const MAX_GRAPHS: usize = 32;

// ---------------------------------------------------------------------------
// NavGraph
// ---------------------------------------------------------------------------

/// Behaviour shared by all graph kinds.
///
/// Nodes are addressed by their *local* slot inside the graph. Connections
/// report the neighbour's *global* [`NodeIndex`].
pub trait NavGraph {
    fn nodes(&self) -> &[GraphNode];

    fn nodes_mut(&mut self) -> &mut [GraphNode];

    /// Call `f` for every outgoing connection of the node at `local`.
    fn for_each_connection<F: FnMut(Connection)>(&self, local: usize, f: F);

    /// Closest node to `position` accepted by `constraint`.
    fn nearest(&self, position: Int3, constraint: &dyn NearestConstraint) -> Option<NearestNode> {
        nearest_by_scan(self.nodes(), position, constraint)
    }

    /// Apply `update` to the nodes inside its bounds.
    ///
    /// Returns `true` if the walkability of any node changed.
    fn apply_update(&mut self, update: &GraphUpdate) -> bool;
}

/// Linear nearest-node search over `nodes`.
pub fn nearest_by_scan(
    nodes: &[GraphNode],
    position: Int3,
    constraint: &dyn NearestConstraint,
) -> Option<NearestNode> {
    let mut best: Option<(i64, &GraphNode)> = None;
    for node in nodes {
        if !constraint.suitable(node) {
            continue;
        }
        let d = (node.position - position).sqr_magnitude();
        if best.is_none_or(|(bd, _)| d < bd) {
            best = Some((d, node));
        }
    }
    best.map(|(d, node)| NearestNode {
        node: node.index,
        position: node.position,
        distance: (d as f64).sqrt().round() as u32,
    })
}

// ---------------------------------------------------------------------------
// GraphKind
// ---------------------------------------------------------------------------

/// Every graph kind the engine knows about.
#[derive(Clone, Debug)]
pub enum GraphKind {
    Grid(GridGraph),
    Point(PointGraph),
}

impl GraphKind {
    /// Human readable kind name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Grid(_) => "grid",
            Self::Point(_) => "point",
        }
    }

    pub fn as_grid(&self) -> Option<&GridGraph> {
        match self {
            Self::Grid(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_grid_mut(&mut self) -> Option<&mut GridGraph> {
        match self {
            Self::Grid(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<&PointGraph> {
        match self {
            Self::Point(g) => Some(g),
            _ => None,
        }
    }
}

impl From<GridGraph> for GraphKind {
    fn from(g: GridGraph) -> Self {
        Self::Grid(g)
    }
}

impl From<PointGraph> for GraphKind {
    fn from(g: PointGraph) -> Self {
        Self::Point(g)
    }
}

impl NavGraph for GraphKind {
    #[inline]
    fn nodes(&self) -> &[GraphNode] {
        match self {
            Self::Grid(g) => g.nodes(),
            Self::Point(g) => g.nodes(),
        }
    }

    #[inline]
    fn nodes_mut(&mut self) -> &mut [GraphNode] {
        match self {
            Self::Grid(g) => g.nodes_mut(),
            Self::Point(g) => g.nodes_mut(),
        }
    }

    #[inline]
    fn for_each_connection<F: FnMut(Connection)>(&self, local: usize, f: F) {
        match self {
            Self::Grid(g) => g.for_each_connection(local, f),
            Self::Point(g) => g.for_each_connection(local, f),
        }
    }

    fn nearest(&self, position: Int3, constraint: &dyn NearestConstraint) -> Option<NearestNode> {
        match self {
            Self::Grid(g) => g.nearest(position, constraint),
            Self::Point(g) => g.nearest(position, constraint),
        }
    }

    fn apply_update(&mut self, update: &GraphUpdate) -> bool {
        match self {
            Self::Grid(g) => g.apply_update(update),
            Self::Point(g) => g.apply_update(update),
        }
    }
}

// ---------------------------------------------------------------------------
// GraphSet
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct NodeSlot {
    graph: u8,
    local: u32,
}

const FREE_SLOT: NodeSlot = NodeSlot {
    graph: u8::MAX,
    local: u32::MAX,
};

/// All graphs known to an engine, plus the global node index table.
///
/// Node indices are dense: they are allocated from a free list so a released
/// index is reused by the next registered node. Per-thread search memory is
/// sized by [`node_capacity`](Self::node_capacity).
#[derive(Clone, Debug, Default)]
pub struct GraphSet {
    graphs: Vec<Option<GraphKind>>,
    slots: Vec<NodeSlot>,
    free: Vec<u32>,
    pub(crate) areas_valid: bool,
    pub(crate) area_count: u32,
}

impl GraphSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a graph and assign global indices to its nodes.
    ///
    /// Returns the graph index. Areas must be recomputed with
    /// [`flood_fill`](Self::flood_fill) before they are meaningful.
    pub fn add_graph(&mut self, graph: impl Into<GraphKind>) -> Result<u8, GraphError> {
        let gi = match self.graphs.iter().position(Option::is_none) {
            Some(i) => i,
            None if self.graphs.len() < MAX_GRAPHS => {
                self.graphs.push(None);
                self.graphs.len() - 1
            }
            None => return Err(GraphError::TooManyGraphs),
        };
        let mut graph = graph.into();
        self.register_nodes(gi as u8, &mut graph);
        self.graphs[gi] = Some(graph);
        self.areas_valid = false;
        log::debug!("registered graph {gi} ({} nodes)", self.graphs[gi].as_ref().map_or(0, |g| g.nodes().len()));
        Ok(gi as u8)
    }

    /// Unregister a graph, releasing its node indices.
    pub fn remove_graph(&mut self, graph_index: u8) -> Result<GraphKind, GraphError> {
        let graph = self
            .graphs
            .get_mut(graph_index as usize)
            .and_then(Option::take)
            .ok_or(GraphError::UnknownGraph(graph_index))?;
        self.release_nodes(&graph);
        self.areas_valid = false;
        Ok(graph)
    }

    /// Swap the graph at `graph_index` for a rebuilt one.
    ///
    /// All node indices of the old graph are released before the new graph's
    /// nodes are registered. Returns the old graph.
    pub fn replace_graph(
        &mut self,
        graph_index: u8,
        graph: impl Into<GraphKind>,
    ) -> Result<GraphKind, GraphError> {
        let old = self
            .graphs
            .get_mut(graph_index as usize)
            .and_then(Option::take)
            .ok_or(GraphError::UnknownGraph(graph_index))?;
        self.release_nodes(&old);
        let mut graph = graph.into();
        self.register_nodes(graph_index, &mut graph);
        self.graphs[graph_index as usize] = Some(graph);
        self.areas_valid = false;
        Ok(old)
    }

    fn register_nodes(&mut self, graph_index: u8, graph: &mut GraphKind) {
        for (local, node) in graph.nodes_mut().iter_mut().enumerate() {
            let index = match self.free.pop() {
                Some(i) => i,
                None => {
                    self.slots.push(FREE_SLOT);
                    (self.slots.len() - 1) as u32
                }
            };
            self.slots[index as usize] = NodeSlot {
                graph: graph_index,
                local: local as u32,
            };
            node.index = NodeIndex(index);
            node.graph_index = graph_index;
            node.area = 0;
        }
    }

    fn release_nodes(&mut self, graph: &GraphKind) {
        for node in graph.nodes() {
            if let Some(slot) = self.slots.get_mut(node.index.as_usize()) {
                *slot = FREE_SLOT;
                self.free.push(node.index.0);
            }
        }
    }

    pub fn graph(&self, graph_index: u8) -> Option<&GraphKind> {
        self.graphs.get(graph_index as usize).and_then(Option::as_ref)
    }

    /// Mutable access to a graph. Marks areas as stale.
    pub fn graph_mut(&mut self, graph_index: u8) -> Option<&mut GraphKind> {
        self.areas_valid = false;
        self.graphs.get_mut(graph_index as usize).and_then(Option::as_mut)
    }

    /// Registered graphs with their indices.
    pub fn graphs(&self) -> impl Iterator<Item = (u8, &GraphKind)> {
        self.graphs
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.as_ref().map(|g| (i as u8, g)))
    }

    /// One past the largest node index ever handed out.
    #[inline]
    pub fn node_capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[inline]
    fn slot(&self, index: NodeIndex) -> Option<NodeSlot> {
        self.slots.get(index.as_usize()).copied().filter(|s| *s != FREE_SLOT)
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> Option<&GraphNode> {
        let slot = self.slot(index)?;
        self.graphs[slot.graph as usize]
            .as_ref()
            .map(|g| &g.nodes()[slot.local as usize])
    }

    /// Mutable access to a single node. Marks areas as stale.
    pub fn node_mut(&mut self, index: NodeIndex) -> Option<&mut GraphNode> {
        let slot = self.slot(index)?;
        self.areas_valid = false;
        self.graphs[slot.graph as usize]
            .as_mut()
            .map(|g| &mut g.nodes_mut()[slot.local as usize])
    }

    /// Visit every registered node, graph by graph.
    pub fn for_each_node(&self, mut f: impl FnMut(&GraphNode)) {
        for (_, g) in self.graphs() {
            g.nodes().iter().for_each(&mut f);
        }
    }

    /// Visit the outgoing connections of `index`. Unknown indices have none.
    #[inline]
    pub fn for_each_connection(&self, index: NodeIndex, f: impl FnMut(Connection)) {
        let Some(slot) = self.slot(index) else {
            return;
        };
        if let Some(g) = &self.graphs[slot.graph as usize] {
            g.for_each_connection(slot.local as usize, f);
        }
    }

    /// Closest suitable node to `position` across all suitable graphs.
    ///
    /// Results further away than `max_distance` are rejected.
    pub fn nearest(
        &self,
        position: Int3,
        constraint: &dyn NearestConstraint,
        max_distance: u32,
    ) -> Option<NearestNode> {
        self.graphs()
            .filter(|(gi, g)| constraint.suitable_graph(*gi, g))
            .filter_map(|(_, g)| g.nearest(position, constraint))
            .filter(|n| n.distance <= max_distance)
            .min_by_key(|n| n.distance)
    }

    /// Apply `update` to every graph. Returns `true` if walkability changed,
    /// in which case areas are stale until the next flood fill.
    pub fn apply_update(&mut self, update: &GraphUpdate) -> bool {
        let mut changed = false;
        for g in self.graphs.iter_mut().flatten() {
            changed |= g.apply_update(update);
        }
        if changed {
            self.areas_valid = false;
        }
        changed
    }

    /// Whether node areas reflect the current connectivity.
    #[inline]
    pub fn areas_valid(&self) -> bool {
        self.areas_valid
    }

    /// Number of distinct walkable areas found by the last flood fill.
    #[inline]
    pub fn area_count(&self) -> u32 {
        self.area_count
    }
}
