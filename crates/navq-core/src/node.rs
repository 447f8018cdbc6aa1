use std::fmt;

use crate::geom::Int3;

/// Number of distinct node tags. Tags are in `0..MAX_TAGS`.
pub const MAX_TAGS: usize = 32;

/// Stable, globally unique index of a graph node.
///
/// Indices are handed out by [`GraphSet`](crate::GraphSet) and stay valid
/// for as long as the node is registered. Released indices are reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Index value used before a node has been registered.
    pub const INVALID: Self = Self(u32::MAX);

    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A vertex of a navigation graph.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphNode {
    pub index: NodeIndex,
    /// Index of the owning graph inside its [`GraphSet`](crate::GraphSet).
    pub graph_index: u8,
    pub position: Int3,
    pub walkable: bool,
    /// Extra cost added when a path enters this node.
    pub penalty: u32,
    /// Tag in `0..MAX_TAGS`, used for per-path filtering and penalties.
    pub tag: u8,
    /// Connected-area label. 0 means unwalkable or not yet flood filled.
    pub area: u32,
}

impl GraphNode {
    /// A walkable, untagged node at `position` that has not been registered yet.
    pub fn new(position: Int3) -> Self {
        Self {
            index: NodeIndex::INVALID,
            graph_index: 0,
            position,
            walkable: true,
            penalty: 0,
            tag: 0,
            area: 0,
        }
    }
}

/// An outgoing edge: the neighbour's index and the cost of moving to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub node: NodeIndex,
    pub cost: u32,
}
