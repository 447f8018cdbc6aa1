//! Nearest-node query constraints.

use crate::geom::Int3;
use crate::graph::GraphKind;
use crate::node::{GraphNode, NodeIndex};

/// Decides which graphs and nodes a nearest-node query may return.
pub trait NearestConstraint: Send + Sync {
    /// Whether the graph at `graph_index` should be searched at all.
    fn suitable_graph(&self, graph_index: u8, graph: &GraphKind) -> bool {
        let _ = (graph_index, graph);
        true
    }

    /// Whether `node` is an acceptable result.
    fn suitable(&self, node: &GraphNode) -> bool;
}

/// Result of a nearest-node query.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NearestNode {
    pub node: NodeIndex,
    /// The query point clamped onto the node's surface.
    pub position: Int3,
    /// Distance between the query point and `position`.
    pub distance: u32,
}

/// The common constraint: filter by walkability, tags, area and graph mask.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NnConstraint {
    pub constrain_walkability: bool,
    /// Required walkability when `constrain_walkability` is set.
    pub walkable: bool,
    pub constrain_tags: bool,
    /// Bitmask of acceptable tags when `constrain_tags` is set.
    pub tags: u32,
    pub constrain_area: bool,
    /// Required area when `constrain_area` is set.
    pub area: u32,
    /// Bitmask of graphs to search.
    pub graph_mask: u32,
}

impl NnConstraint {
    /// Accept any node in any graph.
    pub fn none() -> Self {
        Self {
            constrain_walkability: false,
            walkable: true,
            constrain_tags: false,
            tags: !0,
            constrain_area: false,
            area: 0,
            graph_mask: !0,
        }
    }

    /// Restrict results to nodes in the given area.
    pub fn with_area(mut self, area: u32) -> Self {
        self.constrain_area = true;
        self.area = area;
        self
    }
}

impl Default for NnConstraint {
    /// Walkable nodes only, any tag, any graph.
    fn default() -> Self {
        Self {
            constrain_walkability: true,
            ..Self::none()
        }
    }
}

impl NearestConstraint for NnConstraint {
    fn suitable_graph(&self, graph_index: u8, _graph: &GraphKind) -> bool {
        graph_index < 32 && (self.graph_mask >> graph_index) & 1 != 0
    }

    fn suitable(&self, node: &GraphNode) -> bool {
        if self.constrain_walkability && node.walkable != self.walkable {
            return false;
        }
        if self.constrain_tags && (self.tags >> node.tag) & 1 == 0 {
            return false;
        }
        if self.constrain_area && node.area != self.area {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(walkable: bool, tag: u8, area: u32) -> GraphNode {
        GraphNode {
            walkable,
            tag,
            area,
            ..GraphNode::new(Int3::ZERO)
        }
    }

    #[test]
    fn default_requires_walkable() {
        let c = NnConstraint::default();
        assert!(c.suitable(&node(true, 0, 1)));
        assert!(!c.suitable(&node(false, 0, 1)));
        assert!(NnConstraint::none().suitable(&node(false, 0, 1)));
    }

    #[test]
    fn tag_and_area_filters() {
        let c = NnConstraint {
            constrain_tags: true,
            tags: 1 << 3,
            ..NnConstraint::default()
        }
        .with_area(7);
        assert!(c.suitable(&node(true, 3, 7)));
        assert!(!c.suitable(&node(true, 2, 7)));
        assert!(!c.suitable(&node(true, 3, 6)));
    }
}
