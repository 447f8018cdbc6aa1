//! Connected-area labelling.

use crate::graph::GraphSet;
use crate::node::NodeIndex;

impl GraphSet {
    /// Label every walkable node with a connected-area ID.
    ///
    /// Two walkable nodes share an area if a chain of connections between
    /// walkable nodes joins them. Unwalkable nodes get area 0; areas start
    /// at 1. Connections are assumed to be symmetric.
    pub fn flood_fill(&mut self) {
        let cap = self.node_capacity();
        let mut labels = vec![0u32; cap];
        let mut stack: Vec<NodeIndex> = Vec::new();
        let mut area = 0u32;

        for start in 0..cap {
            let start = NodeIndex(start as u32);
            if labels[start.as_usize()] != 0 || !self.node(start).is_some_and(|n| n.walkable) {
                continue;
            }

            area += 1;
            labels[start.as_usize()] = area;
            stack.clear();
            stack.push(start);

            // Iterative DFS from `start`.
            while let Some(ci) = stack.pop() {
                self.for_each_connection(ci, |c| {
                    let ni = c.node.as_usize();
                    if labels[ni] == 0 && self.node(c.node).is_some_and(|n| n.walkable) {
                        labels[ni] = area;
                        stack.push(c.node);
                    }
                });
            }
        }

        for (i, label) in labels.into_iter().enumerate() {
            if let Some(n) = self.node_mut(NodeIndex(i as u32)) {
                n.area = label;
            }
        }
        self.area_count = area;
        self.areas_valid = true;
        log::debug!("flood fill found {area} areas over {cap} node slots");
    }
}
