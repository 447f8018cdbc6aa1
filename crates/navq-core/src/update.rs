//! Bulk node updates applied to every graph node inside a box.

use crate::geom::Bounds;
use crate::node::GraphNode;

/// A data mutation applied to all nodes whose position lies inside `bounds`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphUpdate {
    pub bounds: Bounds,
    /// New walkability, if it should change.
    pub walkable: Option<bool>,
    /// New tag, if it should change.
    pub tag: Option<u8>,
    /// Delta added to the node penalty, clamped at zero.
    pub add_penalty: i32,
}

impl GraphUpdate {
    /// An update that touches nodes inside `bounds` but changes nothing yet.
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            walkable: None,
            tag: None,
            add_penalty: 0,
        }
    }

    pub fn with_walkable(mut self, walkable: bool) -> Self {
        self.walkable = Some(walkable);
        self
    }

    pub fn with_tag(mut self, tag: u8) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_penalty_delta(mut self, delta: i32) -> Self {
        self.add_penalty = delta;
        self
    }

    /// Whether connectivity can change, so areas must be recomputed.
    #[inline]
    pub fn requires_flood_fill(&self) -> bool {
        self.walkable.is_some()
    }

    /// Apply the update to a single node. Returns `true` if walkability changed.
    pub fn apply(&self, node: &mut GraphNode) -> bool {
        let mut walkability_changed = false;
        if let Some(w) = self.walkable {
            walkability_changed = node.walkable != w;
            node.walkable = w;
        }
        if let Some(tag) = self.tag {
            node.tag = tag;
        }
        if self.add_penalty != 0 {
            node.penalty = (node.penalty as i64 + self.add_penalty as i64).clamp(0, u32::MAX as i64) as u32;
        }
        walkability_changed
    }
}
