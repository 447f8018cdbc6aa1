//! Rules deciding which nodes a path may enter and what entering costs.

use navq_core::{GraphNode, MAX_TAGS};

/// Per-path tag filter and tag penalties.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagRules {
    /// Bit `t` set means nodes tagged `t` may be entered.
    pub enabled_tags: u32,
    /// Extra cost for entering a node, indexed by tag.
    pub tag_penalties: [u32; MAX_TAGS],
}

impl Default for TagRules {
    fn default() -> Self {
        Self {
            enabled_tags: !0,
            tag_penalties: [0; MAX_TAGS],
        }
    }
}

impl TagRules {
    #[inline]
    pub fn can_traverse(&self, node: &GraphNode) -> bool {
        node.walkable && (self.enabled_tags >> node.tag) & 1 != 0
    }

    #[inline]
    pub fn traversal_cost(&self, node: &GraphNode) -> u32 {
        self.tag_penalties[node.tag as usize % MAX_TAGS].saturating_add(node.penalty)
    }
}

/// Pluggable traversal rules overriding [`TagRules`] for a single path.
///
/// Implementations receive the path's own rules so they can extend rather
/// than replace them.
pub trait TraversalProvider: Send + Sync {
    fn can_traverse(&self, rules: &TagRules, node: &GraphNode) -> bool {
        rules.can_traverse(node)
    }

    fn traversal_cost(&self, rules: &TagRules, node: &GraphNode) -> u32 {
        rules.traversal_cost(node)
    }
}

/// Traversal rules as seen by the expansion loop. Implemented by
/// [`TagRules`] directly so the common case is monomorphized.
pub(crate) trait Traversal {
    fn can_enter(&self, node: &GraphNode) -> bool;

    fn enter_cost(&self, node: &GraphNode) -> u32;
}

impl Traversal for TagRules {
    #[inline]
    fn can_enter(&self, node: &GraphNode) -> bool {
        self.can_traverse(node)
    }

    #[inline]
    fn enter_cost(&self, node: &GraphNode) -> u32 {
        self.traversal_cost(node)
    }
}

/// A [`TraversalProvider`] bound to the path's rules.
pub(crate) struct Provided<'a> {
    pub(crate) provider: &'a dyn TraversalProvider,
    pub(crate) rules: &'a TagRules,
}

impl Traversal for Provided<'_> {
    #[inline]
    fn can_enter(&self, node: &GraphNode) -> bool {
        self.provider.can_traverse(self.rules, node)
    }

    #[inline]
    fn enter_cost(&self, node: &GraphNode) -> u32 {
        self.provider.traversal_cost(self.rules, node)
    }
}
