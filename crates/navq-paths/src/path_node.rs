use navq_core::NodeIndex;

/// Sentinel heap position meaning "not in the open list".
pub const NOT_IN_HEAP: u32 = u32::MAX;

/// G value of a node no search has reached yet.
pub const UNREACHED: u32 = u32::MAX;

/// Per-thread search scratch for one graph node.
///
/// Entries are never cleared in bulk. A node belongs to the current search
/// only if its `tag` equals the handler's live search tag; anything else is
/// stale and is reset the first time the search touches it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathNode {
    pub node: NodeIndex,
    /// Search-tree edge towards the start. `NodeIndex::INVALID` for roots.
    pub parent: NodeIndex,
    /// Tag of the search that last touched this entry.
    pub tag: u32,
    /// Position in the open list, or [`NOT_IN_HEAP`].
    pub heap_index: u32,
    /// Cost so far.
    pub g: u32,
    /// Heuristic estimate of the remaining cost.
    pub h: u32,
    /// Popped from the open list; the G value is final.
    pub closed: bool,
    /// Scratch flags for search kinds.
    pub flag1: bool,
    pub flag2: bool,
}

impl PathNode {
    /// Total estimated cost through this node.
    #[inline]
    pub fn f(&self) -> u32 {
        self.g.saturating_add(self.h)
    }

    /// Claim this entry for the search identified by `tag`.
    #[inline]
    pub(crate) fn reset(&mut self, node: NodeIndex, tag: u32) {
        *self = Self {
            node,
            tag,
            ..Self::default()
        };
    }
}

impl Default for PathNode {
    fn default() -> Self {
        Self {
            node: NodeIndex::INVALID,
            parent: NodeIndex::INVALID,
            tag: 0,
            heap_index: NOT_IN_HEAP,
            g: UNREACHED,
            h: 0,
            closed: false,
            flag1: false,
            flag2: false,
        }
    }
}
