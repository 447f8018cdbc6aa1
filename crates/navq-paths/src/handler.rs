use navq_core::NodeIndex;

use crate::heap::BinaryHeap;
use crate::path_node::PathNode;

/// Smallest number of node slots allocated when the buffer first grows.
const MIN_NODE_CAPACITY: usize = 1024;

/// Per-thread search memory: the [`PathNode`] buffer and the open list.
///
/// A handler is owned by exactly one worker and is never shared, so none of
/// its state needs synchronisation. Between searches nothing is cleared:
/// [`initialize_for_path`](Self::initialize_for_path) only switches the live
/// search tag, and stale entries are reset lazily when touched.
#[derive(Debug)]
pub struct PathHandler {
    thread_id: usize,
    nodes: Vec<PathNode>,
    heap: BinaryHeap,
    tag: u32,
    era: u32,
    full_resets: u64,
}

impl PathHandler {
    pub fn new(thread_id: usize) -> Self {
        Self {
            thread_id,
            nodes: Vec::new(),
            heap: BinaryHeap::new(),
            tag: 0,
            era: 0,
            full_resets: 0,
        }
    }

    /// Index of the worker owning this handler.
    #[inline]
    pub fn thread_id(&self) -> usize {
        self.thread_id
    }

    /// Live search tag.
    #[inline]
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Number of times every node entry had to be reset because the tag
    /// space was exhausted.
    #[inline]
    pub fn full_resets(&self) -> u64 {
        self.full_resets
    }

    /// Allocated node slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Bind the handler to a new search.
    ///
    /// `tag` must be unique within `era`. A change of era means tags are
    /// being reused, which is the only case where every entry is reset.
    /// `node_capacity` pre-sizes the buffer to the graph's index range.
    ///
    /// # Panics
    ///
    /// Panics if `tag` is 0, which is reserved for untouched entries.
    pub fn initialize_for_path(&mut self, tag: u32, era: u32, node_capacity: usize) {
        assert_ne!(tag, 0, "search tag 0 is reserved");
        if era != self.era {
            for n in &mut self.nodes {
                n.tag = 0;
            }
            self.era = era;
            self.full_resets += 1;
            log::debug!("path handler {}: search tag era changed, reset all node entries", self.thread_id);
        }
        self.tag = tag;
        self.heap.clear();
        self.ensure_capacity(node_capacity);
    }

    /// Grow the buffer to hold at least `len` entries. Grows by doubling and
    /// never shrinks.
    fn ensure_capacity(&mut self, len: usize) {
        if self.nodes.len() >= len {
            return;
        }
        let new_len = len.max(self.nodes.len() * 2).max(MIN_NODE_CAPACITY);
        self.nodes.resize(new_len, PathNode::default());
    }

    /// Whether `node` has been touched by the live search.
    #[inline]
    pub fn is_current(&self, node: NodeIndex) -> bool {
        self.nodes.get(node.as_usize()).is_some_and(|n| n.tag == self.tag)
    }

    /// Entry of a node the live search has touched.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the entry belongs to another search.
    #[inline]
    pub fn node(&self, node: NodeIndex) -> &PathNode {
        let pn = &self.nodes[node.as_usize()];
        debug_assert_eq!(pn.tag, self.tag, "reading stale path node {node}");
        pn
    }

    /// Entry for `node` in the live search, resetting it if stale.
    #[inline]
    pub fn node_mut(&mut self, node: NodeIndex) -> &mut PathNode {
        let i = node.as_usize();
        if i >= self.nodes.len() {
            self.ensure_capacity(i + 1);
        }
        let pn = &mut self.nodes[i];
        if pn.tag != self.tag {
            pn.reset(node, self.tag);
        }
        pn
    }

    /// Add a node to the open list using its current G and H.
    #[inline]
    pub fn push(&mut self, node: NodeIndex) {
        self.node_mut(node);
        self.heap.push(&mut self.nodes, node);
    }

    /// Re-sort a node already in the open list after its G dropped.
    #[inline]
    pub fn decrease_key(&mut self, node: NodeIndex) {
        self.heap.decrease_key(&mut self.nodes, node);
    }

    /// Take the node with the lowest F off the open list and close it.
    #[inline]
    pub fn pop(&mut self) -> Option<NodeIndex> {
        let node = self.heap.pop(&mut self.nodes)?;
        self.nodes[node.as_usize()].closed = true;
        Some(node)
    }

    #[inline]
    pub fn open_len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_node::{NOT_IN_HEAP, UNREACHED};

    #[test]
    fn grows_by_doubling_and_never_shrinks() {
        let mut h = PathHandler::new(0);
        h.initialize_for_path(1, 0, 10);
        assert_eq!(h.capacity(), MIN_NODE_CAPACITY);
        h.node_mut(NodeIndex(1500));
        assert_eq!(h.capacity(), 2048);
        h.initialize_for_path(2, 0, 5);
        assert_eq!(h.capacity(), 2048);
    }

    #[test]
    fn stale_entries_reset_lazily() {
        let mut h = PathHandler::new(0);
        h.initialize_for_path(1, 0, 16);
        {
            let n = h.node_mut(NodeIndex(3));
            n.g = 42;
            n.flag1 = true;
        }
        assert!(h.is_current(NodeIndex(3)));

        h.initialize_for_path(2, 0, 16);
        assert!(!h.is_current(NodeIndex(3)));
        let n = h.node_mut(NodeIndex(3));
        assert_eq!(n.g, UNREACHED);
        assert!(!n.flag1);
        assert_eq!(n.tag, 2);
    }

    #[test]
    fn pop_closes_node() {
        let mut h = PathHandler::new(0);
        h.initialize_for_path(1, 0, 16);
        h.node_mut(NodeIndex(5)).g = 3;
        h.push(NodeIndex(5));
        assert_eq!(h.open_len(), 1);
        assert_eq!(h.pop(), Some(NodeIndex(5)));
        let n = h.node(NodeIndex(5));
        assert!(n.closed);
        assert_eq!(n.heap_index, NOT_IN_HEAP);
    }

    #[test]
    fn new_search_clears_open_list() {
        let mut h = PathHandler::new(0);
        h.initialize_for_path(1, 0, 16);
        h.push(NodeIndex(1));
        h.initialize_for_path(2, 0, 16);
        assert_eq!(h.open_len(), 0);
        assert_eq!(h.pop(), None);
    }

    #[test]
    fn era_change_resets_everything_once() {
        let mut h = PathHandler::new(0);
        h.initialize_for_path(7, 0, 16);
        h.node_mut(NodeIndex(2)).g = 1;
        h.initialize_for_path(7, 1, 16);
        assert_eq!(h.full_resets(), 1);
        // Same tag value, but the entry is from the previous era.
        assert_eq!(h.node_mut(NodeIndex(2)).g, UNREACHED);
    }
}
