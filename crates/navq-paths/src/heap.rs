//! The open list: a binary min-heap over [`PathNode`]s keyed by F.
//!
//! The heap stores a copy of each entry's F and G next to its node index so
//! sifting never touches the node array except to update cached positions.
//! Each [`PathNode`] caches its own heap position, which makes
//! decrease-key O(log n) without searching for the entry first.

use navq_core::NodeIndex;

use crate::path_node::{NOT_IN_HEAP, PathNode};

#[derive(Copy, Clone, Debug)]
struct HeapItem {
    node: NodeIndex,
    f: u32,
    g: u32,
}

impl HeapItem {
    /// Lower F first. On equal F prefer the larger G, which favours nodes
    /// closer to the target.
    #[inline]
    fn before(&self, other: &HeapItem) -> bool {
        self.f < other.f || (self.f == other.f && self.g > other.g)
    }
}

/// Binary min-heap of node indices.
#[derive(Clone, Debug, Default)]
pub struct BinaryHeap {
    items: Vec<HeapItem>,
}

impl BinaryHeap {
    pub fn new() -> Self {
        Self::with_capacity(128)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every entry. O(1): positions cached on nodes are left behind and
    /// become meaningless once the owning search tag changes.
    #[inline]
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Node with the smallest F, without removing it.
    #[inline]
    pub fn peek(&self) -> Option<NodeIndex> {
        self.items.first().map(|i| i.node)
    }

    /// Insert `node` using the F and G currently stored in `nodes`.
    pub fn push(&mut self, nodes: &mut [PathNode], node: NodeIndex) {
        let pn = &nodes[node.as_usize()];
        debug_assert_eq!(pn.heap_index, NOT_IN_HEAP, "node {node} is already in the heap");
        self.items.push(HeapItem {
            node,
            f: pn.f(),
            g: pn.g,
        });
        let i = self.items.len() - 1;
        nodes[node.as_usize()].heap_index = i as u32;
        self.sift_up(nodes, i);
    }

    /// Restore heap order after the F of `node` decreased.
    pub fn decrease_key(&mut self, nodes: &mut [PathNode], node: NodeIndex) {
        let pn = &nodes[node.as_usize()];
        let i = pn.heap_index as usize;
        debug_assert!(i < self.items.len() && self.items[i].node == node);
        self.items[i].f = pn.f();
        self.items[i].g = pn.g;
        self.sift_up(nodes, i);
    }

    /// Remove and return the node with the smallest F.
    pub fn pop(&mut self, nodes: &mut [PathNode]) -> Option<NodeIndex> {
        if self.items.is_empty() {
            return None;
        }
        let top = self.items.swap_remove(0);
        nodes[top.node.as_usize()].heap_index = NOT_IN_HEAP;
        if !self.items.is_empty() {
            nodes[self.items[0].node.as_usize()].heap_index = 0;
            self.sift_down(nodes, 0);
        }
        Some(top.node)
    }

    fn sift_up(&mut self, nodes: &mut [PathNode], mut i: usize) {
        let item = self.items[i];
        while i > 0 {
            let parent = (i - 1) / 2;
            if !item.before(&self.items[parent]) {
                break;
            }
            self.items[i] = self.items[parent];
            nodes[self.items[i].node.as_usize()].heap_index = i as u32;
            i = parent;
        }
        self.items[i] = item;
        nodes[item.node.as_usize()].heap_index = i as u32;
    }

    fn sift_down(&mut self, nodes: &mut [PathNode], mut i: usize) {
        let len = self.items.len();
        let item = self.items[i];
        loop {
            let left = 2 * i + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.items[right].before(&self.items[left]) {
                right
            } else {
                left
            };
            if !self.items[child].before(&item) {
                break;
            }
            self.items[i] = self.items[child];
            nodes[self.items[i].node.as_usize()].heap_index = i as u32;
            i = child;
        }
        self.items[i] = item;
        nodes[item.node.as_usize()].heap_index = i as u32;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn nodes(n: usize) -> Vec<PathNode> {
        (0..n)
            .map(|i| PathNode {
                node: NodeIndex(i as u32),
                ..PathNode::default()
            })
            .collect()
    }

    fn set(nodes: &mut [PathNode], i: u32, g: u32, h: u32) {
        nodes[i as usize].g = g;
        nodes[i as usize].h = h;
    }

    #[test]
    fn pops_in_f_order() {
        let mut ns = nodes(4);
        let mut heap = BinaryHeap::new();
        for (i, f) in [(0, 30), (1, 10), (2, 20), (3, 5)] {
            set(&mut ns, i, f, 0);
            heap.push(&mut ns, NodeIndex(i));
        }
        let order: Vec<u32> = std::iter::from_fn(|| heap.pop(&mut ns)).map(|n| n.0).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
        assert!(ns.iter().all(|n| n.heap_index == NOT_IN_HEAP));
    }

    #[test]
    fn ties_prefer_larger_g() {
        let mut ns = nodes(2);
        let mut heap = BinaryHeap::new();
        set(&mut ns, 0, 2, 8);
        set(&mut ns, 1, 7, 3);
        heap.push(&mut ns, NodeIndex(0));
        heap.push(&mut ns, NodeIndex(1));
        assert_eq!(heap.pop(&mut ns), Some(NodeIndex(1)));
    }

    #[test]
    fn decrease_key_moves_node_to_front() {
        let mut ns = nodes(3);
        let mut heap = BinaryHeap::new();
        for i in 0..3 {
            set(&mut ns, i, 10 * (i + 1), 0);
            heap.push(&mut ns, NodeIndex(i));
        }
        set(&mut ns, 2, 1, 0);
        heap.decrease_key(&mut ns, NodeIndex(2));
        assert_eq!(heap.peek(), Some(NodeIndex(2)));
        assert_eq!(ns[2].heap_index, 0);
    }

    #[test]
    fn clear_is_cheap_and_empties() {
        let mut ns = nodes(2);
        let mut heap = BinaryHeap::new();
        heap.push(&mut ns, NodeIndex(0));
        heap.clear();
        assert!(heap.is_empty());
        assert_eq!(heap.pop(&mut ns), None);
    }

    /// Random insert / decrease-key / extract-min against a reference map.
    #[test]
    fn matches_reference_under_random_operations() {
        const N: usize = 400;
        let mut rng = StdRng::seed_from_u64(7);
        for _round in 0..20 {
            let mut ns = nodes(N);
            let mut heap = BinaryHeap::new();
            let mut reference: HashMap<u32, u32> = HashMap::new();

            for _ in 0..3000 {
                match rng.random_range(0..3u32) {
                    0 => {
                        let i = rng.random_range(0..N as u32);
                        if reference.contains_key(&i) {
                            continue;
                        }
                        let f = rng.random_range(0..10_000u32);
                        set(&mut ns, i, f, 0);
                        heap.push(&mut ns, NodeIndex(i));
                        reference.insert(i, f);
                    }
                    1 => {
                        let Some((&i, &f)) = reference.iter().next() else {
                            continue;
                        };
                        let nf = rng.random_range(0..=f);
                        set(&mut ns, i, nf, 0);
                        heap.decrease_key(&mut ns, NodeIndex(i));
                        reference.insert(i, nf);
                    }
                    _ => {
                        let expected = reference.values().min().copied();
                        let popped = heap.pop(&mut ns);
                        assert_eq!(popped.is_some(), expected.is_some());
                        if let Some(n) = popped {
                            let f = reference.remove(&n.0).expect("popped node was not in the heap");
                            assert_eq!(Some(f), expected);
                        }
                    }
                }
                assert_eq!(heap.len(), reference.len());
            }

            // Cached positions must point back at their own entries.
            for (&i, _) in &reference {
                let pos = ns[i as usize].heap_index as usize;
                assert_eq!(heap.items[pos].node, NodeIndex(i));
            }
        }
    }
}
