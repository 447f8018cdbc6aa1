use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use navq_core::{GraphNode, Int3, NearestConstraint, NnConstraint, NodeIndex};

use crate::astar::{StepOutcome, Visit, open_root, search_until};
use crate::search::{CompleteState, Env, MAX_TRACE_LENGTH};
use crate::traversal::Traversal;

/// Search tree of a finished [`FloodPath`]: the parent of every reached
/// node, pointing towards the origin.
#[derive(Clone, Debug)]
pub struct FloodResult {
    origin: NodeIndex,
    parents: HashMap<NodeIndex, NodeIndex>,
}

impl FloodResult {
    pub fn origin(&self) -> NodeIndex {
        self.origin
    }

    /// Whether the flood reached `node`.
    pub fn contains(&self, node: NodeIndex) -> bool {
        self.parents.contains_key(&node)
    }

    /// Parent of `node`. [`NodeIndex::INVALID`] for the origin, `None` for
    /// nodes the flood did not reach.
    pub fn parent(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.parents.get(&node).copied()
    }

    /// Number of reached nodes.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Explores everything reachable from a point and records the search tree.
///
/// A finished flood can answer "how do I get back to the origin" for any
/// reached node through [`FloodPathTracer`], without searching again.
#[derive(Clone, Debug)]
pub struct FloodPath {
    pub origin_point: Int3,
    origin: NodeIndex,
    parents: HashMap<NodeIndex, NodeIndex>,
    result: Option<Arc<FloodResult>>,
}

impl FloodPath {
    pub fn new(origin_point: Int3) -> Self {
        Self {
            origin_point,
            origin: NodeIndex::INVALID,
            parents: HashMap::new(),
            result: None,
        }
    }

    /// The search tree, once the flood is complete.
    pub fn result(&self) -> Option<&Arc<FloodResult>> {
        self.result.as_ref()
    }

    pub(crate) fn prepare(&mut self, env: &mut Env<'_>) {
        let Some(origin) = env.params.nearest(env.graphs, self.origin_point) else {
            env.out.fail(&format!("no suitable node close to flood origin {}", self.origin_point));
            return;
        };
        match env.graphs.node(origin.node) {
            Some(n) if env.params.can_traverse(n) => self.origin = origin.node,
            _ => env.out.fail(&format!("flood origin {} is not traversable", origin.node)),
        }
    }

    pub(crate) fn initialize(&mut self, env: &mut Env<'_>) {
        self.parents.clear();
        self.result = None;
        open_root(env.handler, self.origin, 0);
    }

    pub(crate) fn step<T: Traversal + ?Sized>(&mut self, env: &mut Env<'_>, traversal: &T, deadline: Instant) {
        let parents = &mut self.parents;
        let outcome = search_until(
            env.graphs,
            env.handler,
            traversal,
            u32::MAX,
            deadline,
            &mut env.out.searched_nodes,
            |_| 0,
            |h, n| {
                parents.insert(n, h.node(n).parent);
                Visit::Continue
            },
        );
        if outcome == StepOutcome::Exhausted {
            self.result = Some(Arc::new(FloodResult {
                origin: self.origin,
                parents: std::mem::take(&mut self.parents),
            }));
            env.out.set_complete(CompleteState::Complete);
        }
    }
}

/// Only nodes a flood reached.
struct FloodConstraint<'a> {
    flood: &'a FloodResult,
    inner: &'a NnConstraint,
}

impl NearestConstraint for FloodConstraint<'_> {
    fn suitable_graph(&self, graph_index: u8, graph: &navq_core::GraphKind) -> bool {
        self.inner.suitable_graph(graph_index, graph)
    }

    fn suitable(&self, node: &GraphNode) -> bool {
        self.flood.contains(node.index) && self.inner.suitable(node)
    }
}

/// Path from a point back to the origin of a finished flood.
///
/// The result runs from the start point to the flood origin. Nothing is
/// searched: the path is read straight from the flood's tree, so it fails
/// if the graph changed in a way that makes a node on it untraversable.
#[derive(Clone, Debug)]
pub struct FloodPathTracer {
    pub start_point: Int3,
    flood: Arc<FloodResult>,
    start_node: NodeIndex,
}

impl FloodPathTracer {
    pub fn new(start_point: Int3, flood: Arc<FloodResult>) -> Self {
        Self {
            start_point,
            flood,
            start_node: NodeIndex::INVALID,
        }
    }

    pub fn flood(&self) -> &Arc<FloodResult> {
        &self.flood
    }

    pub(crate) fn prepare(&mut self, env: &mut Env<'_>) {
        let constraint = FloodConstraint {
            flood: &self.flood,
            inner: &env.params.nn_constraint,
        };
        match env.params.nearest_with(env.graphs, self.start_point, &constraint) {
            Some(nn) => self.start_node = nn.node,
            None => env.out.fail(&format!("no node reached by the flood close to {}", self.start_point)),
        }
    }

    pub(crate) fn initialize(&mut self, env: &mut Env<'_>) {
        let out = &mut *env.out;
        out.path.clear();
        out.vector_path.clear();

        let mut c = self.start_node;
        while c.is_valid() {
            if out.path.len() >= MAX_TRACE_LENGTH {
                log::error!("flood tree from node {} is longer than {MAX_TRACE_LENGTH} nodes", self.start_node);
                out.fail("flood tree is corrupt: parent chain exceeds the maximum path length");
                return;
            }
            let Some(node) = env.graphs.node(c) else {
                out.fail(&format!("node {c} on the flood path no longer exists"));
                return;
            };
            if !env.params.can_traverse(node) {
                out.fail(&format!("node {c} on the flood path is no longer traversable"));
                return;
            }
            out.path.push(c);
            out.vector_path.push(node.position);
            out.searched_nodes += 1;
            c = match self.flood.parent(c) {
                Some(p) => p,
                None => {
                    out.fail(&format!("node {c} was not reached by the flood"));
                    return;
                }
            };
        }
        out.set_complete(CompleteState::Complete);
    }
}
