use std::time::Instant;

use navq_core::{Int3, NodeIndex};

use crate::astar::{StepOutcome, Visit, open_root, search_until};
use crate::search::{CompleteState, Env};
use crate::traversal::Traversal;

/// Every node reachable from a point within a cost budget.
#[derive(Clone, Debug)]
pub struct ConstantPath {
    pub start_point: Int3,
    /// Largest G a node may have to be included.
    pub max_g: u32,
    start_node: NodeIndex,
    all_nodes: Vec<(NodeIndex, u32)>,
}

impl ConstantPath {
    pub fn new(start_point: Int3, max_g: u32) -> Self {
        Self {
            start_point,
            max_g,
            start_node: NodeIndex::INVALID,
            all_nodes: Vec::new(),
        }
    }

    /// Reached nodes with their cost from the start, cheapest first.
    pub fn all_nodes(&self) -> &[(NodeIndex, u32)] {
        &self.all_nodes
    }

    pub(crate) fn prepare(&mut self, env: &mut Env<'_>) {
        let Some(start) = env.params.nearest(env.graphs, self.start_point) else {
            env.out.fail(&format!("no suitable node close to start point {}", self.start_point));
            return;
        };
        match env.graphs.node(start.node) {
            Some(n) if env.params.can_traverse(n) => self.start_node = start.node,
            _ => env.out.fail(&format!("start node {} is not traversable", start.node)),
        }
    }

    pub(crate) fn initialize(&mut self, env: &mut Env<'_>) {
        self.all_nodes.clear();
        open_root(env.handler, self.start_node, 0);
    }

    pub(crate) fn step<T: Traversal + ?Sized>(&mut self, env: &mut Env<'_>, traversal: &T, deadline: Instant) {
        let all = &mut self.all_nodes;
        let outcome = search_until(
            env.graphs,
            env.handler,
            traversal,
            self.max_g,
            deadline,
            &mut env.out.searched_nodes,
            |_| 0,
            |h, n| {
                all.push((n, h.node(n).g));
                Visit::Continue
            },
        );
        if outcome == StepOutcome::Exhausted {
            env.out.set_complete(CompleteState::Complete);
        }
    }
}
