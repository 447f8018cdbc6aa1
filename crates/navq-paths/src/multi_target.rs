use std::time::Instant;

use navq_core::{GraphNode, Int3, NodeIndex};

use crate::astar::{StepOutcome, Visit, open_root, search_until};
use crate::search::{CompleteState, Env, SearchParams, trace_parents};
use crate::traversal::Traversal;

/// How a multi-target search estimates the remaining cost.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MultiTargetHeuristic {
    /// Plain Dijkstra.
    None,
    /// The path's heuristic towards the closest target.
    #[default]
    NearestTarget,
}

/// Shortest paths from one start point to several targets, in a single
/// search.
#[derive(Clone, Debug)]
pub struct MultiTargetPath {
    pub start_point: Int3,
    pub target_points: Vec<Int3>,
    /// Keep searching until every target is found. Otherwise stop at the
    /// first (cheapest) one.
    pub path_for_all: bool,
    pub heuristic_mode: MultiTargetHeuristic,
    start_node: NodeIndex,
    target_nodes: Vec<NodeIndex>,
    target_positions: Vec<Int3>,
    target_found: Vec<bool>,
    target_paths: Vec<Vec<NodeIndex>>,
    target_vector_paths: Vec<Vec<Int3>>,
    chosen_target: Option<usize>,
    remaining: usize,
    corrupt: bool,
}

impl MultiTargetPath {
    pub fn new(start_point: Int3, target_points: Vec<Int3>) -> Self {
        Self {
            start_point,
            target_points,
            path_for_all: true,
            heuristic_mode: MultiTargetHeuristic::default(),
            start_node: NodeIndex::INVALID,
            target_nodes: Vec::new(),
            target_positions: Vec::new(),
            target_found: Vec::new(),
            target_paths: Vec::new(),
            target_vector_paths: Vec::new(),
            chosen_target: None,
            remaining: 0,
            corrupt: false,
        }
    }

    pub fn with_path_for_all(mut self, path_for_all: bool) -> Self {
        self.path_for_all = path_for_all;
        self
    }

    pub fn with_heuristic(mut self, mode: MultiTargetHeuristic) -> Self {
        self.heuristic_mode = mode;
        self
    }

    /// Which targets were reached, in `target_points` order.
    pub fn target_found(&self) -> &[bool] {
        &self.target_found
    }

    /// Node path to each target. Empty for targets that were not reached.
    pub fn target_paths(&self) -> &[Vec<NodeIndex>] {
        &self.target_paths
    }

    pub fn target_vector_paths(&self) -> &[Vec<Int3>] {
        &self.target_vector_paths
    }

    /// The first target reached. Its path is also the search's main path.
    pub fn chosen_target(&self) -> Option<usize> {
        self.chosen_target
    }

    pub(crate) fn prepare(&mut self, env: &mut Env<'_>) {
        let Some(start) = env.params.nearest(env.graphs, self.start_point) else {
            env.out.fail(&format!("no suitable node close to start point {}", self.start_point));
            return;
        };
        let Some(start_node) = env.graphs.node(start.node) else {
            env.out.fail("start node vanished from the graph");
            return;
        };
        if !env.params.can_traverse(start_node) {
            env.out.fail(&format!("start node {} is not traversable", start.node));
            return;
        }
        self.start_node = start.node;

        let n = self.target_points.len();
        self.target_nodes.clear();
        self.target_positions.clear();
        self.target_found = vec![false; n];
        self.target_paths = vec![Vec::new(); n];
        self.target_vector_paths = vec![Vec::new(); n];
        self.chosen_target = None;
        self.corrupt = false;

        let check_area = env.graphs.areas_valid() && start_node.area != 0;
        for &p in &self.target_points {
            let node = env
                .params
                .nearest(env.graphs, p)
                .and_then(|nn| env.graphs.node(nn.node))
                .filter(|t| !check_area || t.area == 0 || t.area == start_node.area);
            match node {
                Some(t) => {
                    self.target_nodes.push(t.index);
                    self.target_positions.push(t.position);
                }
                None => {
                    self.target_nodes.push(NodeIndex::INVALID);
                    self.target_positions.push(p);
                }
            }
        }
        self.remaining = self.target_nodes.iter().filter(|t| t.is_valid()).count();
        if self.remaining == 0 {
            env.out.fail("none of the targets can be reached");
        }
    }

    pub(crate) fn initialize(&mut self, env: &mut Env<'_>) {
        for &t in self.target_nodes.iter().filter(|t| t.is_valid()) {
            env.handler.node_mut(t).flag1 = true;
        }
        let Some(start) = env.graphs.node(self.start_node) else {
            env.out.fail("start node vanished from the graph");
            return;
        };
        let h = self.estimate(env.params, start.position);
        open_root(env.handler, self.start_node, h);
    }

    fn estimate(&self, params: &SearchParams, from: Int3) -> u32 {
        nearest_estimate(self.heuristic_mode, params, &self.target_nodes, &self.target_positions, from)
    }

    pub(crate) fn step<T: Traversal + ?Sized>(&mut self, env: &mut Env<'_>, traversal: &T, deadline: Instant) {
        let Self {
            path_for_all,
            heuristic_mode,
            target_nodes,
            target_positions,
            target_found,
            target_paths,
            chosen_target,
            remaining,
            corrupt,
            ..
        } = self;
        let (mode, nodes, positions, params) = (*heuristic_mode, &*target_nodes, &*target_positions, env.params);
        let estimate = |n: &GraphNode| nearest_estimate(mode, params, nodes, positions, n.position);

        let outcome = search_until(
            env.graphs,
            env.handler,
            traversal,
            u32::MAX,
            deadline,
            &mut env.out.searched_nodes,
            estimate,
            |h, n| {
                let pn = h.node(n);
                if !pn.flag1 || pn.flag2 {
                    return Visit::Continue;
                }
                h.node_mut(n).flag2 = true;
                for (i, &t) in nodes.iter().enumerate() {
                    if t != n || target_found[i] {
                        continue;
                    }
                    if !trace_parents(h, n, &mut target_paths[i]) {
                        *corrupt = true;
                        return Visit::Stop;
                    }
                    target_found[i] = true;
                    *remaining -= 1;
                    chosen_target.get_or_insert(i);
                }
                if !*path_for_all || *remaining == 0 {
                    Visit::Stop
                } else {
                    Visit::Continue
                }
            },
        );
        if outcome == StepOutcome::Yielded {
            return;
        }
        self.finish(env);
    }

    fn finish(&mut self, env: &mut Env<'_>) {
        if self.corrupt {
            env.out.fail("search tree is corrupt: parent chain exceeds the maximum path length");
            return;
        }
        let Some(chosen) = self.chosen_target else {
            let msg = format!(
                "none of the {} targets is reachable; searched {} nodes",
                self.target_points.len(),
                env.out.searched_nodes
            );
            env.out.fail(&msg);
            return;
        };

        for (path, vpath) in self.target_paths.iter().zip(&mut self.target_vector_paths) {
            vpath.clear();
            vpath.extend(path.iter().filter_map(|&n| env.graphs.node(n).map(|n| n.position)));
        }
        if !env.out.trace(env.graphs, env.handler, self.target_nodes[chosen]) {
            return;
        }
        let all_found = self.target_found.iter().all(|&f| f);
        let state = if self.path_for_all && !all_found {
            CompleteState::Partial
        } else {
            CompleteState::Complete
        };
        env.out.set_complete(state);
    }
}

fn nearest_estimate(
    mode: MultiTargetHeuristic,
    params: &SearchParams,
    nodes: &[NodeIndex],
    positions: &[Int3],
    from: Int3,
) -> u32 {
    match mode {
        MultiTargetHeuristic::None => 0,
        MultiTargetHeuristic::NearestTarget => nodes
            .iter()
            .zip(positions)
            .filter(|(n, _)| n.is_valid())
            .map(|(_, &p)| params.estimate(from, p))
            .min()
            .unwrap_or(0),
    }
}
