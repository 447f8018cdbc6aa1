use std::time::Instant;

use navq_core::{Int3, NodeIndex};

use crate::astar::{StepOutcome, Visit, open_root, search_until};
use crate::search::{CompleteState, Env};
use crate::traversal::Traversal;

/// Shortest path between two points.
#[derive(Clone, Debug)]
pub struct ShortestPath {
    pub start_point: Int3,
    pub end_point: Int3,
    /// Return the path to the node closest to the target (by heuristic)
    /// when the target cannot be reached.
    pub calculate_partial: bool,
    start_node: NodeIndex,
    end_node: NodeIndex,
    end_position: Int3,
    closest: NodeIndex,
    closest_h: u32,
}

impl ShortestPath {
    pub fn new(start_point: Int3, end_point: Int3) -> Self {
        Self {
            start_point,
            end_point,
            calculate_partial: false,
            start_node: NodeIndex::INVALID,
            end_node: NodeIndex::INVALID,
            end_position: end_point,
            closest: NodeIndex::INVALID,
            closest_h: u32::MAX,
        }
    }

    pub fn with_partial(mut self, calculate_partial: bool) -> Self {
        self.calculate_partial = calculate_partial;
        self
    }

    /// Node the start point snapped to, once prepared.
    pub fn start_node(&self) -> NodeIndex {
        self.start_node
    }

    /// Node the end point snapped to, once prepared.
    pub fn end_node(&self) -> NodeIndex {
        self.end_node
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

        let Some(end) = env.params.nearest(env.graphs, self.end_point) else {
            env.out.fail(&format!("no suitable node close to end point {}", self.end_point));
            return;
        };
        let Some(end_node) = env.graphs.node(end.node) else {
            env.out.fail("end node vanished from the graph");
            return;
        };
        if !self.calculate_partial
            && env.graphs.areas_valid()
            && start_node.area != 0
            && end_node.area != 0
            && start_node.area != end_node.area
        {
            env.out.fail(&format!(
                "start and end lie in different connected areas ({} and {})",
                start_node.area, end_node.area
            ));
            return;
        }

        self.start_node = start.node;
        self.end_node = end.node;
        self.end_position = end_node.position;
    }

    pub(crate) fn initialize(&mut self, env: &mut Env<'_>) {
        let Some(start) = env.graphs.node(self.start_node) else {
            env.out.fail("start node vanished from the graph");
            return;
        };
        let h = env.params.estimate(start.position, self.end_position);
        open_root(env.handler, self.start_node, h);
        self.closest = self.start_node;
        self.closest_h = h;

        if self.start_node == self.end_node {
            env.handler.pop();
            env.out.searched_nodes += 1;
            if env.out.trace(env.graphs, env.handler, self.end_node) {
                env.out.set_complete(CompleteState::Complete);
            }
        }
    }

    pub(crate) fn step<T: Traversal + ?Sized>(&mut self, env: &mut Env<'_>, traversal: &T, deadline: Instant) {
        let params = env.params;
        let end = self.end_node;
        let end_position = self.end_position;
        let closest = &mut self.closest;
        let closest_h = &mut self.closest_h;

        let outcome = search_until(
            env.graphs,
            env.handler,
            traversal,
            u32::MAX,
            deadline,
            &mut env.out.searched_nodes,
            |n| params.estimate(n.position, end_position),
            |h, n| {
                if n == end {
                    return Visit::Stop;
                }
                let nh = h.node(n).h;
                if nh < *closest_h {
                    *closest_h = nh;
                    *closest = n;
                }
                Visit::Continue
            },
        );

        match outcome {
            StepOutcome::Yielded => {}
            StepOutcome::Stopped(n) => {
                if env.out.trace(env.graphs, env.handler, n) {
                    env.out.set_complete(CompleteState::Complete);
                }
            }
            StepOutcome::Exhausted => {
                if self.calculate_partial && self.closest.is_valid() {
                    if env.out.trace(env.graphs, env.handler, self.closest) {
                        env.out.set_complete(CompleteState::Partial);
                    }
                } else {
                    let msg = format!(
                        "target {} is unreachable; searched {} nodes",
                        self.end_node, env.out.searched_nodes
                    );
                    env.out.fail(&msg);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use navq_core::{GraphSet, GridGraph, Neighbours};

    use super::*;
    use crate::astar::DEADLINE_CHECK_INTERVAL;
    use crate::constant::ConstantPath;
    use crate::handler::PathHandler;
    use crate::heuristic::Heuristic;
    use crate::search::tests::{cell, grid_set, open_grid, run};
    use crate::search::{Search, SearchContext, SearchKind, SearchParams};

    #[test]
    fn open_grid_diagonal_in_eight_steps() {
        let graphs = open_grid(5, 5, Neighbours::Four);
        let mut handler = PathHandler::new(0);
        let mut s = Search::new(ShortestPath::new(cell(0, 0), cell(4, 4)));
        run(&graphs, &mut handler, 1, &mut s);

        assert_eq!(s.state(), CompleteState::Complete);
        assert_eq!(s.path().len(), 9);
        assert_eq!(s.vector_path().len(), 9);
        assert_eq!(s.vector_path()[0], cell(0, 0));
        assert_eq!(s.vector_path()[8], cell(4, 4));
        assert!(s.error_log().is_empty());
    }

    #[test]
    fn unreachable_goal_fails_with_empty_output() {
        let graphs = grid_set(
            "
            ..#..
            ..#..
            ..#..
            ",
            Neighbours::Eight,
        );
        let mut handler = PathHandler::new(0);
        let mut s = Search::new(ShortestPath::new(cell(0, 0), cell(4, 2)));
        run(&graphs, &mut handler, 1, &mut s);

        assert_eq!(s.state(), CompleteState::Error);
        assert!(!s.error_log().is_empty());
        assert!(s.path().is_empty());
        assert!(s.vector_path().is_empty());
    }

    #[test]
    fn unreachable_goal_found_by_search_without_areas() {
        // No flood fill: the area shortcut is unavailable and the search
        // has to exhaust the open list.
        let mut graphs = GraphSet::new();
        graphs
            .add_graph(GridGraph::from_ascii("..#..", 1000, Neighbours::Four).unwrap())
            .unwrap();
        let mut handler = PathHandler::new(0);
        let mut s = Search::new(ShortestPath::new(cell(0, 0), cell(4, 0)));
        run(&graphs, &mut handler, 1, &mut s);

        assert!(s.error());
        assert!(s.error_log().contains("unreachable"));
        assert_eq!(s.searched_nodes(), 2);
    }

    #[test]
    fn partial_path_ends_next_to_the_wall() {
        let graphs = grid_set(
            "
            ...#.
            ...#.
            ...#.
            ",
            Neighbours::Four,
        );
        let mut handler = PathHandler::new(0);
        let mut s = Search::new(ShortestPath::new(cell(0, 1), cell(4, 1)).with_partial(true));
        run(&graphs, &mut handler, 1, &mut s);

        assert_eq!(s.state(), CompleteState::Partial);
        assert_eq!(s.vector_path().last(), Some(&cell(2, 1)));
    }

    #[test]
    fn same_start_and_end() {
        let graphs = grid_set("...", Neighbours::Four);
        let mut handler = PathHandler::new(0);
        let mut s = Search::new(ShortestPath::new(cell(1, 0), cell(1, 0)));
        run(&graphs, &mut handler, 1, &mut s);
        assert_eq!(s.state(), CompleteState::Complete);
        assert_eq!(s.path().len(), 1);
    }

    #[test]
    fn blocked_start_fails_in_prepare() {
        let graphs = grid_set("#..", Neighbours::Four);
        let mut handler = PathHandler::new(0);
        let params = SearchParams {
            nn_constraint: navq_core::NnConstraint::none(),
            ..SearchParams::default()
        };
        let mut s = Search::with_params(ShortestPath::new(cell(0, 0), cell(2, 0)), params);
        run(&graphs, &mut handler, 1, &mut s);
        assert!(s.error());
        assert!(s.error_log().contains("not traversable"));
    }

    #[test]
    fn penalties_steer_around_expensive_cells() {
        let graphs = grid_set(
            "
            .....
            .999.
            .....
            ",
            Neighbours::Four,
        );
        let mut handler = PathHandler::new(0);
        let mut s = Search::new(ShortestPath::new(cell(0, 1), cell(4, 1)));
        run(&graphs, &mut handler, 1, &mut s);
        assert_eq!(s.state(), CompleteState::Complete);
        assert!(s.vector_path().iter().all(|p| p.z != 1000 || p.x == 0 || p.x == 4000));
    }

    #[test]
    fn heuristic_never_overestimates() {
        let walls = "
            ........
            .##..#..
            ...#.#..
            .#.#....
            .#...##.
            ........
        ";
        let open = "
            ........
            ........
            ........
            ........
            ........
            ........
        ";
        for (map, neighbours) in [
            (walls, Neighbours::Four),
            (walls, Neighbours::Eight),
            (open, Neighbours::Four),
            (open, Neighbours::Eight),
        ] {
            let graphs = grid_set(map, neighbours);
            let mut handler = PathHandler::new(0);
            let goal = cell(7, 5);

            // Exact costs to the goal from every reachable node.
            let mut exact = Search::new(ConstantPath::new(goal, u32::MAX));
            run(&graphs, &mut handler, 1, &mut exact);
            let SearchKind::Constant(c) = exact.kind() else {
                unreachable!()
            };
            let costs = c.all_nodes().to_vec();
            assert!(!costs.is_empty());

            let heuristic = match neighbours {
                Neighbours::Four => Heuristic::Manhattan,
                Neighbours::Eight => Heuristic::DiagonalManhattan,
            };
            for (node, cost) in costs {
                let pos = graphs.node(node).unwrap().position;
                for h in [Heuristic::Euclidean, heuristic] {
                    assert!(h.estimate(pos, goal, 1.0) <= cost, "{h:?} overestimates at {pos}");
                }
            }
        }
    }

    #[test]
    fn heuristic_scale_one_gives_optimal_length() {
        let graphs = grid_set(
            "
            ..........
            .########.
            ..........
            ",
            Neighbours::Eight,
        );
        let mut handler = PathHandler::new(0);
        let mut costs = Vec::new();
        for (tag, h) in [Heuristic::None, Heuristic::Euclidean, Heuristic::DiagonalManhattan]
            .into_iter()
            .enumerate()
        {
            let params = SearchParams {
                heuristic: h,
                ..SearchParams::default()
            };
            let mut s = Search::with_params(ShortestPath::new(cell(0, 0), cell(9, 2)), params);
            run(&graphs, &mut handler, tag as u32 + 1, &mut s);
            assert_eq!(s.state(), CompleteState::Complete);
            let g = s
                .vector_path()
                .windows(2)
                .map(|w| (w[1] - w[0]).magnitude())
                .sum::<u32>();
            costs.push(g);
        }
        assert!(costs.windows(2).all(|w| w[0] == w[1]), "{costs:?}");
    }

    #[test]
    fn resumes_after_deadline() {
        let graphs = open_grid(60, 60, Neighbours::Eight);
        let mut handler = PathHandler::new(0);
        handler.initialize_for_path(1, 0, graphs.node_capacity());
        let params = SearchParams {
            heuristic: Heuristic::None,
            ..SearchParams::default()
        };
        let mut s = Search::with_params(ShortestPath::new(cell(0, 0), cell(59, 59)), params);
        let mut ctx = SearchContext {
            graphs: &graphs,
            handler: &mut handler,
        };
        s.prepare(&mut ctx);
        s.initialize(&mut ctx);

        let mut steps = 0;
        while !s.is_done() {
            // Already passed: each call closes one batch of nodes.
            s.calculate_step(&mut ctx, Instant::now());
            steps += 1;
        }
        s.cleanup();
        assert!(steps > 1);
        assert_eq!(s.state(), CompleteState::Complete);
        assert_eq!(s.path().len(), 60);
    }

    #[test]
    fn steps_close_a_bounded_number_of_nodes_past_the_deadline() {
        let graphs = open_grid(300, 300, Neighbours::Eight);
        let mut handler = PathHandler::new(0);
        handler.initialize_for_path(1, 0, graphs.node_capacity());
        let params = SearchParams {
            heuristic: Heuristic::None,
            ..SearchParams::default()
        };
        let mut s = Search::with_params(ShortestPath::new(cell(0, 0), cell(299, 299)), params.clone());
        let mut ctx = SearchContext {
            graphs: &graphs,
            handler: &mut handler,
        };
        s.prepare(&mut ctx);
        s.initialize(&mut ctx);

        // A deadline in the past lets each call close at most one batch.
        let mut calls = 0;
        while !s.is_done() {
            let before = s.searched_nodes();
            s.calculate_step(&mut ctx, Instant::now());
            let closed = s.searched_nodes() - before;
            assert!(closed <= DEADLINE_CHECK_INTERVAL, "closed {closed} nodes in one call");
            calls += 1;
        }
        s.cleanup();
        assert!(calls > 100, "{calls}");

        // A near deadline is overshot by at most a few batches.
        let mut s = Search::with_params(ShortestPath::new(cell(0, 0), cell(299, 299)), params);
        ctx.handler.initialize_for_path(2, 0, graphs.node_capacity());
        s.prepare(&mut ctx);
        s.initialize(&mut ctx);
        let deadline = Instant::now() + Duration::from_millis(1);
        s.calculate_step(&mut ctx, deadline);
        let overshoot = Instant::now().saturating_duration_since(deadline);
        assert!(overshoot < Duration::from_millis(100), "{overshoot:?}");
    }

    #[test]
    fn stale_tags_do_not_leak_between_searches() {
        let graphs = grid_set(
            "
            .....
            .###.
            .....
            ",
            Neighbours::Four,
        );
        let mut handler = PathHandler::new(0);
        let mut a = Search::new(ShortestPath::new(cell(0, 0), cell(4, 2)));
        run(&graphs, &mut handler, 0xFFFF, &mut a);

        // Next tag after a 16-bit id wrap: new epoch, id 1. Same era, so no
        // full reset, yet nothing from the previous search is visible.
        let mut b = Search::new(ShortestPath::new(cell(4, 2), cell(0, 0)));
        run(&graphs, &mut handler, (1 << 16) | 1, &mut b);
        assert_eq!(handler.full_resets(), 0);
        assert_eq!(b.state(), CompleteState::Complete);
        assert_eq!(b.path().len(), a.path().len());
        assert_eq!(b.path().first(), a.path().last());
    }
}
