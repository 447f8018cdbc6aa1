//! The search state machine: prepare → initialize → calculate_step* → cleanup.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use navq_core::{GraphNode, GraphSet, Int3, NearestConstraint, NearestNode, NnConstraint, NodeIndex};

use crate::constant::ConstantPath;
use crate::flood::{FloodPath, FloodPathTracer};
use crate::handler::PathHandler;
use crate::heuristic::Heuristic;
use crate::multi_target::MultiTargetPath;
use crate::shortest::ShortestPath;
use crate::traversal::{Provided, TagRules, Traversal, TraversalProvider};

/// Longest parent chain a trace will follow. Anything longer means the
/// search tree contains a cycle, which only a corrupt graph can cause.
pub const MAX_TRACE_LENGTH: usize = 1 << 20;

/// Outcome of a search.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompleteState {
    #[default]
    NotCalculated,
    Error,
    Complete,
    Partial,
}

// ---------------------------------------------------------------------------
// SearchParams
// ---------------------------------------------------------------------------

/// Settings shared by every search kind.
#[derive(Clone)]
pub struct SearchParams {
    pub heuristic: Heuristic,
    pub heuristic_scale: f32,
    pub rules: TagRules,
    /// Overrides `rules` when set.
    pub traversal: Option<Arc<dyn TraversalProvider>>,
    /// Constraint used to snap start and end points to nodes.
    pub nn_constraint: NnConstraint,
    /// Points further than this from every suitable node fail to snap.
    pub max_nearest_distance: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            heuristic: Heuristic::default(),
            heuristic_scale: 1.0,
            rules: TagRules::default(),
            traversal: None,
            nn_constraint: NnConstraint::default(),
            max_nearest_distance: 100 * navq_core::INT_PRECISION as u32,
        }
    }
}

impl fmt::Debug for SearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchParams")
            .field("heuristic", &self.heuristic)
            .field("heuristic_scale", &self.heuristic_scale)
            .field("rules", &self.rules)
            .field("traversal", &self.traversal.as_ref().map(|_| ".."))
            .field("nn_constraint", &self.nn_constraint)
            .field("max_nearest_distance", &self.max_nearest_distance)
            .finish()
    }
}

impl SearchParams {
    /// Whether the path may enter `node`.
    #[inline]
    pub fn can_traverse(&self, node: &GraphNode) -> bool {
        match &self.traversal {
            Some(p) => p.can_traverse(&self.rules, node),
            None => self.rules.can_traverse(node),
        }
    }

    /// Scaled heuristic estimate between two positions.
    #[inline]
    pub fn estimate(&self, from: Int3, to: Int3) -> u32 {
        self.heuristic.estimate(from, to, self.heuristic_scale)
    }

    /// Snap `point` to a node using the path's constraint.
    pub fn nearest(&self, graphs: &GraphSet, point: Int3) -> Option<NearestNode> {
        self.nearest_with(graphs, point, &self.nn_constraint)
    }

    pub fn nearest_with(
        &self,
        graphs: &GraphSet,
        point: Int3,
        constraint: &dyn NearestConstraint,
    ) -> Option<NearestNode> {
        graphs.nearest(point, constraint, self.max_nearest_distance)
    }
}

// ---------------------------------------------------------------------------
// SearchOutput
// ---------------------------------------------------------------------------

/// Result fields shared by every search kind.
#[derive(Clone, Debug, Default)]
pub(crate) struct SearchOutput {
    pub(crate) state: CompleteState,
    pub(crate) error_log: String,
    pub(crate) path: Vec<NodeIndex>,
    pub(crate) vector_path: Vec<Int3>,
    pub(crate) searched_nodes: u32,
    pub(crate) duration: Duration,
}

impl SearchOutput {
    fn reset(&mut self) {
        self.state = CompleteState::NotCalculated;
        self.error_log.clear();
        self.path.clear();
        self.vector_path.clear();
        self.searched_nodes = 0;
        self.duration = Duration::ZERO;
    }

    /// Mark the search failed. Clears any partial output.
    pub(crate) fn fail(&mut self, msg: &str) {
        if !self.error_log.is_empty() {
            self.error_log.push_str("; ");
        }
        self.error_log.push_str(msg);
        self.state = CompleteState::Error;
        self.path.clear();
        self.vector_path.clear();
    }

    /// Record a successful outcome. An earlier error always wins.
    pub(crate) fn set_complete(&mut self, state: CompleteState) {
        if self.state != CompleteState::Error {
            self.state = state;
        }
    }

    /// Fill `path` and `vector_path` by walking parents from `from`.
    pub(crate) fn trace(&mut self, graphs: &GraphSet, handler: &PathHandler, from: NodeIndex) -> bool {
        let mut path = std::mem::take(&mut self.path);
        let ok = trace_parents(handler, from, &mut path);
        self.path = path;
        if !ok {
            self.fail("search tree is corrupt: parent chain exceeds the maximum path length");
            return false;
        }
        self.vector_path.clear();
        self.vector_path
            .extend(self.path.iter().filter_map(|&n| graphs.node(n).map(|n| n.position)));
        true
    }
}

/// Walk parent pointers from `from` to the root, writing the chain in
/// root-first order into `out`. Returns `false` (and logs) when the chain is
/// longer than [`MAX_TRACE_LENGTH`].
pub(crate) fn trace_parents(handler: &PathHandler, from: NodeIndex, out: &mut Vec<NodeIndex>) -> bool {
    out.clear();
    let mut c = from;
    while c.is_valid() {
        if out.len() >= MAX_TRACE_LENGTH {
            log::error!(
                "parent chain from node {from} is longer than {MAX_TRACE_LENGTH} nodes; the graph is probably corrupt"
            );
            out.clear();
            return false;
        }
        out.push(c);
        c = handler.node(c).parent;
    }
    out.reverse();
    true
}

// ---------------------------------------------------------------------------
// SearchKind
// ---------------------------------------------------------------------------

/// Everything a search kind needs while it runs.
pub(crate) struct Env<'a> {
    pub(crate) graphs: &'a GraphSet,
    pub(crate) handler: &'a mut PathHandler,
    pub(crate) params: &'a SearchParams,
    pub(crate) out: &'a mut SearchOutput,
}

/// The closed set of search kinds.
#[derive(Clone, Debug)]
pub enum SearchKind {
    /// Shortest path between two points.
    Shortest(ShortestPath),
    /// Shortest paths from one point to several targets.
    MultiTarget(MultiTargetPath),
    /// Search tree over everything reachable from a point.
    Flood(FloodPath),
    /// Path back to the origin of a finished flood.
    FloodTracer(FloodPathTracer),
    /// Every node within a cost budget.
    Constant(ConstantPath),
}

impl SearchKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shortest(_) => "shortest",
            Self::MultiTarget(_) => "multi-target",
            Self::Flood(_) => "flood",
            Self::FloodTracer(_) => "flood-tracer",
            Self::Constant(_) => "constant",
        }
    }

    fn prepare(&mut self, env: &mut Env<'_>) {
        match self {
            Self::Shortest(k) => k.prepare(env),
            Self::MultiTarget(k) => k.prepare(env),
            Self::Flood(k) => k.prepare(env),
            Self::FloodTracer(k) => k.prepare(env),
            Self::Constant(k) => k.prepare(env),
        }
    }

    fn initialize(&mut self, env: &mut Env<'_>) {
        match self {
            Self::Shortest(k) => k.initialize(env),
            Self::MultiTarget(k) => k.initialize(env),
            Self::Flood(k) => k.initialize(env),
            Self::FloodTracer(k) => k.initialize(env),
            Self::Constant(k) => k.initialize(env),
        }
    }

    fn step<T: Traversal + ?Sized>(&mut self, env: &mut Env<'_>, traversal: &T, deadline: Instant) {
        match self {
            Self::Shortest(k) => k.step(env, traversal, deadline),
            Self::MultiTarget(k) => k.step(env, traversal, deadline),
            Self::Flood(k) => k.step(env, traversal, deadline),
            // A tracer finishes during initialize.
            Self::FloodTracer(_) => {}
            Self::Constant(k) => k.step(env, traversal, deadline),
        }
    }
}

macro_rules! impl_from_kind {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for SearchKind {
            fn from(k: $ty) -> Self {
                Self::$variant(k)
            }
        })*
    };
}

impl_from_kind! {
    Shortest(ShortestPath),
    MultiTarget(MultiTargetPath),
    Flood(FloodPath),
    FloodTracer(FloodPathTracer),
    Constant(ConstantPath),
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Borrowed resources a search runs against.
pub struct SearchContext<'a> {
    pub graphs: &'a GraphSet,
    /// Must already be bound with [`PathHandler::initialize_for_path`].
    pub handler: &'a mut PathHandler,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Created,
    Prepared,
    Initialized,
    CleanedUp,
}

/// One search request: parameters, the kind-specific state and the output.
#[derive(Clone, Debug)]
pub struct Search {
    params: SearchParams,
    kind: SearchKind,
    out: SearchOutput,
    phase: Phase,
}

impl Search {
    pub fn new(kind: impl Into<SearchKind>) -> Self {
        Self::with_params(kind, SearchParams::default())
    }

    pub fn with_params(kind: impl Into<SearchKind>, params: SearchParams) -> Self {
        Self {
            params,
            kind: kind.into(),
            out: SearchOutput::default(),
            phase: Phase::Created,
        }
    }

    /// Reuse this search for a new request. Output buffers keep their
    /// allocations; parameters are left untouched.
    pub fn reset(&mut self, kind: impl Into<SearchKind>) {
        self.kind = kind.into();
        self.out.reset();
        self.phase = Phase::Created;
    }

    #[inline]
    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    #[inline]
    pub fn params_mut(&mut self) -> &mut SearchParams {
        &mut self.params
    }

    #[inline]
    pub fn kind(&self) -> &SearchKind {
        &self.kind
    }

    #[inline]
    pub fn kind_mut(&mut self) -> &mut SearchKind {
        &mut self.kind
    }

    #[inline]
    pub fn state(&self) -> CompleteState {
        self.out.state
    }

    /// Whether the search has an outcome (success or failure).
    #[inline]
    pub fn is_done(&self) -> bool {
        self.out.state != CompleteState::NotCalculated
    }

    #[inline]
    pub fn error(&self) -> bool {
        self.out.state == CompleteState::Error
    }

    #[inline]
    pub fn error_log(&self) -> &str {
        &self.out.error_log
    }

    /// Nodes of the result, start first.
    #[inline]
    pub fn path(&self) -> &[NodeIndex] {
        &self.out.path
    }

    /// Positions of the result nodes, start first.
    #[inline]
    pub fn vector_path(&self) -> &[Int3] {
        &self.out.vector_path
    }

    /// Nodes closed so far.
    #[inline]
    pub fn searched_nodes(&self) -> u32 {
        self.out.searched_nodes
    }

    /// Time spent inside `prepare`, `initialize` and `calculate_step`.
    #[inline]
    pub fn duration(&self) -> Duration {
        self.out.duration
    }

    /// Fail the search with `msg`. Has no effect on the output other than
    /// appending to the error log if the search already failed.
    pub fn fail(&mut self, msg: &str) {
        self.out.fail(msg);
    }

    fn env<'a>(&'a mut self, ctx: &'a mut SearchContext<'_>) -> (&'a mut SearchKind, Env<'a>) {
        let Search { params, kind, out, .. } = self;
        (
            kind,
            Env {
                graphs: ctx.graphs,
                handler: &mut *ctx.handler,
                params,
                out,
            },
        )
    }

    /// Resolve start and target points to graph nodes.
    ///
    /// # Panics
    ///
    /// Panics if the search was already prepared without a [`reset`](Self::reset).
    pub fn prepare(&mut self, ctx: &mut SearchContext<'_>) {
        assert_eq!(self.phase, Phase::Created, "prepare called on a search that was not reset");
        let t0 = Instant::now();
        self.phase = Phase::Prepared;
        let (kind, mut env) = self.env(ctx);
        kind.prepare(&mut env);
        self.out.duration += t0.elapsed();
    }

    /// Seed the open list.
    ///
    /// # Panics
    ///
    /// Panics if [`prepare`](Self::prepare) has not run.
    pub fn initialize(&mut self, ctx: &mut SearchContext<'_>) {
        assert_eq!(self.phase, Phase::Prepared, "initialize called before prepare");
        let t0 = Instant::now();
        self.phase = Phase::Initialized;
        if !self.is_done() {
            let (kind, mut env) = self.env(ctx);
            kind.initialize(&mut env);
        }
        self.out.duration += t0.elapsed();
    }

    /// Advance the search until it finishes or `deadline` passes.
    ///
    /// The deadline is checked every
    /// [`DEADLINE_CHECK_INTERVAL`](crate::astar::DEADLINE_CHECK_INTERVAL)
    /// closed nodes. Call again to resume.
    ///
    /// # Panics
    ///
    /// Panics if [`initialize`](Self::initialize) has not run.
    pub fn calculate_step(&mut self, ctx: &mut SearchContext<'_>, deadline: Instant) {
        assert_eq!(self.phase, Phase::Initialized, "calculate_step called on a search that was not initialized");
        if self.is_done() {
            return;
        }
        let t0 = Instant::now();
        let Search { params, kind, out, .. } = self;
        let mut env = Env {
            graphs: ctx.graphs,
            handler: &mut *ctx.handler,
            params,
            out,
        };
        match &params.traversal {
            None => kind.step(&mut env, &params.rules, deadline),
            Some(p) => {
                let provided = Provided {
                    provider: p.as_ref(),
                    rules: &params.rules,
                };
                kind.step(&mut env, &provided, deadline)
            }
        }
        self.out.duration += t0.elapsed();
    }

    /// Finish the request. Searches that never produced an outcome are
    /// marked failed.
    pub fn cleanup(&mut self) {
        if !self.is_done() {
            self.out.fail("search was cleaned up before it finished");
        }
        self.phase = Phase::CleanedUp;
    }

    /// Run every phase back to back with no deadline.
    pub fn run(&mut self, ctx: &mut SearchContext<'_>) {
        self.prepare(ctx);
        self.initialize(ctx);
        let far = Instant::now() + Duration::from_secs(3600);
        while !self.is_done() {
            self.calculate_step(ctx, far);
        }
        self.cleanup();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use navq_core::{GridGraph, Neighbours};

    use super::*;

    /// A flood-filled set holding one grid parsed from `map`.
    pub(crate) fn grid_set(map: &str, neighbours: Neighbours) -> GraphSet {
        let mut set = GraphSet::new();
        set.add_graph(GridGraph::from_ascii(map, 1000, neighbours).unwrap()).unwrap();
        set.flood_fill();
        set
    }

    /// A set holding one all-walkable grid.
    pub(crate) fn open_grid(width: usize, depth: usize, neighbours: Neighbours) -> GraphSet {
        let mut set = GraphSet::new();
        set.add_graph(GridGraph::new(width, depth, 1000, neighbours).unwrap()).unwrap();
        set
    }

    /// Bind a fresh handler and run `search` synchronously.
    pub(crate) fn run(graphs: &GraphSet, handler: &mut PathHandler, tag: u32, search: &mut Search) {
        handler.initialize_for_path(tag, 0, graphs.node_capacity());
        let mut ctx = SearchContext { graphs, handler };
        search.run(&mut ctx);
    }

    pub(crate) fn cell(x: i32, z: i32) -> Int3 {
        Int3::from_world(x, 0, z)
    }

    #[test]
    fn error_is_sticky() {
        let mut out = SearchOutput::default();
        out.fail("boom");
        out.set_complete(CompleteState::Complete);
        assert_eq!(out.state, CompleteState::Error);
        out.fail("again");
        assert_eq!(out.error_log, "boom; again");
    }

    #[test]
    #[should_panic(expected = "not initialized")]
    fn stepping_an_unprepared_search_panics() {
        let graphs = grid_set("..", Neighbours::Four);
        let mut handler = PathHandler::new(0);
        handler.initialize_for_path(1, 0, graphs.node_capacity());
        let mut s = Search::new(ShortestPath::new(cell(0, 0), cell(1, 0)));
        let mut ctx = SearchContext {
            graphs: &graphs,
            handler: &mut handler,
        };
        s.calculate_step(&mut ctx, Instant::now());
    }

    #[test]
    #[should_panic(expected = "not reset")]
    fn preparing_twice_panics() {
        let graphs = grid_set("..", Neighbours::Four);
        let mut handler = PathHandler::new(0);
        let mut s = Search::new(ShortestPath::new(cell(0, 0), cell(1, 0)));
        run(&graphs, &mut handler, 1, &mut s);
        let mut ctx = SearchContext {
            graphs: &graphs,
            handler: &mut handler,
        };
        s.prepare(&mut ctx);
    }

    #[test]
    fn reset_restores_defaults_and_allows_rerun() {
        let graphs = grid_set("...", Neighbours::Four);
        let mut handler = PathHandler::new(0);
        let mut s = Search::new(ShortestPath::new(cell(0, 0), cell(2, 0)));
        run(&graphs, &mut handler, 1, &mut s);
        assert_eq!(s.state(), CompleteState::Complete);

        s.reset(ShortestPath::new(cell(2, 0), cell(0, 0)));
        assert_eq!(s.state(), CompleteState::NotCalculated);
        assert!(s.path().is_empty());
        assert!(s.error_log().is_empty());
        assert_eq!(s.searched_nodes(), 0);

        run(&graphs, &mut handler, 2, &mut s);
        assert_eq!(s.path().len(), 3);
    }

    #[test]
    fn cleanup_fails_unfinished_search() {
        let mut s = Search::new(ShortestPath::new(cell(0, 0), cell(1, 0)));
        s.cleanup();
        assert!(s.error());
    }

    struct AvoidColumn(i32);

    impl TraversalProvider for AvoidColumn {
        fn can_traverse(&self, rules: &TagRules, node: &GraphNode) -> bool {
            node.position.x != self.0 && rules.can_traverse(node)
        }

        fn traversal_cost(&self, _rules: &TagRules, _node: &GraphNode) -> u32 {
            7
        }
    }

    #[test]
    fn traversal_provider_overrides_tag_rules() {
        let graphs = grid_set(
            "
            .....
            .....
            .....
            ",
            Neighbours::Four,
        );
        let mut handler = PathHandler::new(0);
        let params = SearchParams {
            traversal: Some(Arc::new(AvoidColumn(2000))),
            ..SearchParams::default()
        };
        let mut s = Search::with_params(ShortestPath::new(cell(0, 1), cell(4, 1)), params);
        run(&graphs, &mut handler, 1, &mut s);

        assert_eq!(s.state(), CompleteState::Error);
        assert!(s.vector_path().is_empty());
        assert!(format!("{:?}", s.params()).contains("traversal: Some"));
    }
}
