//! Search algorithms for the navq engine.
//!
//! Every request is a [`Search`]: a state machine driven through
//! `prepare → initialize → calculate_step* → cleanup`. The step phase can
//! stop at a deadline and be resumed later, which is what lets the engine run
//! searches either on worker threads or from a cooperative tick.
//!
//! The kinds of search are a closed set ([`SearchKind`]):
//!
//! | Kind | Result |
//! |---|---|
//! | [`ShortestPath`] | cheapest path between two points, optionally partial |
//! | [`MultiTargetPath`] | paths from one start to several targets |
//! | [`FloodPath`] | search tree of everything reachable, shared as [`FloodResult`] |
//! | [`FloodPathTracer`] | path back to a flood's origin, read from its tree |
//! | [`ConstantPath`] | every node within a cost budget |
//!
//! All searches run on a [`PathHandler`], the per-thread scratch memory
//! holding one [`PathNode`] per graph node and the open list. Entries are
//! tagged with the search that last touched them, so starting a new search
//! never clears the buffer.

mod astar;
mod constant;
mod flood;
mod handler;
mod heap;
mod heuristic;
mod multi_target;
mod path_node;
mod search;
mod shortest;
mod traversal;

pub use astar::DEADLINE_CHECK_INTERVAL;
pub use constant::ConstantPath;
pub use flood::{FloodPath, FloodPathTracer, FloodResult};
pub use handler::PathHandler;
pub use heap::BinaryHeap;
pub use heuristic::{Heuristic, diagonal_manhattan, euclidean, manhattan};
pub use multi_target::{MultiTargetHeuristic, MultiTargetPath};
pub use path_node::{NOT_IN_HEAP, PathNode, UNREACHED};
pub use search::{CompleteState, MAX_TRACE_LENGTH, Search, SearchContext, SearchKind, SearchParams};
pub use shortest::ShortestPath;
pub use traversal::{TagRules, TraversalProvider};
