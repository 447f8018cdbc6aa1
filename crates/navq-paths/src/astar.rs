//! The A* expansion loop shared by every search kind.

use std::time::Instant;

use navq_core::{GraphNode, GraphSet, NodeIndex};

use crate::handler::PathHandler;
use crate::path_node::NOT_IN_HEAP;
use crate::traversal::Traversal;

/// Nodes expanded between two deadline checks. Bounds how far a step can
/// overshoot its deadline.
pub const DEADLINE_CHECK_INTERVAL: u32 = 500;

/// Decision taken by a search kind when a node is closed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Visit {
    Continue,
    Stop,
}

/// How a call to [`search_until`] ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// The visitor asked to stop at this node.
    Stopped(NodeIndex),
    /// The open list ran dry.
    Exhausted,
    /// The deadline passed; call again to resume.
    Yielded,
}

/// Put a root node on the open list with G = 0.
pub(crate) fn open_root(handler: &mut PathHandler, node: NodeIndex, h: u32) {
    let pn = handler.node_mut(node);
    pn.g = 0;
    pn.h = h;
    pn.parent = NodeIndex::INVALID;
    if pn.heap_index != NOT_IN_HEAP {
        handler.decrease_key(node);
    } else if !pn.closed {
        handler.push(node);
    }
}

/// Close nodes in F order until `visit` stops, the open list empties or
/// `deadline` passes.
///
/// `estimate` computes H for newly opened nodes. Neighbours whose G would
/// exceed `max_g` are never opened. The loop keeps all of its state in the
/// handler, so it can be resumed by calling it again.
#[allow(clippy::too_many_arguments)]
pub(crate) fn search_until<T, H, V>(
    graphs: &GraphSet,
    handler: &mut PathHandler,
    traversal: &T,
    max_g: u32,
    deadline: Instant,
    searched: &mut u32,
    estimate: H,
    mut visit: V,
) -> StepOutcome
where
    T: Traversal + ?Sized,
    H: Fn(&GraphNode) -> u32,
    V: FnMut(&mut PathHandler, NodeIndex) -> Visit,
{
    let mut since_check = 0u32;
    loop {
        if since_check >= DEADLINE_CHECK_INTERVAL {
            since_check = 0;
            if Instant::now() >= deadline {
                return StepOutcome::Yielded;
            }
        }

        let Some(current) = handler.pop() else {
            return StepOutcome::Exhausted;
        };
        *searched += 1;
        since_check += 1;

        if visit(handler, current) == Visit::Stop {
            return StepOutcome::Stopped(current);
        }

        open_neighbours(graphs, handler, traversal, max_g, &estimate, current);
    }
}

/// Relax every connection out of `current`.
#[inline]
fn open_neighbours<T, H>(
    graphs: &GraphSet,
    handler: &mut PathHandler,
    traversal: &T,
    max_g: u32,
    estimate: &H,
    current: NodeIndex,
) where
    T: Traversal + ?Sized,
    H: Fn(&GraphNode) -> u32,
{
    let current_g = handler.node(current).g;

    graphs.for_each_connection(current, |c| {
        let Some(node) = graphs.node(c.node) else {
            return;
        };
        if !traversal.can_enter(node) {
            return;
        }
        let g = current_g
            .saturating_add(c.cost)
            .saturating_add(traversal.enter_cost(node));
        if g > max_g {
            return;
        }

        let pn = handler.node_mut(c.node);
        if pn.closed || g >= pn.g {
            return;
        }
        pn.g = g;
        pn.parent = current;
        if pn.heap_index == NOT_IN_HEAP {
            pn.h = estimate(node);
            handler.push(c.node);
        } else {
            handler.decrease_key(c.node);
        }
    });
}
