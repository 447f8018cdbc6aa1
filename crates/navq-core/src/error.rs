use thiserror::Error;

use crate::graph::MAX_GRAPHS;

/// Errors raised while building or registering graphs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Every graph slot is already taken.
    #[error("at most {} graphs can be registered", MAX_GRAPHS)]
    TooManyGraphs,
    /// No graph is registered at the given index.
    #[error("no graph registered at index {0}")]
    UnknownGraph(u8),
    /// Grid dimensions are zero or too large to index.
    #[error("invalid grid size {width}x{depth}")]
    InvalidSize { width: usize, depth: usize },
    /// Rows of a text map have different widths.
    #[error("map row {row} is {found} cells wide, expected {expected}")]
    InconsistentMap {
        row: usize,
        found: usize,
        expected: usize,
    },
    /// A text map contains a character with no meaning.
    #[error("invalid map character \u{201c}{ch}\u{201d} at ({x}, {z})")]
    InvalidMapChar { ch: char, x: usize, z: usize },
}
