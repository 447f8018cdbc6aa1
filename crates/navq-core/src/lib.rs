//! **navq-core**: navigation graph types consumed by the navq search engine.
//!
//! This crate provides the graph layer the engine reads from: fixed-point
//! geometry, graph nodes with stable global indices, a closed registry of
//! graph kinds (grid and point graphs), nearest-node lookups under a
//! constraint, connected-area labelling and bulk node updates.
//!
//! Graph construction beyond simple grids and hand-built point graphs is
//! out of scope.

mod area;
pub mod constraint;
pub mod error;
pub mod geom;
pub mod graph;
pub mod grid;
pub mod node;
pub mod point;
pub mod update;

pub use constraint::{NearestConstraint, NearestNode, NnConstraint};
pub use error::GraphError;
pub use geom::{Bounds, INT_PRECISION, Int3};
pub use graph::{GraphKind, GraphSet, MAX_GRAPHS, NavGraph};
pub use grid::{GridGraph, Neighbours};
pub use node::{Connection, GraphNode, MAX_TAGS, NodeIndex};
pub use point::PointGraph;
pub use update::GraphUpdate;
