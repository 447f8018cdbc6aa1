//! [`GridGraph`]: a rectangular grid of cells in the XZ plane.
//!
//! Each cell is one node. Connectivity is cached per node as a bitmask of
//! directions and recomputed locally whenever walkability changes.

use crate::constraint::{NearestConstraint, NearestNode};
use crate::error::GraphError;
use crate::geom::Int3;
use crate::graph::{NavGraph, nearest_by_scan};
use crate::node::{Connection, GraphNode};
use crate::update::GraphUpdate;

/// Offsets of the eight directions. The first four are axis aligned.
const DIRS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// Which neighbours a cell connects to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Neighbours {
    /// Cardinal neighbours only.
    Four,
    /// Cardinal and diagonal neighbours.
    Eight,
}

/// A grid graph of `width` × `depth` cells.
#[derive(Clone, Debug)]
pub struct GridGraph {
    width: usize,
    depth: usize,
    node_size: i32,
    origin: Int3,
    neighbours: Neighbours,
    /// Allow diagonal moves past a blocked orthogonal neighbour.
    cut_corners: bool,
    nodes: Vec<GraphNode>,
    connections: Vec<u8>,
    costs: [u32; 8],
}

impl GridGraph {
    /// Create an all-walkable grid. `node_size` is the cell size in integer
    /// units (1000 = one world unit).
    pub fn new(
        width: usize,
        depth: usize,
        node_size: i32,
        neighbours: Neighbours,
    ) -> Result<Self, GraphError> {
        if width == 0 || depth == 0 || node_size <= 0 || width.saturating_mul(depth) > u32::MAX as usize / 2 {
            return Err(GraphError::InvalidSize { width, depth });
        }
        let straight = node_size as u32;
        let diagonal = Int3::new(node_size, 0, node_size).ceil_magnitude();
        let mut nodes = Vec::with_capacity(width * depth);
        for z in 0..depth {
            for x in 0..width {
                nodes.push(GraphNode::new(Int3::new(x as i32 * node_size, 0, z as i32 * node_size)));
            }
        }
        let mut grid = Self {
            width,
            depth,
            node_size,
            origin: Int3::ZERO,
            neighbours,
            cut_corners: false,
            nodes,
            connections: vec![0; width * depth],
            costs: [
                straight, straight, straight, straight, diagonal, diagonal, diagonal, diagonal,
            ],
        };
        grid.recalculate_all_connections();
        Ok(grid)
    }

    /// Parse a grid from text, one row per line (row 0 is `z = 0`).
    ///
    /// `.` is walkable, `#` is blocked and a digit `d` is walkable with a
    /// penalty of `d * node_size`. Blank lines are skipped.
    pub fn from_ascii(text: &str, node_size: i32, neighbours: Neighbours) -> Result<Self, GraphError> {
        let rows: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let width = rows.first().map_or(0, |r| r.chars().count());
        for (row, line) in rows.iter().enumerate() {
            let found = line.chars().count();
            if found != width {
                return Err(GraphError::InconsistentMap {
                    row,
                    found,
                    expected: width,
                });
            }
        }
        let mut grid = Self::new(width, rows.len(), node_size, neighbours)?;
        for (z, line) in rows.iter().enumerate() {
            for (x, ch) in line.chars().enumerate() {
                let node = &mut grid.nodes[z * width + x];
                match ch {
                    '.' => {}
                    '#' => node.walkable = false,
                    d if d.is_ascii_digit() => {
                        node.penalty = d.to_digit(10).unwrap_or(0) * node_size as u32;
                    }
                    ch => return Err(GraphError::InvalidMapChar { ch, x, z }),
                }
            }
        }
        grid.recalculate_all_connections();
        Ok(grid)
    }

    /// Move the grid so that cell (0, 0) sits at `origin`.
    pub fn with_origin(mut self, origin: Int3) -> Self {
        let delta = origin - self.origin;
        for n in &mut self.nodes {
            n.position = n.position + delta;
        }
        self.origin = origin;
        self
    }

    /// Allow or forbid diagonal moves that cut a blocked corner.
    pub fn with_cut_corners(mut self, cut_corners: bool) -> Self {
        self.cut_corners = cut_corners;
        self.recalculate_all_connections();
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn node_size(&self) -> i32 {
        self.node_size
    }

    /// Local slot of cell (x, z), or `None` if out of bounds.
    #[inline]
    pub fn local_index(&self, x: i32, z: i32) -> Option<usize> {
        if x >= 0 && z >= 0 && (x as usize) < self.width && (z as usize) < self.depth {
            Some(z as usize * self.width + x as usize)
        } else {
            None
        }
    }

    /// Cell coordinates of a local slot.
    #[inline]
    pub fn cell(&self, local: usize) -> (i32, i32) {
        ((local % self.width) as i32, (local / self.width) as i32)
    }

    pub fn node_at(&self, x: i32, z: i32) -> Option<&GraphNode> {
        self.local_index(x, z).map(|i| &self.nodes[i])
    }

    /// Change the walkability of a cell and refresh the connections around it.
    pub fn set_walkable(&mut self, x: i32, z: i32, walkable: bool) {
        if let Some(i) = self.local_index(x, z) {
            self.nodes[i].walkable = walkable;
            self.recalculate_around(x, z);
        }
    }

    pub fn set_penalty(&mut self, x: i32, z: i32, penalty: u32) {
        if let Some(i) = self.local_index(x, z) {
            self.nodes[i].penalty = penalty;
        }
    }

    pub fn set_tag(&mut self, x: i32, z: i32, tag: u8) {
        if let Some(i) = self.local_index(x, z) {
            self.nodes[i].tag = tag;
        }
    }

    /// Whether the cell at (x, z) connects in direction `dir`.
    #[inline]
    pub fn has_connection(&self, x: i32, z: i32, dir: usize) -> bool {
        self.local_index(x, z)
            .is_some_and(|i| self.connections[i] & (1 << dir) != 0)
    }

    fn walkable(&self, x: i32, z: i32) -> bool {
        self.local_index(x, z).is_some_and(|i| self.nodes[i].walkable)
    }

    fn calculate_connections(&self, x: i32, z: i32) -> u8 {
        if !self.walkable(x, z) {
            return 0;
        }
        let mut mask = 0u8;
        for (d, (dx, dz)) in DIRS.iter().enumerate().take(4) {
            if self.walkable(x + dx, z + dz) {
                mask |= 1 << d;
            }
        }
        if self.neighbours == Neighbours::Eight {
            for (d, (dx, dz)) in DIRS.iter().enumerate().skip(4) {
                if !self.walkable(x + dx, z + dz) {
                    continue;
                }
                // The two axis neighbours that share the corner.
                let side_a = self.walkable(x + dx, z);
                let side_b = self.walkable(x, z + dz);
                let ok = if self.cut_corners { side_a || side_b } else { side_a && side_b };
                if ok {
                    mask |= 1 << d;
                }
            }
        }
        mask
    }

    /// Recompute the connection masks of (x, z) and its eight neighbours.
    pub fn recalculate_around(&mut self, x: i32, z: i32) {
        for dz in -1..=1 {
            for dx in -1..=1 {
                if let Some(i) = self.local_index(x + dx, z + dz) {
                    self.connections[i] = self.calculate_connections(x + dx, z + dz);
                }
            }
        }
    }

    pub fn recalculate_all_connections(&mut self) {
        for i in 0..self.nodes.len() {
            let (x, z) = self.cell(i);
            self.connections[i] = self.calculate_connections(x, z);
        }
    }
}

impl NavGraph for GridGraph {
    #[inline]
    fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    #[inline]
    fn nodes_mut(&mut self) -> &mut [GraphNode] {
        &mut self.nodes
    }

    #[inline]
    fn for_each_connection<F: FnMut(Connection)>(&self, local: usize, mut f: F) {
        let mask = self.connections[local];
        if mask == 0 {
            return;
        }
        let (x, z) = self.cell(local);
        for (d, (dx, dz)) in DIRS.iter().enumerate() {
            if mask & (1 << d) == 0 {
                continue;
            }
            let ni = (z + dz) as usize * self.width + (x + dx) as usize;
            f(Connection {
                node: self.nodes[ni].index,
                cost: self.costs[d],
            });
        }
    }

    /// Snap the query point onto the grid. When the snapped cell is rejected
    /// by the constraint, fall back to a full scan.
    fn nearest(&self, position: Int3, constraint: &dyn NearestConstraint) -> Option<NearestNode> {
        let rel = position - self.origin;
        let half = self.node_size / 2;
        let x = (rel.x + half).div_euclid(self.node_size).clamp(0, self.width as i32 - 1);
        let z = (rel.z + half).div_euclid(self.node_size).clamp(0, self.depth as i32 - 1);
        let node = self.node_at(x, z)?;
        if !constraint.suitable(node) {
            return nearest_by_scan(&self.nodes, position, constraint);
        }
        let clamped = Int3::new(
            position.x.clamp(node.position.x - half, node.position.x + half),
            node.position.y,
            position.z.clamp(node.position.z - half, node.position.z + half),
        );
        Some(NearestNode {
            node: node.index,
            position: clamped,
            distance: (clamped - position).magnitude(),
        })
    }

    fn apply_update(&mut self, update: &GraphUpdate) -> bool {
        let mut changed_cells = Vec::new();
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if update.bounds.contains_xz(node.position) && update.apply(node) {
                changed_cells.push(i);
            }
        }
        for &i in &changed_cells {
            let (x, z) = self.cell(i);
            self.recalculate_around(x, z);
        }
        !changed_cells.is_empty()
    }
}
