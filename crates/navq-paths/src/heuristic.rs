//! Heuristic distance estimates.

use navq_core::Int3;

/// Manhattan (L1) distance over all three axes.
#[inline]
pub fn manhattan(a: Int3, b: Int3) -> u64 {
    let (dx, dy, dz) = a.abs_delta(b);
    dx as u64 + dy as u64 + dz as u64
}

/// Octile approximation for 8-connected grids in the XZ plane, plus the
/// vertical difference. Diagonal steps are counted as 1.4.
#[inline]
pub fn diagonal_manhattan(a: Int3, b: Int3) -> u64 {
    let (dx, dy, dz) = a.abs_delta(b);
    let (lo, hi) = (dx.min(dz) as u64, dx.max(dz) as u64);
    (14 * lo) / 10 + (hi - lo) + dy as u64
}

/// Straight-line distance, rounded down.
#[inline]
pub fn euclidean(a: Int3, b: Int3) -> u64 {
    ((a - b).sqr_magnitude() as f64).sqrt() as u64
}

/// Heuristic used to guide a search towards its target.
///
/// With a scale of at most 1 every variant is admissible on graphs whose
/// edge costs are at least the straight-line length of the edge, so searches
/// return optimal paths. Scales above 1 trade optimality for fewer expanded
/// nodes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Heuristic {
    /// Always 0: the search degrades to Dijkstra.
    None,
    Manhattan,
    DiagonalManhattan,
    #[default]
    Euclidean,
}

impl Heuristic {
    /// Scaled estimate of the cost between `from` and `to`.
    #[inline]
    pub fn estimate(self, from: Int3, to: Int3, scale: f32) -> u32 {
        let raw = match self {
            Self::None => return 0,
            Self::Manhattan => manhattan(from, to),
            Self::DiagonalManhattan => diagonal_manhattan(from, to),
            Self::Euclidean => euclidean(from, to),
        };
        (raw as f64 * scale as f64).min(u32::MAX as f64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        let a = Int3::ZERO;
        let b = Int3::new(3000, 0, 4000);
        assert_eq!(Heuristic::Euclidean.estimate(a, b, 1.0), 5000);
        assert_eq!(Heuristic::Manhattan.estimate(a, b, 1.0), 7000);
        // 1.4 * 3000 + (4000 - 3000)
        assert_eq!(Heuristic::DiagonalManhattan.estimate(a, b, 1.0), 5200);
        assert_eq!(Heuristic::None.estimate(a, b, 1.0), 0);
    }

    #[test]
    fn diagonal_manhattan_counts_height() {
        let a = Int3::ZERO;
        let b = Int3::new(1000, 500, 1000);
        assert_eq!(diagonal_manhattan(a, b), 1400 + 500);
    }

    #[test]
    fn scale_multiplies() {
        let a = Int3::ZERO;
        let b = Int3::new(1000, 0, 0);
        assert_eq!(Heuristic::Manhattan.estimate(a, b, 0.5), 500);
        assert_eq!(Heuristic::Manhattan.estimate(a, b, 2.0), 2000);
    }

    #[test]
    fn euclidean_never_exceeds_diagonal_edges() {
        let diagonal = Int3::new(1000, 0, 1000).ceil_magnitude() as u64;
        for k in 1..=200 {
            let b = Int3::new(1000 * k, 0, 1000 * k);
            assert!(euclidean(Int3::ZERO, b) <= diagonal * k as u64, "{k} diagonal steps");
        }
        assert_eq!(euclidean(Int3::ZERO, Int3::new(3000, 0, 3000)), 4242);
    }

    #[test]
    fn symmetric() {
        let a = Int3::new(-4000, 10, 2500);
        let b = Int3::new(1200, -30, 9000);
        for h in [Heuristic::Manhattan, Heuristic::DiagonalManhattan, Heuristic::Euclidean] {
            assert_eq!(h.estimate(a, b, 1.0), h.estimate(b, a, 1.0));
        }
    }
}
