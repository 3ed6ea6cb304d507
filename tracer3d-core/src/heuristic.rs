use crate::coord::{physical_distance, Coord};

/// Pluggable remaining-cost estimate, in physical units (not yet scaled by
/// `min_step_cost`; the engine applies that scaling itself).
pub trait HeuristicOracle {
    fn estimate(&self, from: Coord, to: Coord) -> f64;
}

/// Admissible default: straight-line distance using voxel spacing.
pub struct EuclideanHeuristic {
    spacing: (f64, f64, f64),
}

impl EuclideanHeuristic {
    pub fn new(spacing: (f64, f64, f64)) -> Self {
        Self { spacing }
    }
}

impl HeuristicOracle for EuclideanHeuristic {
    fn estimate(&self, from: Coord, to: Coord) -> f64 {
        physical_distance(from, to, self.spacing)
    }
}

/// Reduces the search to Dijkstra; always admissible, never informative.
pub struct ZeroHeuristic;

impl HeuristicOracle for ZeroHeuristic {
    fn estimate(&self, _from: Coord, _to: Coord) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_matches_known_distance() {
        let h = EuclideanHeuristic::new((1.0, 1.0, 1.0));
        let d = h.estimate([0, 0, 0], [3, 4, 0]);
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn zero_heuristic_is_always_zero() {
        let h = ZeroHeuristic;
        assert_eq!(h.estimate([0, 0, 0], [100, 100, 100]), 0.0);
    }
}
