use std::time::Duration;

use tracing::{debug, info_span};

use crate::config::EngineConfig;
use crate::coord::{neighbor_offsets, physical_distance, to_physical, Coord, PhysicalPath};
use crate::cost::CostOracle;
use crate::error::{TracerError, TracerResult};
use crate::heuristic::HeuristicOracle;
use crate::node::NodeState;
use crate::queue::OpenSet;
use crate::volume::VolumeAccessor;
use crate::voxel_map::SparseVoxelMap;

use super::progress::{CancelToken, ProgressTracker, SearchEvent};

/// What the engine is searching for: a defined goal (tracer mode) or a cost
/// budget with no goal (fill mode).
enum Termination {
    Goal(Coord),
    Fill(f64),
}

/// Single-source A* over a sparse voxel map. Specializes into the
/// point-to-point tracer and the flood fill.
pub struct UnidirectionalEngine<'a, V: VolumeAccessor, C: CostOracle, H: HeuristicOracle> {
    volume: &'a V,
    cost: C,
    heuristic: H,
    config: EngineConfig,
    map: SparseVoxelMap,
    open: OpenSet,
}

impl<'a, V: VolumeAccessor, C: CostOracle, H: HeuristicOracle> UnidirectionalEngine<'a, V, C, H> {
    pub fn new(volume: &'a V, cost: C, heuristic: H, config: EngineConfig) -> Self {
        let bounds = volume.bounds();
        let width = bounds.max[0] - bounds.min[0] + 1;
        let height = bounds.max[1] - bounds.min[1] + 1;
        let map = SparseVoxelMap::new(config.backend, width, height, bounds.min[2], bounds.max[2]);
        Self { volume, cost, heuristic, config, map, open: OpenSet::new() }
    }

    /// Rebuilds an engine around a map and open frontier recovered from a
    /// persisted fill (`from_fill`), ready to resume expansion exactly where
    /// the original run left off.
    pub fn resume_from_fill(volume: &'a V, cost: C, heuristic: H, config: EngineConfig, map: SparseVoxelMap, open_indices: &[u32]) -> Self {
        let mut open = OpenSet::new();
        for &idx in open_indices {
            let n = map.node(idx);
            open.insert(idx, n.f_start, (n.x, n.y, n.z));
        }
        Self { volume, cost, heuristic, config, map, open }
    }

    pub fn voxel_map(&self) -> &SparseVoxelMap {
        &self.map
    }

    /// Coordinate and g-score of the node the engine would expand next,
    /// without removing it from the open set.
    pub fn peek_open(&self) -> Option<(Coord, f64)> {
        self.open.peek_min().map(|(idx, g)| (self.map.node(idx).coord(), g))
    }

    /// Scales a voxel path returned by `find_path` into real-valued units,
    /// tagged with the configured units string.
    pub fn physical_path(&self, path: &[Coord]) -> PhysicalPath {
        let spacing = self.config.spacing();
        PhysicalPath { points: path.iter().map(|&c| to_physical(c, spacing)).collect(), units: self.config.units.clone() }
    }

    fn validate_endpoint(&self, c: Coord) -> TracerResult<()> {
        if !self.volume.bounds().contains(c) {
            return Err(TracerError::InvalidEndpoint { x: c[0], y: c[1], z: c[2], reason: "outside volume bounds" });
        }
        Ok(())
    }

    fn seed_start(&mut self, start: Coord) {
        let idx = self.map.get_or_insert(start[0], start[1], start[2]);
        let node = self.map.node_mut(idx);
        node.g_start = 0.0;
        node.f_start = 0.0;
        node.state = NodeState::OpenFromStart;
        self.open.insert(idx, 0.0, (start[0], start[1], start[2]));
    }

    fn reconstruct(&self, mut idx: u32) -> Vec<Coord> {
        let mut coords = vec![self.map.node(idx).coord()];
        while let Some(pred) = self.map.node(idx).pred_start {
            coords.push(self.map.node(pred).coord());
            idx = pred;
        }
        coords.reverse();
        coords
    }

    fn expand(&mut self, idx: u32, goal: Option<Coord>) {
        let bounds = self.volume.bounds();
        let spacing = self.config.spacing();
        let min_step = self.cost.min_step_cost();
        let cur = self.map.node(idx).coord();
        let g_cur = self.map.node(idx).g_start;

        for offset in neighbor_offsets() {
            let nc = [cur[0] + offset[0], cur[1] + offset[1], cur[2] + offset[2]];
            if !bounds.contains(nc) {
                continue;
            }
            let step_cost = self.cost.cost_at(nc[0], nc[1], nc[2]).max(min_step);
            let dist = physical_distance(cur, nc, spacing);
            let tentative_g = g_cur + dist * step_cost;

            let nidx = self.map.get_or_insert(nc[0], nc[1], nc[2]);
            let better = tentative_g < self.map.node(nidx).g_start;
            if !better {
                continue;
            }

            let h = goal.map(|g| self.heuristic.estimate(nc, g) * min_step).unwrap_or(0.0);
            let f = tentative_g + h;

            {
                let n = self.map.node_mut(nidx);
                n.g_start = tentative_g;
                n.f_start = f;
                n.pred_start = Some(idx);
                n.state = NodeState::OpenFromStart;
            }
            // Re-opens a previously closed node if a cheaper path turns up
            // later; mandated unconditionally for safety against a heuristic
            // that isn't strictly consistent.
            self.open.decrease_key(nidx, f, (nc[0], nc[1], nc[2]));
        }
    }

    fn run(&mut self, start: Coord, termination: Termination, cancel: CancelToken, on_event: Option<Box<dyn FnMut(SearchEvent) + '_>>) -> TracerResult<Option<u32>> {
        self.validate_endpoint(start)?;
        if let Termination::Goal(goal) = termination {
            self.validate_endpoint(goal)?;
            if start == goal {
                let idx = self.map.get_or_insert(start[0], start[1], start[2]);
                self.map.node_mut(idx).g_start = 0.0;
                return Ok(Some(idx));
            }
        }

        self.seed_start(start);
        let mut closed_count = 0usize;
        let mut tracker = ProgressTracker::new(
            Duration::from_millis(self.config.timeout_ms),
            cancel,
            self.config.cancel_check_interval,
            Duration::from_millis(self.config.progress_interval_ms),
            on_event,
        );

        let goal = match termination {
            Termination::Goal(g) => Some(g),
            Termination::Fill(_) => None,
        };

        let result = loop {
            let Some((idx, g)) = self.open.peek_min() else { break Ok(None) };

            if let Termination::Fill(threshold) = termination {
                if g >= threshold {
                    break Ok(None);
                }
            }

            self.open.delete_min();
            if self.map.node(idx).state == NodeState::ClosedFromStart {
                continue; // stale entry from a superseded decrease_key
            }
            self.map.node_mut(idx).state = NodeState::ClosedFromStart;
            closed_count += 1;

            if let Termination::Goal(g) = termination {
                if self.map.node(idx).coord() == g {
                    break Ok(Some(idx));
                }
            }

            self.expand(idx, goal);
            if let Err(e) = tracker.tick(self.open.len(), closed_count) {
                break Err(e);
            }
        };

        tracker.finish(result.is_ok());
        result
    }

    /// Tracer mode: returns an ordered voxel path from `start` to `goal`, or
    /// `Ok(None)` if the search exhausted the fringe without reaching it.
    /// "No path" is a successful outcome, not an error; only a cancellation,
    /// timeout, or invalid endpoint produces an `Err`.
    pub fn find_path(&mut self, start: Coord, goal: Coord, cancel: CancelToken, on_event: Option<Box<dyn FnMut(SearchEvent) + '_>>) -> TracerResult<Option<Vec<Coord>>> {
        let span = info_span!("unidirectional_find_path", start = ?start, goal = ?goal);
        let _enter = span.enter();
        match self.run(start, Termination::Goal(goal), cancel, on_event)? {
            Some(idx) => {
                let path = self.reconstruct(idx);
                debug!(len = path.len(), "path found");
                Ok(Some(path))
            }
            None => {
                debug!("no path found");
                Ok(None)
            }
        }
    }

    /// Fill mode: expands every voxel reachable within `threshold` cost.
    /// Leaves the resulting frontier in `voxel_map()` for `to_fill`.
    pub fn fill(&mut self, start: Coord, threshold: f64, cancel: CancelToken, on_event: Option<Box<dyn FnMut(SearchEvent) + '_>>) -> TracerResult<()> {
        let span = info_span!("unidirectional_fill", start = ?start, threshold);
        let _enter = span.enter();
        self.run(start, Termination::Fill(threshold), cancel, on_event)?;
        Ok(())
    }
}
