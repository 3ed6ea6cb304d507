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

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Start,
    Goal,
}

/// Two-fringe A* implementing Pijls & Post's "Yet Another Bidirectional
/// Algorithm" rejection test.
pub struct BidirectionalEngine<'a, V: VolumeAccessor, C: CostOracle, H: HeuristicOracle> {
    volume: &'a V,
    cost: C,
    heuristic: H,
    config: EngineConfig,
    map: SparseVoxelMap,
    open_start: OpenSet,
    open_goal: OpenSet,
}

impl<'a, V: VolumeAccessor, C: CostOracle, H: HeuristicOracle> BidirectionalEngine<'a, V, C, H> {
    pub fn new(volume: &'a V, cost: C, heuristic: H, config: EngineConfig) -> Self {
        let bounds = volume.bounds();
        let width = bounds.max[0] - bounds.min[0] + 1;
        let height = bounds.max[1] - bounds.min[1] + 1;
        let map = SparseVoxelMap::new(config.backend, width, height, bounds.min[2], bounds.max[2]);
        Self { volume, cost, heuristic, config, map, open_start: OpenSet::new(), open_goal: OpenSet::new() }
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

    fn seed(&mut self, coord: Coord, side: Side) -> u32 {
        let idx = self.map.get_or_insert(coord[0], coord[1], coord[2]);
        let n = self.map.node_mut(idx);
        match side {
            Side::Start => {
                n.g_start = 0.0;
                n.f_start = 0.0;
                n.state = NodeState::OpenFromStart;
                self.open_start.insert(idx, 0.0, (coord[0], coord[1], coord[2]));
            }
            Side::Goal => {
                n.g_goal = 0.0;
                n.f_goal = 0.0;
                n.state = NodeState::OpenFromGoal;
                self.open_goal.insert(idx, 0.0, (coord[0], coord[1], coord[2]));
            }
        }
        idx
    }

    fn expand(&mut self, idx: u32, side: Side, other_root: Coord, best_path_length: &mut f64, touch_node: &mut Option<u32>) {
        let bounds = self.volume.bounds();
        let spacing = self.config.spacing();
        let min_step = self.cost.min_step_cost();
        let cur = self.map.node(idx).coord();
        let g_cur = match side {
            Side::Start => self.map.node(idx).g_start,
            Side::Goal => self.map.node(idx).g_goal,
        };

        for offset in neighbor_offsets() {
            let nc = [cur[0] + offset[0], cur[1] + offset[1], cur[2] + offset[2]];
            if !bounds.contains(nc) {
                continue;
            }
            let step_cost = self.cost.cost_at(nc[0], nc[1], nc[2]).max(min_step);
            let dist = physical_distance(cur, nc, spacing);
            let tentative_g = g_cur + dist * step_cost;

            let nidx = self.map.get_or_insert(nc[0], nc[1], nc[2]);
            let current_g = match side {
                Side::Start => self.map.node(nidx).g_start,
                Side::Goal => self.map.node(nidx).g_goal,
            };
            if tentative_g >= current_g {
                continue;
            }

            let h = self.heuristic.estimate(nc, other_root) * min_step;
            let f = tentative_g + h;

            {
                let n = self.map.node_mut(nidx);
                match side {
                    Side::Start => {
                        n.g_start = tentative_g;
                        n.f_start = f;
                        n.pred_start = Some(idx);
                        n.state = NodeState::OpenFromStart;
                    }
                    Side::Goal => {
                        n.g_goal = tentative_g;
                        n.f_goal = f;
                        n.pred_goal = Some(idx);
                        n.state = NodeState::OpenFromGoal;
                    }
                }
            }
            match side {
                Side::Start => self.open_start.decrease_key(nidx, f, (nc[0], nc[1], nc[2])),
                Side::Goal => self.open_goal.decrease_key(nidx, f, (nc[0], nc[1], nc[2])),
            }

            let other_g = match side {
                Side::Start => self.map.node(nidx).g_goal,
                Side::Goal => self.map.node(nidx).g_start,
            };
            if other_g.is_finite() {
                let candidate = tentative_g + other_g;
                if candidate < *best_path_length {
                    *best_path_length = candidate;
                    *touch_node = Some(nidx);
                }
            }
        }
    }

    fn reconstruct(&self, touch: u32) -> Vec<Coord> {
        let mut back = vec![self.map.node(touch).coord()];
        let mut idx = touch;
        while let Some(pred) = self.map.node(idx).pred_start {
            back.push(self.map.node(pred).coord());
            idx = pred;
        }
        back.reverse();

        let mut idx = touch;
        while let Some(pred) = self.map.node(idx).pred_goal {
            back.push(self.map.node(pred).coord());
            idx = pred;
        }
        back
    }

    /// Returns an ordered voxel path from `start` to `goal`, or `Ok(None)` if
    /// the search exhausted both fringes without the two meeting. "No path"
    /// is a successful outcome, not an error; only a cancellation, timeout,
    /// or invalid endpoint produces an `Err`.
    pub fn find_path(&mut self, start: Coord, goal: Coord, cancel: CancelToken, on_event: Option<Box<dyn FnMut(SearchEvent) + '_>>) -> TracerResult<Option<Vec<Coord>>> {
        let span = info_span!("bidirectional_find_path", start = ?start, goal = ?goal);
        let _enter = span.enter();

        self.validate_endpoint(start)?;
        self.validate_endpoint(goal)?;
        if start == goal {
            return Ok(Some(vec![start]));
        }

        self.seed(start, Side::Start);
        self.seed(goal, Side::Goal);

        let mut best_path_length = f64::INFINITY;
        let mut touch_node: Option<u32> = None;
        let min_step = self.cost.min_step_cost();

        let mut f_s = 0.0f64;
        let mut f_t = 0.0f64;
        let mut closed_count = 0usize;

        let mut tracker = ProgressTracker::new(
            Duration::from_millis(self.config.timeout_ms),
            cancel,
            self.config.cancel_check_interval,
            Duration::from_millis(self.config.progress_interval_ms),
            on_event,
        );

        let interrupted = loop {
            if self.open_start.is_empty() || self.open_goal.is_empty() {
                break None;
            }

            // Pick the smaller fringe; ties favor start.
            let start_is_smaller = self.open_start.len() <= self.open_goal.len();
            let (side, other_root) = if start_is_smaller { (Side::Start, goal) } else { (Side::Goal, start) };

            let (idx, f) = if start_is_smaller { self.open_start.delete_min().unwrap() } else { self.open_goal.delete_min().unwrap() };
            match side {
                Side::Start => f_s = f,
                Side::Goal => f_t = f,
            }

            let g_p = match side {
                Side::Start => self.map.node(idx).g_start,
                Side::Goal => self.map.node(idx).g_goal,
            };
            let h_to_other_root = self.heuristic.estimate(self.map.node(idx).coord(), other_root) * min_step;
            let h_to_own_root = match side {
                Side::Start => self.heuristic.estimate(self.map.node(idx).coord(), start) * min_step,
                Side::Goal => self.heuristic.estimate(self.map.node(idx).coord(), goal) * min_step,
            };
            let other_f = match side {
                Side::Start => f_t,
                Side::Goal => f_s,
            };

            let reject = g_p + h_to_other_root >= best_path_length || g_p + other_f - h_to_own_root >= best_path_length;

            if reject {
                self.map.node_mut(idx).state = NodeState::Rejected;
            } else {
                self.map.node_mut(idx).state = match side {
                    Side::Start => NodeState::ClosedFromStart,
                    Side::Goal => NodeState::ClosedFromGoal,
                };
                closed_count += 1;
                self.expand(idx, side, other_root, &mut best_path_length, &mut touch_node);
            }

            if let Err(e) = tracker.tick(self.open_start.len() + self.open_goal.len(), closed_count) {
                break Some(e);
            }
        };

        if let Some(e) = interrupted {
            tracker.finish(false);
            return Err(e);
        }

        let result = match touch_node {
            Some(touch) => {
                let path = self.reconstruct(touch);
                debug!(len = path.len(), cost = best_path_length, "bidirectional path found");
                Some(path)
            }
            None => {
                debug!("no path found");
                None
            }
        };
        tracker.finish(true);
        Ok(result)
    }
}
