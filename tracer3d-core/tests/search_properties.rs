use tracer3d_core::{
    BidirectionalEngine, CancelToken, CostOracle, DenseVolume, EngineConfig, EuclideanHeuristic,
    InvertedIntensityCost, SliceBackend, TracerError, UnidirectionalEngine, VolumeAccessor,
};

fn uniform_volume(n: usize) -> DenseVolume {
    DenseVolume::filled(n, n, n, 255.0)
}

fn config_with_backend(backend: SliceBackend) -> EngineConfig {
    EngineConfig { backend, ..EngineConfig::default() }
}

/// Dijkstra ground truth over the same uniform-cost grid, used to check
/// optimality of the bidirectional search.
fn dijkstra_cost(n: i32, start: [i32; 3], goal: [i32; 3]) -> f64 {
    use std::collections::BinaryHeap;
    #[derive(PartialEq)]
    struct Entry(f64, [i32; 3]);
    impl Eq for Entry {}
    impl PartialOrd for Entry {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for Entry {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            other.0.partial_cmp(&self.0).unwrap()
        }
    }

    let cost_per_step: f64 = 256.0 - 255.0; // matches InvertedIntensityCost floor-clamped away
    let cost_per_step = cost_per_step.max(0.01);
    let mut dist = std::collections::HashMap::new();
    let mut heap = BinaryHeap::new();
    dist.insert(start, 0.0);
    heap.push(Entry(0.0, start));
    while let Some(Entry(d, cur)) = heap.pop() {
        if cur == goal {
            return d;
        }
        if d > *dist.get(&cur).unwrap_or(&f64::INFINITY) {
            continue;
        }
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let nxt = [cur[0] + dx, cur[1] + dy, cur[2] + dz];
                    if nxt.iter().any(|v| *v < 0 || *v >= n) {
                        continue;
                    }
                    let step_len = ((dx * dx + dy * dy + dz * dz) as f64).sqrt();
                    let nd = d + step_len * cost_per_step;
                    if nd < *dist.get(&nxt).unwrap_or(&f64::INFINITY) {
                        dist.insert(nxt, nd);
                        heap.push(Entry(nd, nxt));
                    }
                }
            }
        }
    }
    f64::INFINITY
}

#[test]
fn bidirectional_matches_dijkstra_ground_truth() {
    let n = 8;
    let volume = uniform_volume(n as usize);
    let cost = InvertedIntensityCost::new(&volume, 256.0, 0.01);
    let heuristic = EuclideanHeuristic::new((1.0, 1.0, 1.0));
    let mut engine = BidirectionalEngine::new(&volume, cost, heuristic, EngineConfig::default());

    let start = [0, 0, 0];
    let goal = [n - 1, n - 1, n - 1];
    let path = engine.find_path(start, goal, CancelToken::new(), None).unwrap().unwrap();

    let found_cost: f64 = path
        .windows(2)
        .map(|w| {
            let d: f64 = (0..3).map(|i| ((w[1][i] - w[0][i]) as f64).powi(2)).sum::<f64>().sqrt();
            d * 0.01f64.max(256.0 - 255.0)
        })
        .sum();

    let ground_truth = dijkstra_cost(n, start, goal);
    assert!((found_cost - ground_truth).abs() < 1e-6, "found {found_cost} vs ground truth {ground_truth}");
}

#[test]
fn all_three_backends_agree_on_path() {
    let volume = uniform_volume(8);
    let mut paths = Vec::new();
    for backend in [SliceBackend::Array, SliceBackend::Hash, SliceBackend::Sorted] {
        let cost = InvertedIntensityCost::new(&volume, 256.0, 0.01);
        let heuristic = EuclideanHeuristic::new((1.0, 1.0, 1.0));
        let mut engine = BidirectionalEngine::new(&volume, cost, heuristic, config_with_backend(backend));
        let path = engine.find_path([0, 0, 0], [7, 7, 7], CancelToken::new(), None).unwrap().unwrap();
        paths.push(path);
    }
    assert_eq!(paths[0], paths[1]);
    assert_eq!(paths[1], paths[2]);
}

#[test]
fn fill_threshold_bounds_voxel_count_to_radius() {
    let n = 20usize;
    let volume = uniform_volume(n);
    let cost = InvertedIntensityCost::new(&volume, 256.0, 0.01);
    let heuristic = EuclideanHeuristic::new((1.0, 1.0, 1.0));
    let mut engine = UnidirectionalEngine::new(&volume, cost, heuristic, EngineConfig::default());

    let threshold = 3.0;
    engine.fill([10, 10, 10], threshold, CancelToken::new(), None).unwrap();

    let step = 0.01f64;
    let radius = threshold / step;
    for node in engine.voxel_map().iter_ordered() {
        let d = (((node.x - 10).pow(2) + (node.y - 10).pow(2) + (node.z - 10).pow(2)) as f64).sqrt();
        assert!(d <= radius + 1.8, "voxel at distance {d} exceeds expected radius {radius}");
    }
}

#[test]
fn cancellation_surfaces_interrupted_within_one_check_interval() {
    let volume = uniform_volume(60);
    let cost = InvertedIntensityCost::new(&volume, 256.0, 0.01);
    let heuristic = EuclideanHeuristic::new((1.0, 1.0, 1.0));
    let mut config = EngineConfig::default();
    config.cancel_check_interval = 1;
    let mut engine = UnidirectionalEngine::new(&volume, cost, heuristic, config);

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = engine.find_path([0, 0, 0], [59, 59, 59], cancel, None).unwrap_err();
    assert!(matches!(err, TracerError::Interrupted));
}

struct WallCost<'v> {
    volume: &'v DenseVolume,
    wall_x: i32,
}

impl<'v> CostOracle for WallCost<'v> {
    fn cost_at(&self, x: i32, y: i32, z: i32) -> f64 {
        if x == self.wall_x {
            f64::INFINITY
        } else {
            256.0 - self.volume.intensity_at(x, y, z)
        }
    }
    fn min_step_cost(&self) -> f64 {
        0.01
    }
    fn metric_tag(&self) -> &'static str {
        "256-minus-intensity-scaled"
    }
}

#[test]
fn both_engines_report_unreachable_goal_as_ok_none_within_the_timeout() {
    let volume = uniform_volume(6);
    let heuristic = EuclideanHeuristic::new((1.0, 1.0, 1.0));

    let cost = WallCost { volume: &volume, wall_x: 3 };
    let mut uni = UnidirectionalEngine::new(&volume, cost, heuristic, EngineConfig::default());
    let uni_result = uni.find_path([0, 0, 0], [5, 5, 5], CancelToken::new(), None).unwrap();
    assert!(uni_result.is_none());

    let cost = WallCost { volume: &volume, wall_x: 3 };
    let heuristic = EuclideanHeuristic::new((1.0, 1.0, 1.0));
    let mut bidi = BidirectionalEngine::new(&volume, cost, heuristic, EngineConfig::default());
    let bidi_result = bidi.find_path([0, 0, 0], [5, 5, 5], CancelToken::new(), None).unwrap();
    assert!(bidi_result.is_none());
}

#[test]
fn no_node_created_outside_declared_bounds_during_fill() {
    let volume = uniform_volume(5);
    let cost = InvertedIntensityCost::new(&volume, 256.0, 0.01);
    let heuristic = EuclideanHeuristic::new((1.0, 1.0, 1.0));
    let mut engine = UnidirectionalEngine::new(&volume, cost, heuristic, EngineConfig::default());
    engine.fill([2, 2, 2], 100.0, CancelToken::new(), None).unwrap();
    let bounds = volume.bounds();
    for node in engine.voxel_map().iter_ordered() {
        assert!(bounds.contains(node.coord()));
    }
}
