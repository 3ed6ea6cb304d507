use serde::{Deserialize, Serialize};

/// Integer voxel coordinate.
pub type Coord = [i32; 3];

/// A voxel path converted to real-valued units, carrying the units tag it
/// was produced under.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalPath {
    pub points: Vec<(f64, f64, f64)>,
    pub units: String,
}

/// Scales a voxel coordinate by per-axis spacing into real-valued units.
pub fn to_physical(c: Coord, spacing: (f64, f64, f64)) -> (f64, f64, f64) {
    (c[0] as f64 * spacing.0, c[1] as f64 * spacing.1, c[2] as f64 * spacing.2)
}

/// Inclusive axis-aligned bounding box over voxel space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Coord,
    pub max: Coord,
}

impl Bounds {
    pub fn new(min: Coord, max: Coord) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, c: Coord) -> bool {
        (0..3).all(|i| c[i] >= self.min[i] && c[i] <= self.max[i])
    }
}

/// Physical distance between two voxels given per-axis spacing, in real units.
pub fn physical_distance(a: Coord, b: Coord, spacing: (f64, f64, f64)) -> f64 {
    let dx = (a[0] - b[0]) as f64 * spacing.0;
    let dy = (a[1] - b[1]) as f64 * spacing.1;
    let dz = (a[2] - b[2]) as f64 * spacing.2;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// The 26-connected neighborhood offsets, excluding the zero offset.
pub fn neighbor_offsets() -> impl Iterator<Item = Coord> {
    (-1..=1).flat_map(move |dx| {
        (-1..=1).flat_map(move |dy| {
            (-1..=1).filter_map(move |dz| {
                if dx == 0 && dy == 0 && dz == 0 {
                    None
                } else {
                    Some([dx, dy, dz])
                }
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_contains_is_inclusive() {
        let b = Bounds::new([0, 0, 0], [9, 9, 9]);
        assert!(b.contains([0, 0, 0]));
        assert!(b.contains([9, 9, 9]));
        assert!(!b.contains([10, 0, 0]));
        assert!(!b.contains([-1, 0, 0]));
    }

    #[test]
    fn physical_distance_respects_spacing() {
        let d = physical_distance([0, 0, 0], [1, 0, 0], (2.0, 1.0, 1.0));
        assert!((d - 2.0).abs() < 1e-12);
    }

    #[test]
    fn neighbor_offsets_has_26_entries() {
        let offsets: Vec<_> = neighbor_offsets().collect();
        assert_eq!(offsets.len(), 26);
        assert!(!offsets.contains(&[0, 0, 0]));
    }

    #[test]
    fn to_physical_scales_each_axis_independently() {
        let p = to_physical([2, 3, 4], (0.5, 1.0, 2.0));
        assert_eq!(p, (1.0, 3.0, 8.0));
    }
}
