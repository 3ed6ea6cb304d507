mod slice;

use std::collections::BTreeMap;

use crate::config::SliceBackend;
use crate::node::SearchNode;

use slice::Slice;

/// Sparse `(x, y, z) -> SearchNode` map. Dense along z (one `Slice` per
/// touched plane, most absent); sparse inside each slice. Node storage lives
/// in a single backing arena owned by the map, using a lazy-per-key-cache
/// idiom; slices only ever hold `u32` arena indices, which is what lets
/// predecessor links and heap keys be plain integers instead of pointers.
pub struct SparseVoxelMap {
    backend: SliceBackend,
    width: i32,
    height: i32,
    z_min: i32,
    slices: Vec<Option<Slice>>,
    arena: Vec<SearchNode>,
}

impl SparseVoxelMap {
    pub fn new(backend: SliceBackend, width: i32, height: i32, z_min: i32, z_max: i32) -> Self {
        let depth = (z_max - z_min + 1).max(0) as usize;
        Self {
            backend,
            width,
            height,
            z_min,
            slices: (0..depth).map(|_| None).collect(),
            arena: Vec::new(),
        }
    }

    fn slice_index(&self, z: i32) -> usize {
        (z - self.z_min) as usize
    }

    pub fn get_index(&self, x: i32, y: i32, z: i32) -> Option<u32> {
        let zi = self.slice_index(z);
        self.slices.get(zi)?.as_ref()?.get(x, y, self.width)
    }

    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<&SearchNode> {
        self.get_index(x, y, z).map(|idx| &self.arena[idx as usize])
    }

    pub fn get_mut(&mut self, x: i32, y: i32, z: i32) -> Option<&mut SearchNode> {
        let idx = self.get_index(x, y, z)?;
        Some(&mut self.arena[idx as usize])
    }

    pub fn node(&self, idx: u32) -> &SearchNode {
        &self.arena[idx as usize]
    }

    pub fn node_mut(&mut self, idx: u32) -> &mut SearchNode {
        &mut self.arena[idx as usize]
    }

    /// Returns the arena index for (x, y, z), creating the node (and its
    /// slice, on first touch) if it did not already exist.
    pub fn get_or_insert(&mut self, x: i32, y: i32, z: i32) -> u32 {
        if let Some(idx) = self.get_index(x, y, z) {
            return idx;
        }
        let idx = self.arena.len() as u32;
        self.arena.push(SearchNode::new(x, y, z));
        let zi = self.slice_index(z);
        let slice = self.slices[zi].get_or_insert_with(|| Slice::new(self.backend, self.width, self.height));
        slice.put(x, y, idx, self.width);
        idx
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Iterates all stored nodes in slice-major, then deterministic row-major
    /// order within a slice.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &SearchNode> {
        self.slices.iter().flatten().flat_map(move |s| {
            s.ordered_indices(self.width, self.height)
                .into_iter()
                .map(move |idx| &self.arena[idx as usize])
        })
    }
}

/// Ordering helper shared by the sorted-slice backend and fill serialization:
/// packs (x, y) into one key so a `BTreeMap` iterates row-major.
pub(crate) fn pack_xy(x: i32, y: i32, width: i32) -> i64 {
    y as i64 * width as i64 + x as i64
}

pub(crate) type SortedIndex = BTreeMap<i64, u32>;
