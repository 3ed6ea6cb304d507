use std::collections::HashMap;

use crate::config::SliceBackend;

use super::{pack_xy, SortedIndex};

/// One z-plane's worth of sparse (x, y) -> arena-index storage, in whichever
/// representation the map is configured with.
pub(super) enum Slice {
    Array(Vec<Option<u32>>),
    Hash(HashMap<i64, u32>),
    Sorted(SortedIndex),
}

impl Slice {
    pub(super) fn new(backend: SliceBackend, width: i32, height: i32) -> Self {
        match backend {
            SliceBackend::Array => Slice::Array(vec![None; (width * height).max(0) as usize]),
            SliceBackend::Hash => Slice::Hash(HashMap::new()),
            SliceBackend::Sorted => Slice::Sorted(SortedIndex::new()),
        }
    }

    pub(super) fn get(&self, x: i32, y: i32, width: i32) -> Option<u32> {
        match self {
            Slice::Array(arr) => arr.get(pack_xy(x, y, width) as usize).copied().flatten(),
            Slice::Hash(map) => map.get(&pack_xy(x, y, width)).copied(),
            Slice::Sorted(map) => map.get(&pack_xy(x, y, width)).copied(),
        }
    }

    pub(super) fn put(&mut self, x: i32, y: i32, idx: u32, width: i32) {
        let key = pack_xy(x, y, width);
        match self {
            Slice::Array(arr) => arr[key as usize] = Some(idx),
            Slice::Hash(map) => {
                map.insert(key, idx);
            }
            Slice::Sorted(map) => {
                map.insert(key, idx);
            }
        }
    }

    /// Arena indices in row-major (y, then x) order, regardless of backend.
    pub(super) fn ordered_indices(&self, width: i32, _height: i32) -> Vec<u32> {
        debug_assert!(width >= 0);
        match self {
            Slice::Array(arr) => arr.iter().filter_map(|v| *v).collect(),
            Slice::Hash(map) => {
                let mut entries: Vec<(&i64, &u32)> = map.iter().collect();
                entries.sort_unstable_by_key(|(k, _)| **k);
                entries.into_iter().map(|(_, v)| *v).collect()
            }
            Slice::Sorted(map) => map.values().copied().collect(),
        }
    }
}
