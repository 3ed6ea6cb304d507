use serde::{Deserialize, Serialize};

pub const DEFAULT_CANCEL_CHECK_INTERVAL: u64 = 10_000;

/// Backend chosen for each z-slice of the sparse voxel map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceBackend {
    /// Dense W*H array; use when expected touched density is high.
    Array,
    /// Open-addressed hash map keyed by packed (x, y); typical case.
    Hash,
    /// Sorted map keyed by packed (x, y); needed for ordered fill output.
    Sorted,
}

impl Default for SliceBackend {
    fn default() -> Self {
        SliceBackend::Hash
    }
}

/// Construction-time knobs for a search engine: defaulted, cloneable,
/// round-trips through JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub spacing_x: f64,
    pub spacing_y: f64,
    pub spacing_z: f64,
    pub units: String,

    pub backend: SliceBackend,

    /// Wall-clock budget in milliseconds; 0 disables the timeout.
    pub timeout_ms: u64,
    /// How many loop iterations elapse between cancellation checks.
    pub cancel_check_interval: u64,
    /// How many milliseconds elapse between progress callbacks; 0 disables them.
    pub progress_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spacing_x: 1.0,
            spacing_y: 1.0,
            spacing_z: 1.0,
            units: "voxel".to_string(),
            backend: SliceBackend::default(),
            timeout_ms: 0,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
            progress_interval_ms: 0,
        }
    }
}

impl EngineConfig {
    pub fn spacing(&self) -> (f64, f64, f64) {
        (self.spacing_x, self.spacing_y, self.spacing_z)
    }
}
