use serde::{Deserialize, Serialize};

/// How freed slots are treated when allocating new records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Reuse released slots before growing a segment. Reused slots get a
    /// new generation, so old handles stay invalid.
    #[default]
    ReuseSpace,
    /// Always append. Released slots are only reclaimed by `compact()`.
    FavorSpeed,
}

/// Configuration for an [`InMemoryPile`](crate::InMemoryPile).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PileConfig {
    /// Slot allocation strategy.
    pub allocation_mode: AllocationMode,
    /// Maximum bytes of payload held by one segment (default: 256 MiB).
    pub segment_size: u64,
    /// Upper bound on total payload bytes across all segments.
    pub max_memory: Option<u64>,
}

impl Default for PileConfig {
    fn default() -> Self {
        Self {
            allocation_mode: AllocationMode::default(),
            segment_size: 256 * 1024 * 1024, // 256 MiB
            max_memory: None,
        }
    }
}

impl PileConfig {
    /// Default configuration with the given segment size.
    pub fn with_segment_size(segment_size: u64) -> Self {
        Self {
            segment_size,
            ..Default::default()
        }
    }
}
