use std::path::Path;

use pile_store::PileConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// How aggressively the application trades speed for memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryModel {
    /// Large segments, slot reuse.
    #[default]
    Regular,
    /// Medium segments, slot reuse.
    Compact,
    /// Small segments for constrained hosts.
    Tiny,
}

impl MemoryModel {
    /// The pile configuration this model implies when none is given.
    pub fn pile_config(&self) -> PileConfig {
        let segment_size = match self {
            Self::Regular => 256 * 1024 * 1024,
            Self::Compact => 64 * 1024 * 1024,
            Self::Tiny => 16 * 1024 * 1024,
        };
        PileConfig::with_segment_size(segment_size)
    }
}

impl std::fmt::Display for MemoryModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regular => write!(f, "regular"),
            Self::Compact => write!(f, "compact"),
            Self::Tiny => write!(f, "tiny"),
        }
    }
}

/// Application configuration, usually loaded from a TOML file.
///
/// ```toml
/// name = "inventory"
/// memory_model = "compact"
///
/// [pile]
/// allocation_mode = "favor_speed"
/// ```
///
/// Missing keys take their defaults. Without a `[pile]` table the pile
/// configuration follows the memory model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name, used in logs.
    pub name: String,
    /// Memory utilization model.
    pub memory_model: MemoryModel,
    /// Explicit pile configuration overriding the memory model's.
    pub pile: Option<PileConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "pile".into(),
            memory_model: MemoryModel::default(),
            pile: None,
        }
    }
}

impl AppConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> AppResult<Self> {
        toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render this configuration as TOML.
    pub fn to_toml_string(&self) -> AppResult<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }

    /// The effective pile configuration.
    pub fn pile_config(&self) -> PileConfig {
        self.pile
            .clone()
            .unwrap_or_else(|| self.memory_model.pile_config())
    }
}
