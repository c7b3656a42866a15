//! Configuration module for ActSeq
//!
//! The engine reads one TOML file holding the segmentation cost model, the
//! default quota ceilings, logging and pool settings, and any number of
//! preset definitions.
//!
//! # Config Location
//!
//! The command line takes `--config` (or `ACTSEQ_CONFIG`). Otherwise the platform config
//! directory is used:
//! - **Linux**: `~/.config/actseq/config.toml`
//! - **macOS**: `~/Library/Application Support/actseq/config.toml`
//! - **Windows**: `%APPDATA%\actseq\config.toml`
//!
//! # Example
//!
//! ```toml
//! [segmentation]
//! boundary_penalty = 0.5
//! weighting = "confidence"
//!
//! [quota]
//! max_transitions = 200
//!
//! [[presets]]
//! id = "assembly"
//! start_node = "idle"
//! nodes = [
//!     { id = "idle", allowed_next = ["idle", "screw"] },
//!     { id = "screw", allowed_next = ["idle"], aliases = ["screw"] },
//! ]
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{ActSeqError, Result};
use crate::preset::{PresetDefinition, PresetRegistry};
use crate::quota::QuotaLimits;
use crate::segmentation::{CostModel, Segmenter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the platform config directory
pub const APP_DIR: &str = "actseq";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

// ==================== Config Directory ====================

/// Get the platform config directory for ActSeq
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Engine Config ====================

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub segmentation: CostModel,

    /// Ceilings applied to sessions that do not specify their own
    #[serde(default)]
    pub quota: QuotaLimits,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub pool: PoolSettings,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<PresetDefinition>,
}

impl EngineConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ActSeqError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            ActSeqError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {:?} ({} preset definition(s))",
            path,
            config.presets.len()
        );
        Ok(config)
    }

    /// Load a config file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ActSeqError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ActSeqError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            ActSeqError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        self.segmentation
            .validate()
            .map_err(|e| ActSeqError::Config(format!("[segmentation] {}", e)))?;
        self.quota
            .validate()
            .map_err(|e| ActSeqError::Config(format!("[quota] {}", e)))?;
        if self.pool.workers == 0 {
            return Err(ActSeqError::Config(
                "[pool] workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn segmenter(&self) -> Segmenter {
        Segmenter::new(self.segmentation)
    }

    /// Load the configured presets, skipping invalid ones
    pub fn registry(&self) -> PresetRegistry {
        PresetRegistry::from_definitions(&self.presets)
    }
}
