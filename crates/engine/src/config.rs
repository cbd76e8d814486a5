use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::history::DEFAULT_HISTORY_DEPTH;
use crate::snap::{DEFAULT_SNAP_THRESHOLD, SnapOptions, SnapTargets};
use crate::time::{STANDARD_TIMEBASE, Timebase};

/// Engine-wide settings. Missing keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub ticks_per_second: i64,
    /// Snap tolerance in ticks of `ticks_per_second`.
    pub snap_threshold: i64,
    pub history_depth: usize,
    pub snap_targets: SnapTargets,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: STANDARD_TIMEBASE.ticks_per_second,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            history_depth: DEFAULT_HISTORY_DEPTH,
            snap_targets: SnapTargets::ALL,
        }
    }
}

impl EngineConfig {
    pub fn timebase(&self) -> Result<Timebase> {
        Timebase::new(self.ticks_per_second)
    }

    pub fn snap_options(&self) -> SnapOptions {
        SnapOptions {
            targets: self.snap_targets,
            threshold: self.snap_threshold,
            disabled: false,
            exclude_clip: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|source| EngineError::Deserialize { source })?;
        config.timebase()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            context: "failed to read engine config",
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&json).map_err(|source| EngineError::Serialization {
                path: path.to_path_buf(),
                source,
            })?;
        config.timebase()?;
        debug!(path = %path.display(), ?config, "engine config loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;
    use crate::error::EngineError;

    #[test]
    fn missing_keys_use_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "historyDepth": 5 }"#).expect("config");
        assert_eq!(config.history_depth, 5);
        assert_eq!(config.ticks_per_second, 1_000);
        assert_eq!(config.snap_threshold, 100);
        assert!(config.snap_targets.grid);
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "ticksPerSecond": 0 }"#),
            Err(EngineError::InvalidTimebase { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("timeline_engine_config_missing.json");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            EngineConfig::load(&path),
            Err(EngineError::Io { .. })
        ));
    }
}
