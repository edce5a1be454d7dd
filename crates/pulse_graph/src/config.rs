// SPDX-License-Identifier: MIT OR Apache-2.0
//! Session settings, stored as RON.

use crate::evaluation::FaultPolicy;
use crate::history::MAX_HISTORY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Errors reading or writing settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed RON
    #[error("Parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
}

fn default_version() -> u32 {
    CONFIG_FORMAT_VERSION
}

fn default_history_capacity() -> usize {
    MAX_HISTORY
}

/// Runtime settings for a [`Session`](crate::Session).
///
/// Every field has a default, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Settings format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Undo stack depth
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// What a frame does when a behavior faults
    #[serde(default)]
    pub fault_policy: FaultPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            history_capacity: MAX_HISTORY,
            fault_policy: FaultPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Parse settings from RON text
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = ron::from_str(content)?;

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }

        Ok(config)
    }

    /// Render settings as pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let config = SessionConfig::default();
        assert_eq!(config.version, CONFIG_FORMAT_VERSION);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.fault_policy, FaultPolicy::Skip);
    }

    #[test]
    fn test_serialization() {
        let config = SessionConfig {
            history_capacity: 12,
            fault_policy: FaultPolicy::Halt,
            ..SessionConfig::default()
        };
        let text = config.to_ron().unwrap();
        assert_eq!(SessionConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = SessionConfig::from_ron("(fault_policy: Halt)").unwrap();
        assert_eq!(config.history_capacity, MAX_HISTORY);
        assert_eq!(config.fault_policy, FaultPolicy::Halt);
    }

    #[test]
    fn test_rejects_newer_version() {
        let err = SessionConfig::from_ron("(version: 99)").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedVersion { found: 99, .. }
        ));
        assert!(matches!(
            SessionConfig::from_ron("(history_capacity: \"lots\")"),
            Err(ConfigError::Ron(_))
        ));
    }
}
