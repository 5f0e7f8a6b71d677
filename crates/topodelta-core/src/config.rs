//! Tracking configuration loaded from `topodelta.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compare::TransientFields;
use crate::policy::{MAX_PENDING_CHANGES, MAX_TIME_BETWEEN_FULL_SAVES, SavePolicy};

/// Default config file name.
pub const CONFIG_FILE: &str = "topodelta.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("max_pending_changes must be at least 1")]
    ZeroPendingLimit,
}

/// Tunables for one tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub max_pending_changes: usize,
    pub max_secs_between_full_saves: u64,
    pub transient_fields: TransientFields,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig {
            max_pending_changes: MAX_PENDING_CHANGES,
            max_secs_between_full_saves: MAX_TIME_BETWEEN_FULL_SAVES.as_secs(),
            transient_fields: TransientFields::default(),
        }
    }
}

impl TrackingConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: TrackingConfig = toml::from_str(text)?;
        if config.max_pending_changes == 0 {
            return Err(ConfigError::ZeroPendingLimit);
        }
        Ok(config)
    }

    pub fn policy(&self) -> SavePolicy {
        SavePolicy::new(
            self.max_pending_changes,
            Duration::from_secs(self.max_secs_between_full_saves),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = TrackingConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, TrackingConfig::default());
        assert_eq!(config.policy(), SavePolicy::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
max_pending_changes = 10

[transient_fields]
version = 2
keys = ["isHovered", "isSelected"]
"#,
        )
        .unwrap();

        let config = TrackingConfig::load(&path).unwrap();
        assert_eq!(config.max_pending_changes, 10);
        assert_eq!(config.max_secs_between_full_saves, 30);
        assert_eq!(config.transient_fields.version, 2);
        assert!(config.transient_fields.contains("isSelected"));
        assert!(!config.transient_fields.contains("isHighlighted"));
    }

    #[test]
    fn test_rejects_zero_limit() {
        let err = TrackingConfig::from_toml_str("max_pending_changes = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroPendingLimit));
    }

    #[test]
    fn test_rejects_malformed() {
        let err = TrackingConfig::from_toml_str("max_pending_changes = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
