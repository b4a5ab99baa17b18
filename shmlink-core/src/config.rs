// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! The creator and the attacher must agree on the identifier and the byte
//! count out of band; both read them from the same file.
//! Any invalid field results in a ValidationError that prevents startup.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ShmLinkError, ShmLinkResult, ValidationError};
use crate::identifier::Identifier;
use crate::shm::DEFAULT_SEGMENT_SIZE;

/// Smallest accepted segment size.
pub const MIN_SEGMENT_SIZE: usize = 1;

/// Largest accepted segment size (1 GB).
pub const MAX_SEGMENT_SIZE: usize = 1024 * 1024 * 1024;

/// Raw segment configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSegmentConfig {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default = "default_key_path")]
    key_path: String,
    #[serde(default = "default_project_id")]
    project_id: i64,
    #[serde(default = "default_size")]
    size: usize,
}

fn default_name() -> String {
    "shmlink".to_string()
}

fn default_key_path() -> String {
    "/tmp".to_string()
}

fn default_project_id() -> i64 {
    65 // 'A'
}

fn default_size() -> usize {
    DEFAULT_SEGMENT_SIZE
}

impl Default for RawSegmentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            key_path: default_key_path(),
            project_id: default_project_id(),
            size: default_size(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    segment: RawSegmentConfig,
}

/// Validated segment configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentConfig {
    /// Windows object name (namespaced when turned into an identifier).
    pub name: String,
    /// Unix `ftok` path.
    pub key_path: PathBuf,
    /// Unix `ftok` salt.
    pub project_id: i32,
    /// Caller-visible byte count.
    pub size: usize,
}

impl SegmentConfig {
    /// Identifier for the current build target.
    pub fn identifier(&self) -> Identifier {
        #[cfg(unix)]
        {
            Identifier::new(self.key_path.clone(), self.project_id)
        }
        #[cfg(windows)]
        {
            Identifier::new(&self.name)
        }
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            key_path: PathBuf::from(default_key_path()),
            project_id: default_project_id() as i32,
            size: default_size(),
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub segment: SegmentConfig,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> ShmLinkResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ShmLinkError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ShmLinkError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> ShmLinkResult<Config> {
        // An empty document means "all defaults"
        if content.trim().is_empty() {
            return Self::validate(RawConfig::default());
        }

        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| ShmLinkError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    /// Validate raw configuration and convert to validated types.
    fn validate(raw: RawConfig) -> ShmLinkResult<Config> {
        let segment = Self::validate_segment(raw.segment)?;
        Ok(Config { segment })
    }

    fn validate_segment(raw: RawSegmentConfig) -> ShmLinkResult<SegmentConfig> {
        if raw.name.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "name",
                value: raw.name,
                reason: "Segment name cannot be empty".to_string(),
            }
            .into());
        }

        // The namespace prefix is added internally
        if raw.name.contains('\\') || raw.name.contains('\0') {
            return Err(ValidationError::InvalidFieldValue {
                field: "name",
                value: raw.name,
                reason: "Segment name must not contain backslashes or NUL".to_string(),
            }
            .into());
        }

        if raw.key_path.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "key_path",
                value: raw.key_path,
                reason: "Key path cannot be empty".to_string(),
            }
            .into());
        }

        // ftok only uses the low 8 bits, and 0 is reserved
        if !(1..=255).contains(&raw.project_id) {
            return Err(ValidationError::InvalidFieldValue {
                field: "project_id",
                value: raw.project_id.to_string(),
                reason: "Must be between 1 and 255".to_string(),
            }
            .into());
        }

        if !(MIN_SEGMENT_SIZE..=MAX_SEGMENT_SIZE).contains(&raw.size) {
            return Err(ValidationError::SizeOutOfBounds {
                size: raw.size,
                min: MIN_SEGMENT_SIZE,
                max: MAX_SEGMENT_SIZE,
            }
            .into());
        }

        Ok(SegmentConfig {
            name: raw.name,
            key_path: PathBuf::from(raw.key_path),
            project_id: raw.project_id as i32,
            size: raw.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
segment:
  name: demo-segment
  key_path: /var/tmp
  project_id: 7
  size: 256
"#;

    #[test]
    fn test_valid_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.segment.name, "demo-segment");
        assert_eq!(config.segment.key_path, PathBuf::from("/var/tmp"));
        assert_eq!(config.segment.project_id, 7);
        assert_eq!(config.segment.size, 256);
    }

    #[test]
    fn test_defaults_applied() {
        let config = ConfigLoader::load_string("segment: {}\n").unwrap();
        assert_eq!(config.segment.size, DEFAULT_SEGMENT_SIZE);
        assert_eq!(config.segment.project_id, 65);
        assert_eq!(config.segment.name, "shmlink");
    }

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config = ConfigLoader::load_string("").unwrap();
        assert_eq!(config.segment, Config::default().segment);
    }

    #[test]
    fn test_zero_size_rejected() {
        let yaml = r#"
segment:
  size: 0
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(matches!(
            err,
            ShmLinkError::Validation(ValidationError::SizeOutOfBounds { size: 0, .. })
        ));
    }

    #[test]
    fn test_project_id_out_of_range() {
        for id in ["0", "256", "-1"] {
            let yaml = format!("segment:\n  project_id: {}\n", id);
            assert!(ConfigLoader::load_string(&yaml).is_err(), "accepted {}", id);
        }
    }

    #[test]
    fn test_name_with_namespace_rejected() {
        let yaml = r#"
segment:
  name: 'Global\evil'
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
segment:
  sise: 100
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(matches!(err, ShmLinkError::ConfigParse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load_file("/definitely/not/here/shmlink.yaml").unwrap_err();
        assert!(matches!(err, ShmLinkError::ConfigNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_identifier_from_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        let id = config.segment.identifier();
        assert_eq!(id.path(), Path::new("/var/tmp"));
        assert_eq!(id.project_id(), 7);
    }

    #[cfg(windows)]
    #[test]
    fn test_identifier_from_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.segment.identifier().name(), "Local\\demo-segment");
    }
}
