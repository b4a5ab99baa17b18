// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

use std::path::Path;

use shmlink_core::{Config, ConfigLoader, ShmLinkResult};

pub mod send;
pub mod serve;
pub mod validate;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "shmlink.yaml";

/// Load the explicit config, else the default file if present, else defaults.
pub fn load_config(explicit: Option<&str>) -> ShmLinkResult<Config> {
    match explicit {
        Some(path) => ConfigLoader::load_file(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            ConfigLoader::load_file(DEFAULT_CONFIG_PATH)
        }
        None => {
            tracing::debug!(path = DEFAULT_CONFIG_PATH, "No config file, using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        assert!(load_config(Some("/definitely/not/here/shmlink.yaml")).is_err());
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"segment:\n  size: 42\n").unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.segment.size, 42);
    }
}
