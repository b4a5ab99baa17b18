// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Logical names for a segment.
//!
//! Unix segments are keyed by `ftok(path, project_id)`; Windows segments by a
//! kernel object name in the session-local namespace. Only the variant for the
//! build target is compiled. Construction is pure normalization, no I/O.

use std::fmt;
#[cfg(unix)]
use std::path::{Path, PathBuf};

/// Namespace prefix applied to every Windows object name.
#[cfg(windows)]
pub const NAMESPACE_PREFIX: &str = "Local\\";

/// The key a creator and its attacher agree on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    #[cfg(unix)]
    path: PathBuf,
    #[cfg(unix)]
    project_id: i32,
    #[cfg(windows)]
    name: String,
}

#[cfg(unix)]
impl Identifier {
    /// Identify a segment by an existing filesystem path and a salt.
    ///
    /// Only the low 8 bits of `project_id` take part in key derivation.
    pub fn new(path: impl Into<PathBuf>, project_id: i32) -> Self {
        Self {
            path: path.into(),
            project_id,
        }
    }

    /// Path fed to `ftok`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Salt fed to `ftok`.
    pub fn project_id(&self) -> i32 {
        self.project_id
    }
}

#[cfg(windows)]
impl Identifier {
    /// Identify a segment by name. The name is placed in the `Local\` namespace.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: format!("{}{}", NAMESPACE_PREFIX, name.as_ref()),
        }
    }

    /// Fully namespaced object name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Identifier {
    #[cfg(unix)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.project_id)
    }

    #[cfg(windows)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
