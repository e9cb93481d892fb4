//! The output file map: where each source file's compilation outputs go.
//!
//! The map is a JSON object keyed by canonical source path; the entry under
//! the empty key holds the module-level outputs, in particular the module
//! dependency artifact.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error that occurs when loading an output file map.
#[derive(Debug, Error)]
pub enum Error {
    /// The map file could not be read.
    #[error("failed to read output file map `{path}`: {source}")]
    Io {
        /// The path of the map file.
        path: PathBuf,

        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The map file is not the expected JSON shape.
    #[error("malformed output file map `{path}`: {source}")]
    Json {
        /// The path of the map file.
        path: PathBuf,

        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// The outputs of one source file (or of the module, under the empty key).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    /// The object file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<PathBuf>,

    /// The interface-module file.
    #[serde(
        default,
        rename = "interface-module",
        skip_serializing_if = "Option::is_none"
    )]
    pub interface_module: Option<PathBuf>,

    /// The dependency artifact.
    #[serde(
        default,
        rename = "dependency-artifact",
        skip_serializing_if = "Option::is_none"
    )]
    pub dependency_artifact: Option<PathBuf>,
}

/// The parsed map, with defaults derived for sources it does not mention.
#[derive(Debug, Clone, Default)]
pub struct OutputFileMap {
    entries: veldc_hash::HashMap<PathBuf, OutputEntry>,
}

impl OutputFileMap {
    /// An empty map; every path falls back to the derived defaults.
    #[must_use]
    pub fn empty() -> Self { Self::default() }

    /// Loads the map from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            Error::Io { path: path.to_owned(), source }
        })?;

        let entries = serde_json::from_str(&content).map_err(|source| {
            Error::Json { path: path.to_owned(), source }
        })?;

        Ok(Self { entries })
    }

    /// The dependency artifact path of a source file; defaults to the
    /// source path with a `vdep` extension.
    #[must_use]
    pub fn dependency_artifact(&self, source: &Path) -> PathBuf {
        self.entries
            .get(source)
            .and_then(|entry| entry.dependency_artifact.clone())
            .unwrap_or_else(|| source.with_extension("vdep"))
    }

    /// The module dependency artifact path: the dependency artifact of the
    /// empty entry, defaulting to `<module_name>.vdep` in the working
    /// directory.
    #[must_use]
    pub fn module_dependency_artifact(&self, module_name: &str) -> PathBuf {
        self.entries
            .get(Path::new(""))
            .and_then(|entry| entry.dependency_artifact.clone())
            .unwrap_or_else(|| PathBuf::from(format!("{module_name}.vdep")))
    }
}
