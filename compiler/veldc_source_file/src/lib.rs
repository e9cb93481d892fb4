//! Contains the code related to the source code input.

use std::{
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

use getset::Getters;
use thiserror::Error;
use veldc_stable_hash::StableHasher;

/// Represents an error that occurs when loading a source file.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read or canonicalize the file.
    #[error("failed to load `{path}`: {source}")]
    Io {
        /// The path that failed to load.
        path: PathBuf,

        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// A region of a source file, in byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    /// The byte offset where the region starts.
    pub start: usize,

    /// The byte offset one past where the region ends.
    pub end: usize,
}

impl Span {
    /// Creates a new span from a start and end byte offset.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self { Self { start, end } }

    /// Returns the span as a `Range<usize>` for slicing.
    #[must_use]
    pub const fn range(self) -> Range<usize> { self.start..self.end }
}

/// One source file handed to the compiler: its canonical path and its full
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct SourceFile {
    /// The canonical path of the file.
    #[get = "pub"]
    path: PathBuf,

    /// The full content of the file.
    #[get = "pub"]
    content: String,
}

impl SourceFile {
    /// Creates a source file from an already-loaded content string.
    #[must_use]
    pub const fn new(path: PathBuf, content: String) -> Self {
        Self { path, content }
    }

    /// Loads the file at the given path, canonicalizing the path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the path cannot be canonicalized or read.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let canonical = path
            .canonicalize()
            .map_err(|source| Error::Io { path: path.to_owned(), source })?;

        let content = fs::read_to_string(&canonical)
            .map_err(|source| Error::Io { path: canonical.clone(), source })?;

        Ok(Self { path: canonical, content })
    }

    /// Computes the stable fingerprint of the raw file content.
    ///
    /// This is the "did the file change at all" hash the driver compares
    /// against the prior build; it is distinct from the interface hash,
    /// which only covers the externally visible surface.
    #[must_use]
    pub fn content_fingerprint(&self) -> u64 {
        let mut hasher = StableHasher::new();
        hasher.write(self.content.as_bytes());
        hasher.finalize()
    }

    /// Returns the line (0-based) containing the given byte offset.
    #[must_use]
    pub fn line_of(&self, byte: usize) -> usize {
        self.content[..byte.min(self.content.len())]
            .bytes()
            .filter(|&b| b == b'\n')
            .count()
    }
}
