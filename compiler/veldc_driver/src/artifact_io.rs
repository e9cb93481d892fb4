//! Atomic, scoped artifact writes.
//!
//! An artifact file is created at a temporary path and atomically renamed
//! into place on success; any other exit path removes the temporary, so a
//! crashed or cancelled job never leaves a partial artifact behind.

use std::{
    io,
    path::{Path, PathBuf},
};

/// A scoped writer for one artifact file.
#[derive(Debug)]
pub struct ScopedArtifactWriter {
    temporary: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl ScopedArtifactWriter {
    /// Creates a writer targeting the given path.
    #[must_use]
    pub fn new(target: PathBuf) -> Self {
        let mut file_name = target
            .file_name()
            .map_or_else(Default::default, ToOwned::to_owned);
        file_name.push(".tmp");

        Self { temporary: target.with_file_name(file_name), target, committed: false }
    }

    /// Writes the full artifact content to the temporary path.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(&self.temporary, bytes)
    }

    /// Atomically renames the temporary into place.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; the temporary is cleaned up by the
    /// drop.
    pub fn commit(mut self) -> io::Result<()> {
        std::fs::rename(&self.temporary, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for ScopedArtifactWriter {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.temporary);
        }
    }
}

fn attempt(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let writer = ScopedArtifactWriter::new(target.to_owned());
    writer.write(bytes)?;
    writer.commit()
}

/// Writes an artifact atomically, retrying once on a transient failure.
///
/// # Errors
///
/// Returns the I/O error of the second attempt if both fail.
pub fn write_artifact(target: &Path, bytes: &[u8]) -> io::Result<()> {
    match attempt(target, bytes) {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::debug!(
                target_path = %target.display(),
                error = %first,
                "artifact write failed; retrying once"
            );
            attempt(target, bytes)
        }
    }
}
