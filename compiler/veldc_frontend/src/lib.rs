//! The interface the incremental core consumes from the front end, plus the
//! declaration-summary front end the driver binary and the test suites run.
//!
//! The parser and semantic analyzer proper are external collaborators; all
//! the core ever sees of them is a [`CompiledSource`]: the referenced-name
//! tracker they populated, the definitions they fingerprinted, and the two
//! hashes of the file. Any front end that can produce that is a valid
//! [`Frontend`].

use std::path::PathBuf;

use thiserror::Error;
use veldc_depend::{ProvidedDefinition, ReferencedNameTracker};
use veldc_source_file::SourceFile;

pub mod decl;
pub mod request;
pub mod summary;

pub use summary::SummaryFrontend;

/// Everything the core needs from one successfully compiled source file.
#[derive(Debug, Clone)]
pub struct CompiledSource {
    /// The outgoing edges recorded while the file compiled.
    pub tracker: ReferencedNameTracker,

    /// The definitions the file provides, with per-entity fingerprints.
    pub definitions: Vec<ProvidedDefinition>,

    /// The hash of the file's externally visible surface: names, types and
    /// attributes affecting ABI, excluding bodies of non-inlinable
    /// functions.
    pub interface_hash: u64,

    /// The hash of the raw file content.
    pub content_hash: u64,
}

/// A compile-job failure reported by the front end.
#[derive(Debug, Clone, Error)]
pub enum CompileFailure {
    /// The front end rejected the file.
    #[error("{path}:{line}: {message}")]
    Rejected {
        /// The file that failed.
        path: PathBuf,

        /// The 1-based line the failure points at.
        line: usize,

        /// The front end's message.
        message: String,
    },
}

/// The compilation entry point the driver dispatches jobs through.
///
/// Implementations must be callable from worker threads; a job compiles one
/// file and hands the result back to the driver over a channel.
pub trait Frontend: Send + Sync {
    /// Compiles one source file.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileFailure`] if the file does not compile; the
    /// driver keeps the file dirty and lets sibling jobs proceed.
    fn compile(
        &self,
        source: &SourceFile,
    ) -> Result<CompiledSource, CompileFailure>;
}
