//! The fine-grained dependency model of the compiler.
//!
//! This crate defines the vocabulary shared by every part of the
//! incremental-recompilation core:
//!
//! - [`DependencyKey`]: what a dependency is *on* — a top-level name, a
//!   member, a potential member, a dynamic lookup, an external artifact, or
//!   a source file itself.
//! - [`ReferencedNameTracker`]: the per-file accumulator the front end
//!   writes outgoing edges into while a file compiles.
//! - [`SourceFileDepGraph`]: the immutable per-file graph distilled from
//!   the tracker once a file compiles successfully, which is what gets
//!   serialized as the file's dependency artifact.

pub mod key;
pub mod source_graph;
pub mod tracker;

pub use key::{Aspect, DependencyKey, NodeKind};
pub use source_graph::{
    DepArc, DepNode, InvariantViolation, NodeId, ProvidedDefinition,
    SourceFileDepGraph,
};
pub use tracker::ReferencedNameTracker;
