//! Contains the definition of [`SourceFileDepGraph`], the immutable
//! per-file dependency graph serialized as the compile artifact.

use getset::{CopyGetters, Getters};
use thiserror::Error;
use veldc_intern::Identifier;

use crate::{
    key::{Aspect, DependencyKey},
    tracker::ReferencedNameTracker,
};

/// An index of a node within one [`SourceFileDepGraph`].
///
/// Nodes live in a flat arena and arcs refer to them by index, so the graph
/// never owns a node through a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the index as a `usize` for arena access.
    #[must_use]
    pub const fn index(self) -> usize { self.0 as usize }
}

/// One node of a dependency graph.
///
/// `provides` nodes are definitions emitted by the owning source file;
/// non-`provides` nodes are uses. A fingerprint is present only on
/// definition nodes that have a self-stable body hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
pub struct DepNode {
    /// The key identifying what this node refers to.
    #[get_copy = "pub"]
    key: DependencyKey,

    /// The stable fingerprint of the definition, if it has one.
    #[get_copy = "pub"]
    fingerprint: Option<u64>,

    /// Whether this node is a definition of the owning source file.
    #[get_copy = "pub"]
    provides: bool,

    /// The dependency artifact the owning file writes, if the node belongs
    /// to a file.
    #[get_copy = "pub"]
    artifact_path: Option<Identifier>,
}

impl DepNode {
    /// Creates a node. Nodes are immutable once constructed; graphs change
    /// only through graph-level operations.
    #[must_use]
    pub const fn new(
        key: DependencyKey,
        fingerprint: Option<u64>,
        provides: bool,
        artifact_path: Option<Identifier>,
    ) -> Self {
        Self { key, fingerprint, provides, artifact_path }
    }
}

/// A directed dependency edge `use -> def`.
///
/// A cascading arc propagates a change to `def` through to every transitive
/// dependent of the using file; a non-cascading arc stops at the immediate
/// dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
pub struct DepArc {
    /// The using endpoint; always a `provides` node of the owning file.
    #[get_copy = "pub"]
    use_node: NodeId,

    /// The defining endpoint; in the same file or an external reference.
    #[get_copy = "pub"]
    def_node: NodeId,

    /// Whether invalidation propagates past the immediate dependent.
    #[get_copy = "pub"]
    cascading: bool,
}

impl DepArc {
    /// Creates an arc between two nodes of the same graph.
    #[must_use]
    pub const fn new(use_node: NodeId, def_node: NodeId, cascading: bool) -> Self {
        Self { use_node, def_node, cascading }
    }
}

/// A definition the front end hands to the graph builder: the key the file
/// provides under, plus the entity's stable fingerprint if it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvidedDefinition {
    /// The key the definition provides.
    pub key: DependencyKey,

    /// The per-entity fingerprint: for a nominal type, a hash of its
    /// members' signatures, inheritance clause, and generic parameters; for
    /// a protocol, its requirement set; absent for definitions without a
    /// self-stable body hash.
    pub fingerprint: Option<u64>,
}

/// An internal-consistency failure of a decoded or constructed graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// An arc endpoint referred outside the node arena.
    #[error("arc endpoint {0:?} is out of range")]
    ArcOutOfRange(NodeId),

    /// An arc's use endpoint was not a provides node of the file.
    #[error("arc use endpoint {0:?} is not a provides node of the file")]
    UseIsNotProvides(NodeId),
}

/// The dependency graph one compile unit emits: the file's definitions, the
/// names it uses, and the arcs between them.
///
/// The graph is closed under the invariant that every arc's use endpoint is
/// a `provides` node of this same file; the defining endpoints are either
/// in the same file or external references. A graph is created when a file
/// compiles successfully and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct SourceFileDepGraph {
    /// The canonical path of the source file, interned.
    #[get_copy = "pub"]
    source_path: Identifier,

    /// The path of the dependency artifact this graph is written to.
    #[get_copy = "pub"]
    artifact_path: Identifier,

    /// The node arena.
    #[get = "pub"]
    nodes: Vec<DepNode>,

    /// The arcs, referring into the node arena by index.
    #[get = "pub"]
    arcs: Vec<DepArc>,

    /// The index of the distinguished interface-aspect provide node. Its
    /// fingerprint is the file's interface hash, the invalidation key for
    /// everything downstream.
    #[get_copy = "pub"]
    interface_node: NodeId,

    /// The index of the distinguished implementation-aspect provide node.
    /// Its fingerprint is the full content hash, which decides local
    /// invalidation.
    #[get_copy = "pub"]
    implementation_node: NodeId,

    /// Paths of dependency artifacts of other modules this file references.
    #[get = "pub"]
    externals: Vec<Identifier>,
}

impl SourceFileDepGraph {
    /// Builds the graph for one successfully compiled file.
    ///
    /// The file always contributes its two distinguished
    /// [`NodeKind::SourceFileProvide`](crate::NodeKind::SourceFileProvide)
    /// nodes: the interface-aspect node fingerprinted with `interface_hash`
    /// and the implementation-aspect node fingerprinted with
    /// `content_hash`. Cascading uses anchor at the interface node,
    /// non-cascading uses at the implementation node.
    #[must_use]
    pub fn build(
        source_path: Identifier,
        artifact_path: Identifier,
        interface_hash: u64,
        content_hash: u64,
        definitions: &[ProvidedDefinition],
        tracker: &ReferencedNameTracker,
    ) -> Self {
        let mut nodes = Vec::new();
        let mut arcs = Vec::new();

        let interface_node = NodeId(0);
        nodes.push(DepNode::new(
            DependencyKey::source_file_provide(source_path, Aspect::Interface),
            Some(interface_hash),
            true,
            Some(artifact_path),
        ));

        let implementation_node = NodeId(1);
        nodes.push(DepNode::new(
            DependencyKey::source_file_provide(
                source_path,
                Aspect::Implementation,
            ),
            Some(content_hash),
            true,
            Some(artifact_path),
        ));

        let mut definitions = definitions.to_vec();
        definitions.sort_unstable_by_key(|definition| definition.key);
        definitions.dedup();

        for definition in definitions {
            nodes.push(DepNode::new(
                definition.key,
                definition.fingerprint,
                true,
                Some(artifact_path),
            ));
        }

        tracker.enumerate_uses(
            false,
            std::iter::empty(),
            |kind, context, name, cascades| {
                let key = DependencyKey {
                    kind,
                    aspect: Aspect::Interface,
                    context,
                    name,
                };

                let def_node = NodeId(nodes.len() as u32);
                nodes.push(DepNode::new(key, None, false, None));

                let use_node = if cascades {
                    interface_node
                } else {
                    implementation_node
                };
                arcs.push(DepArc::new(use_node, def_node, cascades));
            },
        );

        Self {
            source_path,
            artifact_path,
            nodes,
            arcs,
            interface_node,
            implementation_node,
            externals: tracker.externals(),
        }
    }

    /// Assembles an already-validated graph from its parts; used by the
    /// artifact decoder.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantViolation`] if any arc points outside the node
    /// arena or anchors at a non-provides node.
    pub fn from_parts(
        source_path: Identifier,
        artifact_path: Identifier,
        nodes: Vec<DepNode>,
        arcs: Vec<DepArc>,
        interface_node: NodeId,
        implementation_node: NodeId,
        externals: Vec<Identifier>,
    ) -> Result<Self, InvariantViolation> {
        let graph = Self {
            source_path,
            artifact_path,
            nodes,
            arcs,
            interface_node,
            implementation_node,
            externals,
        };

        graph.verify()?;
        Ok(graph)
    }

    /// Checks the closure invariant of the graph.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantViolation`] if any arc points outside the node
    /// arena or anchors at a non-provides node.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        for arc in &self.arcs {
            for endpoint in [arc.use_node, arc.def_node] {
                if endpoint.index() >= self.nodes.len() {
                    return Err(InvariantViolation::ArcOutOfRange(endpoint));
                }
            }

            if !self.nodes[arc.use_node.index()].provides {
                return Err(InvariantViolation::UseIsNotProvides(arc.use_node));
            }
        }

        Ok(())
    }

    /// The file's interface hash: the fingerprint of the distinguished
    /// interface-aspect provide node.
    #[must_use]
    pub fn interface_hash(&self) -> u64 {
        self.nodes[self.interface_node.index()]
            .fingerprint
            .unwrap_or_default()
    }

    /// The file's full content hash: the fingerprint of the distinguished
    /// implementation-aspect provide node.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        self.nodes[self.implementation_node.index()]
            .fingerprint
            .unwrap_or_default()
    }

    /// Iterates the definitions this file provides, including the two
    /// distinguished source-file nodes.
    pub fn provides(&self) -> impl Iterator<Item = &DepNode> + '_ {
        self.nodes.iter().filter(|node| node.provides)
    }

    /// Iterates the uses this file makes of other definitions as
    /// `(key, cascading)` pairs, in arc order.
    pub fn uses(&self) -> impl Iterator<Item = (DependencyKey, bool)> + '_ {
        self.arcs
            .iter()
            .map(|arc| (self.nodes[arc.def_node.index()].key, arc.cascading))
    }
}
