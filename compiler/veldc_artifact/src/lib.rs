//! Reading and writing dependency artifacts.
//!
//! An artifact is the serialized dependency graph of one compile unit (or
//! of the whole module): a tagged-record bitstream carrying an identifier
//! table, the graph's nodes with their fingerprints and arcs, and the
//! module's incremental external dependencies. The format is described in
//! [`format`].
//!
//! The writer is canonical: identifiers are emitted in the insertion order
//! of a stable traversal and nodes in deterministic key order, so encoding
//! a decoded graph reproduces the input byte for byte.

use std::path::Path;

use thiserror::Error;
use tracing::debug;
use veldc_depend::{
    Aspect, DepArc, DepNode, DependencyKey, InvariantViolation, NodeId,
    NodeKind, SourceFileDepGraph,
};
use veldc_hash::HashMap;
use veldc_intern::Identifier;
use veldc_module_graph::{CompileState, FileId, FileRecord, ModuleDepGraph};

use crate::bitstream::{BitReader, BitWriter};

pub mod bitstream;
pub mod format;

#[cfg(test)]
mod test;

/// An error that occurs while decoding a dependency artifact.
///
/// Every variant is fatal to the affected load; the driver treats the
/// artifact as missing and rebuilds the owning unit from scratch.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The file does not start with the `DDEP` signature.
    #[error("not a dependency artifact: bad signature")]
    BadSignature,

    /// The artifact was produced by an incompatible format major version.
    #[error("unsupported dependency artifact major version {found}")]
    UnsupportedMajorVersion {
        /// The major version found in the artifact.
        found: u16,
    },

    /// A record tag outside the known range.
    #[error("unknown record tag {0}")]
    UnknownRecordTag(u8),

    /// An identifier reference outside the identifier table.
    #[error("identifier index {0} is out of range")]
    IdentifierOutOfRange(u64),

    /// A structurally invalid record.
    #[error("malformed record: {0}")]
    MalformedRecord(&'static str),

    /// The artifact ended in the middle of a record.
    #[error("unexpected end of artifact")]
    UnexpectedEof,

    /// The decoded graph violates the dependency-graph invariants.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    /// The artifact could not be read from disk.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

struct Serializer {
    out: BitWriter,
    identifier_ids: HashMap<Identifier, u64>,
    identifiers_to_write: Vec<Identifier>,
}

impl Serializer {
    fn new() -> Self {
        Self {
            out: BitWriter::new(),
            identifier_ids: HashMap::default(),
            identifiers_to_write: Vec::new(),
        }
    }

    /// First-pass collection; identifiers are numbered from 1 in the order
    /// they are first seen.
    fn add_identifier(&mut self, identifier: Identifier) {
        if identifier.is_empty()
            || self.identifier_ids.contains_key(&identifier)
        {
            return;
        }

        let next = self.identifiers_to_write.len() as u64 + 1;
        self.identifier_ids.insert(identifier, next);
        self.identifiers_to_write.push(identifier);
    }

    fn identifier_id(&self, identifier: Identifier) -> u64 {
        if identifier.is_empty() {
            return 0;
        }

        *self
            .identifier_ids
            .get(&identifier)
            .expect("identifier was not collected in the first pass")
    }

    fn write_signature(&mut self) {
        for byte in format::SIGNATURE {
            self.out.write(u64::from(byte), 8);
        }
    }

    fn write_metadata(&mut self) {
        self.out.write(u64::from(format::record::METADATA), format::RECORD_TAG_WIDTH);
        self.out.write(
            u64::from(format::FORMAT_VERSION_MAJOR),
            format::VERSION_WIDTH,
        );
        self.out.write(
            u64::from(format::FORMAT_VERSION_MINOR),
            format::VERSION_WIDTH,
        );
        self.out.write_blob(format::compiler_version().as_bytes());
    }

    fn write_identifiers(&mut self) {
        for identifier in &self.identifiers_to_write {
            self.out.write(
                u64::from(format::record::IDENTIFIER),
                format::RECORD_TAG_WIDTH,
            );
            self.out.write_blob(identifier.as_str().as_bytes());
        }
    }

    fn write_node(
        &mut self,
        key: DependencyKey,
        fingerprint: Option<u64>,
        provides: bool,
        artifact_path: Option<Identifier>,
    ) {
        let context_id = self.identifier_id(key.context);
        let name_id = self.identifier_id(key.name);
        let artifact_path_id =
            artifact_path.map_or(0, |path| self.identifier_id(path));

        self.out
            .write(u64::from(format::record::NODE), format::RECORD_TAG_WIDTH);
        self.out.write(key.kind as u64, format::NODE_KIND_WIDTH);
        self.out.write(key.aspect as u64, format::ASPECT_WIDTH);
        self.out.write_vbr(context_id, format::ID_VBR_WIDTH);
        self.out.write_vbr(name_id, format::ID_VBR_WIDTH);
        self.out.write(u64::from(provides), 1);
        self.out.write(u64::from(artifact_path.is_some()), 1);
        self.out.write_vbr(artifact_path_id, format::ID_VBR_WIDTH);

        if let Some(fingerprint) = fingerprint {
            self.out.write(
                u64::from(format::record::FINGERPRINT),
                format::RECORD_TAG_WIDTH,
            );
            self.out.write_blob(&fingerprint.to_le_bytes());
        }
    }

    fn write_depends_on(&mut self, use_sequence: u64, cascading: bool) {
        self.out.write(
            u64::from(format::record::DEPENDS_ON),
            format::RECORD_TAG_WIDTH,
        );
        self.out.write_vbr(use_sequence, format::ID_VBR_WIDTH);
        self.out.write(u64::from(cascading), 1);
    }

    fn write_external(&mut self, path: Identifier, fingerprint: Option<u64>) {
        self.out.write(
            u64::from(format::record::EXTERNAL),
            format::RECORD_TAG_WIDTH,
        );
        self.out.write_blob(path.as_str().as_bytes());

        if let Some(fingerprint) = fingerprint {
            self.out.write(
                u64::from(format::record::FINGERPRINT),
                format::RECORD_TAG_WIDTH,
            );
            self.out.write_blob(&fingerprint.to_le_bytes());
        }
    }

    fn finish(self) -> Vec<u8> { self.out.finish() }
}

/// One decoded `NODE` record with its trailing attribute records.
#[derive(Debug, Clone)]
struct RawNode {
    key: DependencyKey,
    fingerprint: Option<u64>,
    provides: bool,
    artifact_path: Option<Identifier>,

    /// `(use-node 1-based sequence, cascading)` of each arc this node is
    /// the defining endpoint of.
    arcs: Vec<(u64, bool)>,
}

#[derive(Debug, Default)]
struct RawArtifact {
    nodes: Vec<RawNode>,
    externals: Vec<(Identifier, Option<u64>)>,
}

/// What the next `FINGERPRINT` record attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FingerprintTarget {
    Node,
    External,
}

struct Deserializer<'a> {
    reader: BitReader<'a>,
    identifiers: Vec<Identifier>,
}

impl<'a> Deserializer<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { reader: BitReader::new(bytes), identifiers: Vec::new() }
    }

    fn read_signature(&mut self) -> Result<(), ReadError> {
        for expected in format::SIGNATURE {
            match self.reader.read(8) {
                Ok(byte) if byte == u64::from(expected) => {}
                Ok(_) => return Err(ReadError::BadSignature),
                Err(_) => return Err(ReadError::BadSignature),
            }
        }

        Ok(())
    }

    fn read_metadata(&mut self) -> Result<(), ReadError> {
        let tag = self.reader.read(format::RECORD_TAG_WIDTH)? as u8;
        if tag != format::record::METADATA {
            return Err(ReadError::MalformedRecord(
                "artifact does not begin with a METADATA record",
            ));
        }

        let major = self.reader.read(format::VERSION_WIDTH)? as u16;
        let minor = self.reader.read(format::VERSION_WIDTH)? as u16;
        let version_blob = self.reader.read_blob()?;

        if major != format::FORMAT_VERSION_MAJOR {
            return Err(ReadError::UnsupportedMajorVersion { found: major });
        }

        // newer minors are compatible by definition
        let _ = minor;

        let producer = String::from_utf8_lossy(&version_blob);
        if producer != format::compiler_version() {
            debug!(%producer, "artifact was produced by another compiler build");
        }

        Ok(())
    }

    fn resolve_identifier(&self, index: u64) -> Result<Identifier, ReadError> {
        if index == 0 {
            return Ok(Identifier::EMPTY);
        }

        self.identifiers
            .get(index as usize - 1)
            .copied()
            .ok_or(ReadError::IdentifierOutOfRange(index))
    }

    fn read_node(&mut self) -> Result<RawNode, ReadError> {
        let kind_raw = self.reader.read(format::NODE_KIND_WIDTH)? as u8;
        let kind = NodeKind::from_repr(kind_raw)
            .ok_or(ReadError::MalformedRecord("bad node kind"))?;

        let aspect_raw = self.reader.read(format::ASPECT_WIDTH)? as u8;
        let aspect = Aspect::from_repr(aspect_raw)
            .ok_or(ReadError::MalformedRecord("bad aspect"))?;

        let context_id = self.reader.read_vbr(format::ID_VBR_WIDTH)?;
        let context = self.resolve_identifier(context_id)?;

        let name_id = self.reader.read_vbr(format::ID_VBR_WIDTH)?;
        let name = self.resolve_identifier(name_id)?;

        let provides = self.reader.read(1)? != 0;
        let has_artifact_path = self.reader.read(1)? != 0;
        let artifact_path_id = self.reader.read_vbr(format::ID_VBR_WIDTH)?;

        let artifact_path = if has_artifact_path {
            Some(self.resolve_identifier(artifact_path_id)?)
        } else {
            None
        };

        Ok(RawNode {
            key: DependencyKey { kind, aspect, context, name },
            fingerprint: None,
            provides,
            artifact_path,
            arcs: Vec::new(),
        })
    }

    fn read_records(mut self) -> Result<RawArtifact, ReadError> {
        let mut artifact = RawArtifact::default();
        let mut fingerprint_target = None;

        while !self.reader.at_end() {
            let tag = self.reader.read(format::RECORD_TAG_WIDTH)? as u8;

            match tag {
                format::record::METADATA => {
                    // METADATA appears exactly once, at the beginning
                    return Err(ReadError::MalformedRecord(
                        "unexpected METADATA record",
                    ));
                }

                format::record::IDENTIFIER => {
                    if !artifact.nodes.is_empty() {
                        return Err(ReadError::MalformedRecord(
                            "IDENTIFIER record after the first NODE record",
                        ));
                    }

                    let blob = self.reader.read_blob()?;
                    let text = String::from_utf8(blob).map_err(|_| {
                        ReadError::MalformedRecord(
                            "identifier is not valid UTF-8",
                        )
                    })?;

                    self.identifiers.push(Identifier::new(text));
                }

                format::record::NODE => {
                    let node = self.read_node()?;
                    artifact.nodes.push(node);
                    fingerprint_target = Some(FingerprintTarget::Node);
                }

                format::record::FINGERPRINT => {
                    let blob = self.reader.read_blob()?;
                    let bytes: [u8; 8] =
                        blob.as_slice().try_into().map_err(|_| {
                            ReadError::MalformedRecord(
                                "fingerprint is not 8 bytes",
                            )
                        })?;
                    let value = u64::from_le_bytes(bytes);

                    let slot = match fingerprint_target {
                        Some(FingerprintTarget::Node) => {
                            &mut artifact
                                .nodes
                                .last_mut()
                                .expect("target tracks pushes")
                                .fingerprint
                        }
                        Some(FingerprintTarget::External) => {
                            &mut artifact
                                .externals
                                .last_mut()
                                .expect("target tracks pushes")
                                .1
                        }
                        None => {
                            return Err(ReadError::MalformedRecord(
                                "FINGERPRINT record attaches to nothing",
                            ));
                        }
                    };

                    if slot.is_some() {
                        return Err(ReadError::MalformedRecord(
                            "record has two fingerprints",
                        ));
                    }

                    *slot = Some(value);
                }

                format::record::DEPENDS_ON => {
                    let use_sequence =
                        self.reader.read_vbr(format::ID_VBR_WIDTH)?;
                    let cascading = self.reader.read(1)? != 0;

                    let node =
                        artifact.nodes.last_mut().ok_or(
                            ReadError::MalformedRecord(
                                "DEPENDS_ON record before any NODE record",
                            ),
                        )?;

                    node.arcs.push((use_sequence, cascading));
                }

                format::record::EXTERNAL => {
                    let blob = self.reader.read_blob()?;
                    let text = String::from_utf8(blob).map_err(|_| {
                        ReadError::MalformedRecord(
                            "external path is not valid UTF-8",
                        )
                    })?;

                    artifact.externals.push((Identifier::new(text), None));
                    fingerprint_target = Some(FingerprintTarget::External);
                }

                unknown => return Err(ReadError::UnknownRecordTag(unknown)),
            }
        }

        Ok(artifact)
    }
}

fn decode(bytes: &[u8]) -> Result<RawArtifact, ReadError> {
    let mut deserializer = Deserializer::new(bytes);
    deserializer.read_signature()?;
    deserializer.read_metadata()?;
    deserializer.read_records()
}

fn validate_arc_anchor(
    nodes: &[RawNode],
    use_sequence: u64,
) -> Result<usize, ReadError> {
    let index = usize::try_from(use_sequence)
        .ok()
        .and_then(|sequence| sequence.checked_sub(1))
        .filter(|index| *index < nodes.len())
        .ok_or(ReadError::MalformedRecord(
            "arc anchor sequence is out of range",
        ))?;

    if !nodes[index].provides {
        return Err(ReadError::MalformedRecord(
            "arc anchor is not a provides node",
        ));
    }

    Ok(index)
}

/// Encodes the dependency graph of one compile unit.
#[must_use]
pub fn write_source_file_graph(graph: &SourceFileDepGraph) -> Vec<u8> {
    let mut serializer = Serializer::new();

    for node in graph.nodes() {
        serializer.add_identifier(node.key().context);
        serializer.add_identifier(node.key().name);
        if let Some(path) = node.artifact_path() {
            serializer.add_identifier(path);
        }
    }
    for &external in graph.externals() {
        serializer.add_identifier(external);
    }

    serializer.write_signature();
    serializer.write_metadata();
    serializer.write_identifiers();

    let mut arcs_by_def: HashMap<usize, Vec<(u64, bool)>> = HashMap::default();
    for arc in graph.arcs() {
        arcs_by_def.entry(arc.def_node().index()).or_default().push((
            arc.use_node().index() as u64 + 1,
            arc.cascading(),
        ));
    }

    for (index, node) in graph.nodes().iter().enumerate() {
        serializer.write_node(
            node.key(),
            node.fingerprint(),
            node.provides(),
            node.artifact_path(),
        );

        if let Some(arcs) = arcs_by_def.get(&index) {
            for &(use_sequence, cascading) in arcs {
                serializer.write_depends_on(use_sequence, cascading);
            }
        }
    }

    for &external in graph.externals() {
        serializer.write_external(external, None);
    }

    serializer.finish()
}

/// Decodes the dependency graph of one compile unit.
///
/// # Errors
///
/// Returns a [`ReadError`] if the artifact is malformed in any way; the
/// caller treats the artifact as missing.
pub fn read_source_file_graph(
    bytes: &[u8],
) -> Result<SourceFileDepGraph, ReadError> {
    let raw = decode(bytes)?;

    let mut nodes = Vec::with_capacity(raw.nodes.len());
    let mut arcs = Vec::new();

    for (index, node) in raw.nodes.iter().enumerate() {
        nodes.push(DepNode::new(
            node.key,
            node.fingerprint,
            node.provides,
            node.artifact_path,
        ));

        for &(use_sequence, cascading) in &node.arcs {
            let use_index = validate_arc_anchor(&raw.nodes, use_sequence)?;
            arcs.push(DepArc::new(
                NodeId(use_index as u32),
                NodeId(index as u32),
                cascading,
            ));
        }
    }

    let find_distinguished = |aspect: Aspect| {
        raw.nodes.iter().position(|node| {
            node.provides
                && node.key.kind == NodeKind::SourceFileProvide
                && node.key.aspect == aspect
        })
    };

    let interface_index = find_distinguished(Aspect::Interface).ok_or(
        ReadError::MalformedRecord("missing interface source-file node"),
    )?;
    let implementation_index = find_distinguished(Aspect::Implementation)
        .ok_or(ReadError::MalformedRecord(
            "missing implementation source-file node",
        ))?;

    let interface = &raw.nodes[interface_index];
    let source_path = interface.key.name;
    let artifact_path = interface.artifact_path.ok_or(
        ReadError::MalformedRecord("source-file node has no artifact path"),
    )?;

    Ok(SourceFileDepGraph::from_parts(
        source_path,
        artifact_path,
        nodes,
        arcs,
        NodeId(interface_index as u32),
        NodeId(implementation_index as u32),
        raw.externals.into_iter().map(|(path, _)| path).collect(),
    )?)
}

/// Encodes the module graph: every file's provides and uses, plus the
/// module-wide incremental external dependencies.
///
/// Files that never compiled successfully have nothing to persist and are
/// skipped; the next build classifies them as initial.
#[must_use]
pub fn write_module_graph(graph: &ModuleDepGraph) -> Vec<u8> {
    let mut serializer = Serializer::new();

    let files: Vec<_> = graph
        .files_sorted()
        .into_iter()
        .filter(|(_, record)| record.interface_hash.is_some())
        .collect();

    for (_, record) in &files {
        for (key, _) in &record.provides {
            serializer.add_identifier(key.context);
            serializer.add_identifier(key.name);
        }
        serializer.add_identifier(record.artifact_path);
        for (key, _) in &record.uses {
            serializer.add_identifier(key.context);
            serializer.add_identifier(key.name);
        }
    }
    for external in graph.externals() {
        serializer.add_identifier(external);
    }

    serializer.write_signature();
    serializer.write_metadata();
    serializer.write_identifiers();

    let mut sequence = 0u64;
    for (_, record) in &files {
        let mut interface_sequence = None;
        let mut implementation_sequence = None;

        for &(key, fingerprint) in &record.provides {
            sequence += 1;
            serializer.write_node(
                key,
                fingerprint,
                true,
                Some(record.artifact_path),
            );

            if key.kind == NodeKind::SourceFileProvide {
                match key.aspect {
                    Aspect::Interface => interface_sequence = Some(sequence),
                    Aspect::Implementation => {
                        implementation_sequence = Some(sequence);
                    }
                }
            }
        }

        let interface_sequence = interface_sequence
            .expect("integrated file carries its interface node");
        let implementation_sequence = implementation_sequence
            .expect("integrated file carries its implementation node");

        for &(key, cascading) in &record.uses {
            sequence += 1;
            serializer.write_node(key, None, false, Some(record.artifact_path));
            serializer.write_depends_on(
                if cascading {
                    interface_sequence
                } else {
                    implementation_sequence
                },
                cascading,
            );
        }
    }

    for external in graph.externals() {
        serializer.write_external(external, graph.external_hash(external));
    }

    serializer.finish()
}

/// Decodes a module graph.
///
/// # Errors
///
/// Returns a [`ReadError`] if the artifact is malformed in any way; the
/// caller starts from an empty module graph instead.
pub fn read_module_graph(bytes: &[u8]) -> Result<ModuleDepGraph, ReadError> {
    let raw = decode(bytes)?;

    // group nodes by the artifact they belong to, preserving first-appearance
    // order
    let mut owners: Vec<Identifier> = Vec::new();
    let mut grouped: HashMap<Identifier, Vec<&RawNode>> = HashMap::default();

    for node in &raw.nodes {
        let owner = node.artifact_path.ok_or(ReadError::MalformedRecord(
            "module graph node has no artifact path",
        ))?;

        if !grouped.contains_key(&owner) {
            owners.push(owner);
        }
        grouped.entry(owner).or_default().push(node);
    }

    let mut graph = ModuleDepGraph::new();

    for owner in owners {
        let nodes = &grouped[&owner];

        let find_distinguished = |aspect: Aspect| {
            nodes.iter().find(|node| {
                node.provides
                    && node.key.kind == NodeKind::SourceFileProvide
                    && node.key.aspect == aspect
            })
        };

        let interface = find_distinguished(Aspect::Interface).ok_or(
            ReadError::MalformedRecord("missing interface source-file node"),
        )?;
        let implementation = find_distinguished(Aspect::Implementation)
            .ok_or(ReadError::MalformedRecord(
                "missing implementation source-file node",
            ))?;

        let mut provides = Vec::new();
        let mut uses = Vec::new();
        let mut externals = Vec::new();

        for node in nodes {
            if node.provides {
                provides.push((node.key, node.fingerprint));
                continue;
            }

            let &(use_sequence, cascading) =
                node.arcs.first().ok_or(ReadError::MalformedRecord(
                    "module graph use node has no arc",
                ))?;
            validate_arc_anchor(&raw.nodes, use_sequence)?;

            uses.push((node.key, cascading));

            if node.key.kind == NodeKind::ExternalDepend {
                externals.push(node.key.name);
            }
        }

        graph.restore_file(FileId(interface.key.name), FileRecord {
            artifact_path: owner,
            interface_hash: interface.fingerprint,
            content_hash: implementation.fingerprint,
            provides,
            uses,
            externals,
            state: CompileState::UpToDate,
        });
    }

    for (path, fingerprint) in raw.externals {
        if let Some(fingerprint) = fingerprint {
            graph.record_external_hash(path, fingerprint);
        }
    }

    Ok(graph)
}

/// Reads and decodes a source-file artifact from disk.
///
/// # Errors
///
/// Returns a [`ReadError`] on I/O failure or malformed content.
pub fn read_source_file_graph_from_path(
    path: &Path,
) -> Result<SourceFileDepGraph, ReadError> {
    read_source_file_graph(&std::fs::read(path)?)
}

/// Reads and decodes a module-graph artifact from disk.
///
/// # Errors
///
/// Returns a [`ReadError`] on I/O failure or malformed content.
pub fn read_module_graph_from_path(
    path: &Path,
) -> Result<ModuleDepGraph, ReadError> {
    read_module_graph(&std::fs::read(path)?)
}
