use proptest::prelude::*;
use veldc_depend::{
    DependencyKey, ProvidedDefinition, ReferencedNameTracker,
    SourceFileDepGraph,
};
use veldc_intern::Identifier;
use veldc_module_graph::{CompileState, ModuleDepGraph};

use super::*;
use crate::bitstream::BitWriter;

fn sample_graph() -> SourceFileDepGraph {
    let mut tracker = ReferencedNameTracker::new();
    tracker.add_top_level_name(Identifier::new("Base"), true);
    tracker.add_used_member(
        Identifier::new("main.Base"),
        Identifier::new("init"),
        false,
    );
    tracker.add_potential_member(Identifier::new("main.Base"), true);
    tracker.add_dynamic_lookup_name(Identifier::new("value"), false);
    tracker.add_external_depend(Identifier::new("other/module.vdep"));

    SourceFileDepGraph::build(
        Identifier::new("two.veld"),
        Identifier::new("two.vdep"),
        0x1111_2222_3333_4444,
        0x5555_6666_7777_8888,
        &[
            ProvidedDefinition {
                key: DependencyKey::top_level(Identifier::new("Subclass")),
                fingerprint: None,
            },
            ProvidedDefinition {
                key: DependencyKey::nominal(Identifier::new("main.Subclass")),
                fingerprint: Some(0x9999_aaaa_bbbb_cccc),
            },
        ],
        &tracker,
    )
}

#[test]
fn source_file_graph_round_trips() {
    let graph = sample_graph();
    let bytes = write_source_file_graph(&graph);

    let decoded = read_source_file_graph(&bytes).unwrap();

    assert_eq!(decoded, graph);
}

#[test]
fn re_encoding_a_decoded_graph_is_byte_identical() {
    let bytes = write_source_file_graph(&sample_graph());
    let decoded = read_source_file_graph(&bytes).unwrap();

    assert_eq!(write_source_file_graph(&decoded), bytes);
}

#[test]
fn module_graph_round_trips() {
    let mut module = ModuleDepGraph::new();
    module.integrate(&sample_graph()).unwrap();

    let bytes = write_module_graph(&module);
    let decoded = read_module_graph(&bytes).unwrap();

    let id = veldc_module_graph::FileId(Identifier::new("two.veld"));
    let original = module.file(id).unwrap();
    let restored = decoded.file(id).unwrap();

    assert_eq!(restored.artifact_path, original.artifact_path);
    assert_eq!(restored.interface_hash, original.interface_hash);
    assert_eq!(restored.content_hash, original.content_hash);
    assert_eq!(restored.provides, original.provides);
    assert_eq!(restored.uses, original.uses);
    assert_eq!(restored.externals, original.externals);
    assert_eq!(restored.state, CompileState::UpToDate);

    // loaded arcs answer invalidation queries exactly like fresh ones
    assert_eq!(
        decoded.find_dependents(&[DependencyKey::top_level(Identifier::new(
            "Base"
        ))]),
        module.find_dependents(&[DependencyKey::top_level(Identifier::new(
            "Base"
        ))]),
    );

    assert_eq!(write_module_graph(&decoded), bytes);
}

#[test]
fn files_that_never_compiled_are_not_persisted() {
    let mut module = ModuleDepGraph::new();
    module.integrate(&sample_graph()).unwrap();
    module.register_file(
        veldc_module_graph::FileId(Identifier::new("broken.veld")),
        Identifier::new("broken.vdep"),
    );

    let decoded = read_module_graph(&write_module_graph(&module)).unwrap();

    assert!(decoded
        .file(veldc_module_graph::FileId(Identifier::new("broken.veld")))
        .is_none());
}

fn write_valid_prefix(out: &mut BitWriter) {
    for byte in format::SIGNATURE {
        out.write(u64::from(byte), 8);
    }
    out.write(u64::from(format::record::METADATA), format::RECORD_TAG_WIDTH);
    out.write(u64::from(format::FORMAT_VERSION_MAJOR), format::VERSION_WIDTH);
    out.write(u64::from(format::FORMAT_VERSION_MINOR), format::VERSION_WIDTH);
    out.write_blob(format::compiler_version().as_bytes());
}

#[test]
fn bad_signature_is_rejected() {
    assert!(matches!(
        read_source_file_graph(b"NOPE"),
        Err(ReadError::BadSignature)
    ));
    assert!(matches!(
        read_source_file_graph(b""),
        Err(ReadError::BadSignature)
    ));
}

#[test]
fn unknown_major_version_is_rejected() {
    let mut out = BitWriter::new();
    for byte in format::SIGNATURE {
        out.write(u64::from(byte), 8);
    }
    out.write(u64::from(format::record::METADATA), format::RECORD_TAG_WIDTH);
    out.write(u64::from(format::FORMAT_VERSION_MAJOR + 1), format::VERSION_WIDTH);
    out.write(0, format::VERSION_WIDTH);
    out.write_blob(b"elsewhere");

    assert!(matches!(
        read_source_file_graph(&out.finish()),
        Err(ReadError::UnsupportedMajorVersion { found }) if found == format::FORMAT_VERSION_MAJOR + 1
    ));
}

#[test]
fn newer_minor_versions_are_accepted() {
    let graph = sample_graph();
    let mut bytes = write_source_file_graph(&graph);

    // the minor version field sits right after the signature and the
    // 8-bit record tag and the 16-bit major version
    let graph_bytes = &mut bytes;
    let minor_byte_offset = format::SIGNATURE.len() + 1 + 2;
    graph_bytes[minor_byte_offset] =
        (format::FORMAT_VERSION_MINOR + 7) as u8;

    assert!(read_source_file_graph(graph_bytes).is_ok());
}

#[test]
fn unknown_record_tags_are_rejected() {
    let mut out = BitWriter::new();
    write_valid_prefix(&mut out);
    out.write(0x7f, format::RECORD_TAG_WIDTH);

    assert!(matches!(
        read_source_file_graph(&out.finish()),
        Err(ReadError::UnknownRecordTag(0x7f))
    ));
}

#[test]
fn out_of_range_identifier_references_are_rejected() {
    let mut out = BitWriter::new();
    write_valid_prefix(&mut out);

    // a NODE record referencing identifier 5 with an empty identifier table
    out.write(u64::from(format::record::NODE), format::RECORD_TAG_WIDTH);
    out.write(0, format::NODE_KIND_WIDTH);
    out.write(0, format::ASPECT_WIDTH);
    out.write_vbr(5, format::ID_VBR_WIDTH);
    out.write_vbr(0, format::ID_VBR_WIDTH);
    out.write(1, 1);
    out.write(0, 1);
    out.write_vbr(0, format::ID_VBR_WIDTH);

    assert!(matches!(
        read_source_file_graph(&out.finish()),
        Err(ReadError::IdentifierOutOfRange(5))
    ));
}

#[test]
fn truncated_artifacts_are_rejected() {
    let bytes = write_source_file_graph(&sample_graph());
    let truncated = &bytes[..bytes.len() / 2];

    assert!(read_source_file_graph(truncated).is_err());
}

proptest! {
    #[test]
    fn arbitrary_graphs_round_trip(
        definitions in proptest::collection::vec(("[a-z]{1,8}", proptest::option::of(any::<u64>())), 0..6),
        top_level_uses in proptest::collection::vec(("[a-z]{1,8}", any::<bool>()), 0..6),
        member_uses in proptest::collection::vec(("[A-Z][a-z]{0,6}", "[a-z]{1,6}", any::<bool>()), 0..6),
        interface_hash in any::<u64>(),
        content_hash in any::<u64>(),
    ) {
        let mut tracker = ReferencedNameTracker::new();
        for (name, cascades) in &top_level_uses {
            tracker.add_top_level_name(Identifier::new(name), *cascades);
        }
        for (context, name, cascades) in &member_uses {
            tracker.add_used_member(
                Identifier::new(format!("m.{context}")),
                Identifier::new(name),
                *cascades,
            );
        }

        let definitions: Vec<_> = definitions
            .iter()
            .map(|(name, fingerprint)| ProvidedDefinition {
                key: DependencyKey::top_level(Identifier::new(name)),
                fingerprint: *fingerprint,
            })
            .collect();

        let graph = SourceFileDepGraph::build(
            Identifier::new("file.veld"),
            Identifier::new("file.vdep"),
            interface_hash,
            content_hash,
            &definitions,
            &tracker,
        );

        let bytes = write_source_file_graph(&graph);
        let decoded = read_source_file_graph(&bytes).unwrap();

        prop_assert_eq!(&decoded, &graph);
        prop_assert_eq!(write_source_file_graph(&decoded), bytes);
    }
}
