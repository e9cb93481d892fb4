use proptest::prelude::*;
use veldc_depend::{
    DependencyKey, ProvidedDefinition, ReferencedNameTracker,
    SourceFileDepGraph,
};
use veldc_intern::Identifier;

use super::*;

fn file_graph(
    source: &str,
    interface_hash: u64,
    content_hash: u64,
    definitions: &[ProvidedDefinition],
    configure: impl FnOnce(&mut ReferencedNameTracker),
) -> SourceFileDepGraph {
    let mut tracker = ReferencedNameTracker::new();
    configure(&mut tracker);

    SourceFileDepGraph::build(
        Identifier::new(source),
        Identifier::new(format!("{source}.vdep")),
        interface_hash,
        content_hash,
        definitions,
        &tracker,
    )
}

fn top_level_def(name: &str, fingerprint: Option<u64>) -> ProvidedDefinition {
    ProvidedDefinition {
        key: DependencyKey::top_level(Identifier::new(name)),
        fingerprint,
    }
}

#[test]
fn first_integration_changes_every_provided_key() {
    let mut graph = ModuleDepGraph::new();

    let changed = graph
        .integrate(&file_graph(
            "c.veld",
            1,
            10,
            &[top_level_def("c", None)],
            |_| {},
        ))
        .unwrap();

    // the two distinguished source-file keys plus the definition
    assert_eq!(changed.len(), 3);
    assert!(changed.contains(&DependencyKey::top_level(Identifier::new("c"))));
}

#[test]
fn integration_is_idempotent() {
    let mut graph = ModuleDepGraph::new();
    let file = file_graph("c.veld", 1, 10, &[top_level_def("c", None)], |_| {});

    let first = graph.integrate(&file).unwrap();
    let second = graph.integrate(&file).unwrap();

    assert!(!first.is_empty());
    assert_eq!(second, Vec::new());
}

#[test]
fn body_only_edit_changes_no_definition_key() {
    let mut graph = ModuleDepGraph::new();

    graph
        .integrate(&file_graph(
            "c.veld",
            1,
            10,
            &[top_level_def("c", None)],
            |_| {},
        ))
        .unwrap();

    // same interface hash, different content hash
    let changed = graph
        .integrate(&file_graph(
            "c.veld",
            1,
            11,
            &[top_level_def("c", None)],
            |_| {},
        ))
        .unwrap();

    // only the implementation-aspect source-file key moves
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].kind, NodeKind::SourceFileProvide);
    assert_eq!(changed[0].aspect, veldc_depend::Aspect::Implementation);
}

#[test]
fn removing_a_provides_entity_changes_its_key() {
    let mut graph = ModuleDepGraph::new();

    graph
        .integrate(&file_graph(
            "c.veld",
            1,
            10,
            &[top_level_def("c", None), top_level_def("gone", None)],
            |_| {},
        ))
        .unwrap();

    let changed = graph
        .integrate(&file_graph(
            "c.veld",
            2,
            11,
            &[top_level_def("c", None)],
            |_| {},
        ))
        .unwrap();

    assert!(
        changed.contains(&DependencyKey::top_level(Identifier::new("gone")))
    );
}

#[test]
fn fingerprinted_definitions_change_by_their_own_hash() {
    let mut graph = ModuleDepGraph::new();
    let nominal = DependencyKey::nominal(Identifier::new("main.Base"));

    graph
        .integrate(&file_graph(
            "one.veld",
            1,
            10,
            &[ProvidedDefinition { key: nominal, fingerprint: Some(100) }],
            |_| {},
        ))
        .unwrap();

    // interface hash unchanged, but the nominal's own fingerprint moved
    let changed = graph
        .integrate(&file_graph(
            "one.veld",
            1,
            11,
            &[ProvidedDefinition { key: nominal, fingerprint: Some(101) }],
            |_| {},
        ))
        .unwrap();

    assert!(changed.contains(&nominal));
}

#[test]
fn member_churn_wakes_potential_member_dependents() {
    let mut graph = ModuleDepGraph::new();
    let base = Identifier::new("main.Base");

    graph
        .integrate(&file_graph("one.veld", 1, 10, &[], |_| {}))
        .unwrap();

    let changed = graph
        .integrate(&file_graph(
            "one.veld",
            2,
            11,
            &[ProvidedDefinition {
                key: DependencyKey::member(base, Identifier::new("tick")),
                fingerprint: None,
            }],
            |_| {},
        ))
        .unwrap();

    assert!(changed.contains(&DependencyKey::potential_member(base)));
}

fn linear_chain(cascading: bool) -> ModuleDepGraph {
    let mut graph = ModuleDepGraph::new();

    graph
        .integrate(&file_graph(
            "c.veld",
            1,
            10,
            &[top_level_def("c", None)],
            |_| {},
        ))
        .unwrap();
    graph
        .integrate(&file_graph(
            "b.veld",
            2,
            20,
            &[top_level_def("b", None)],
            |tracker| {
                tracker.add_top_level_name(Identifier::new("c"), cascading);
            },
        ))
        .unwrap();
    graph
        .integrate(&file_graph("a.veld", 3, 30, &[], |tracker| {
            tracker.add_top_level_name(Identifier::new("b"), false);
        }))
        .unwrap();

    graph
}

#[test]
fn non_cascading_arcs_stop_at_the_immediate_dependent() {
    let graph = linear_chain(false);

    let dependents = graph
        .find_dependents(&[DependencyKey::top_level(Identifier::new("c"))]);

    assert_eq!(dependents, vec![FileId(Identifier::new("b.veld"))]);
}

#[test]
fn cascading_arcs_propagate_transitively() {
    let graph = linear_chain(true);

    let dependents = graph
        .find_dependents(&[DependencyKey::top_level(Identifier::new("c"))]);

    assert_eq!(
        dependents,
        vec![
            FileId(Identifier::new("b.veld")),
            FileId(Identifier::new("a.veld")),
        ],
    );
}

#[test]
fn external_invalidation_finds_the_depending_files() {
    let mut graph = ModuleDepGraph::new();
    let import = Identifier::new("other/module.vdep");

    graph
        .integrate(&file_graph("a.veld", 1, 10, &[], |tracker| {
            tracker.add_external_depend(import);
        }))
        .unwrap();
    graph
        .integrate(&file_graph("b.veld", 2, 20, &[], |_| {}))
        .unwrap();

    assert_eq!(
        graph.invalidated_by_external(import),
        vec![FileId(Identifier::new("a.veld"))],
    );
    assert_eq!(
        graph.invalidated_by_external(Identifier::new("absent.vdep")),
        Vec::new(),
    );
}

#[test]
fn queue_transitions_respect_the_state_machine() {
    let mut graph = ModuleDepGraph::new();
    let id = FileId(Identifier::new("a.veld"));

    graph.register_file(id, Identifier::new("a.vdep"));
    assert_eq!(
        graph.file(id).unwrap().state,
        CompileState::Queued(QueueReason::Initial),
    );

    // already queued; a second reason does not displace the first
    assert!(!graph.mark_queued(id, QueueReason::Dependencies));

    graph.mark_compiling(id);
    graph.mark_failed(id);
    assert_eq!(graph.failed_files(), vec![id]);

    // a failed file may be re-queued by the next build
    assert!(graph.mark_queued(id, QueueReason::LocallyInvalidated));
}

proptest! {
    #[test]
    fn dependent_closure_is_monotone(
        arcs in proptest::collection::vec((0u8..6, 0u8..6, any::<bool>()), 0..24),
        seed_a in proptest::collection::vec(0u8..6, 0..6),
        seed_b in proptest::collection::vec(0u8..6, 0..6),
    ) {
        let mut graph = ModuleDepGraph::new();

        for file in 0u8..6 {
            let name = format!("f{file}");
            let uses: Vec<_> = arcs
                .iter()
                .filter(|(user, _, _)| *user == file)
                .copied()
                .collect();

            graph
                .integrate(&file_graph(
                    &format!("{name}.veld"),
                    u64::from(file) + 1,
                    u64::from(file) + 100,
                    &[top_level_def(&name, None)],
                    |tracker| {
                        for (_, used, cascading) in uses {
                            tracker.add_top_level_name(
                                Identifier::new(format!("f{used}")),
                                cascading,
                            );
                        }
                    },
                ))
                .unwrap();
        }

        let keys = |seed: &[u8]| -> Vec<DependencyKey> {
            seed.iter()
                .map(|file| {
                    DependencyKey::top_level(Identifier::new(format!("f{file}")))
                })
                .collect()
        };

        let union: Vec<u8> =
            seed_a.iter().chain(seed_b.iter()).copied().collect();

        let smaller: HashSet<_> =
            graph.find_dependents(&keys(&seed_a)).into_iter().collect();
        let larger: HashSet<_> =
            graph.find_dependents(&keys(&union)).into_iter().collect();

        prop_assert!(smaller.is_subset(&larger));
    }
}
