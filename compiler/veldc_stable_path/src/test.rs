use proptest::prelude::*;

use super::*;

#[test]
fn construction_is_pure() {
    let module = StablePath::root("main");
    let again = StablePath::root("main");

    assert_eq!(module, again);
    assert_eq!(module.fingerprint(), again.fingerprint());
}

#[test]
fn parent_identity_flows_into_children() {
    let main = StablePath::root("main");
    let lib = StablePath::root("lib");

    let in_main = StablePath::container(&main, "Base");
    let in_lib = StablePath::container(&lib, "Base");

    assert_ne!(in_main, in_lib);
    assert_ne!(in_main.fingerprint(), in_lib.fingerprint());
}

#[test]
fn name_and_container_components_are_distinct() {
    let module = StablePath::root("main");

    let as_container = StablePath::container(&module, "value");
    let as_name = StablePath::name(&module, "value");

    assert_ne!(as_container, as_name);
    assert_ne!(as_container.fingerprint(), as_name.fingerprint());
}

#[test]
fn extras_fold_in_declared_order() {
    let module = StablePath::root("main");

    let lhs = StablePath::name(&module, ("get", 2u32));
    let rhs = StablePath::name(&module, ("get", 3u32));

    assert_ne!(lhs.fingerprint(), rhs.fingerprint());
}

#[test]
#[should_panic(expected = "cannot fingerprint the tombstone path")]
fn tombstone_cannot_be_fingerprinted() {
    let _ = StablePath::TOMBSTONE.fingerprint();
}

proptest! {
    #[test]
    fn fingerprint_depends_only_on_the_three_fields(
        module in "[a-z]{1,8}",
        container in "[A-Z][a-z]{0,7}",
        leaf in "[a-z]{1,8}",
    ) {
        let first = StablePath::name(
            &StablePath::container(&StablePath::root(module.as_str()), container.as_str()),
            leaf.as_str(),
        );
        let second = StablePath::name(
            &StablePath::container(&StablePath::root(module.as_str()), container.as_str()),
            leaf.as_str(),
        );

        prop_assert_eq!(first, second);
        prop_assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn sibling_order_does_not_matter(
        module in "[a-z]{1,8}",
        mut leaves in proptest::collection::vec("[a-z]{1,8}", 1..8),
    ) {
        let root = StablePath::root(module.as_str());

        let forward: Vec<_> = leaves
            .iter()
            .map(|leaf| StablePath::name(&root, leaf.as_str()).fingerprint())
            .collect();

        leaves.reverse();
        let mut backward: Vec<_> = leaves
            .iter()
            .map(|leaf| StablePath::name(&root, leaf.as_str()).fingerprint())
            .collect();
        backward.reverse();

        prop_assert_eq!(forward, backward);
    }
}
