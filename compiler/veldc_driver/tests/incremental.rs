//! End-to-end scenarios for the incremental build loop.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::AtomicBool,
};

use tempfile::TempDir;
use veldc_driver::{execute, Arguments, BuildOutcome};
use veldc_frontend::SummaryFrontend;
use veldc_module_graph::QueueReason;

struct Project {
    dir: TempDir,
    module_name: String,
}

impl Project {
    fn new(module_name: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let map_path = dir.path().join("output-file-map.json");
        let module_artifact = dir.path().join(format!("{module_name}.vdep"));
        fs::write(
            &map_path,
            format!(
                r#"{{ "": {{ "dependency-artifact": {:?} }} }}"#,
                module_artifact.display().to_string(),
            ),
        )
        .unwrap();

        Self { dir, module_name: module_name.to_owned() }
    }

    fn path(&self, name: &str) -> PathBuf { self.dir.path().join(name) }

    fn write(&self, name: &str, content: &str) {
        fs::write(self.path(name), content).unwrap();
    }

    fn arguments(&self, files: &[&str]) -> Arguments {
        let mut arguments = Arguments::over_inputs(
            files.iter().map(|file| self.path(file)).collect(),
        );
        arguments.module_name.clone_from(&self.module_name);
        arguments.incremental = true;
        arguments.emit_dependencies = true;
        arguments.output_file_map =
            Some(self.path("output-file-map.json"));
        // one job at a time keeps completion order deterministic
        arguments.jobs = Some(1);
        arguments
    }

    fn build(&self, files: &[&str]) -> BuildOutcome {
        execute(
            &self.arguments(files),
            &SummaryFrontend::new(&self.module_name),
            &AtomicBool::new(false),
        )
        .unwrap()
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned()
}

fn compiled_names(outcome: &BuildOutcome) -> Vec<String> {
    outcome
        .compiled
        .iter()
        .map(|(id, _)| file_name(id.path().as_str()))
        .collect()
}

fn compiled_set(outcome: &BuildOutcome) -> Vec<String> {
    let mut names = compiled_names(outcome);
    names.sort();
    names
}

fn reason_of(outcome: &BuildOutcome, name: &str) -> QueueReason {
    outcome
        .compiled
        .iter()
        .find(|(id, _)| file_name(id.path().as_str()) == name)
        .map(|(_, reason)| *reason)
        .unwrap()
}

#[test]
fn linear_chain_rebuilds_stop_where_interfaces_settle() {
    let project = Project::new("main");
    project.write("a.veld", "def a\nuse b\n");
    project.write("b.veld", "def b sig stable\nuse c\n");
    project.write("c.veld", "def c sig v1\n");
    let files = &["a.veld", "b.veld", "c.veld"];

    let first = project.build(files);
    assert_eq!(compiled_set(&first), ["a.veld", "b.veld", "c.veld"]);
    assert_eq!(reason_of(&first, "c.veld"), QueueReason::Initial);

    // a signature edit to C: C recompiles, then B because a definition it
    // uses changed; A stays clean because B's interface did not move
    project.write("c.veld", "def c sig v2\n");
    let second = project.build(files);

    assert_eq!(compiled_names(&second), ["c.veld", "b.veld"]);
    assert_eq!(reason_of(&second, "c.veld"), QueueReason::LocallyInvalidated);
    assert_eq!(reason_of(&second, "b.veld"), QueueReason::Dependencies);
    assert!(second.is_success());
}

#[test]
fn body_only_edits_do_not_queue_dependents() {
    let project = Project::new("main");
    project.write("b.veld", "def b\nuse c\n");
    project.write("c.veld", "def c sig v1\n");
    let files = &["b.veld", "c.veld"];

    project.build(files);

    // a whitespace-level edit: the content hash moves, the interface hash
    // does not
    project.write("c.veld", "def c sig v1\n\nbody only\n");
    let second = project.build(files);

    assert_eq!(compiled_names(&second), ["c.veld"]);
}

#[test]
fn an_untouched_project_rebuilds_nothing() {
    let project = Project::new("main");
    project.write("a.veld", "def a\nuse b cascading\n");
    project.write("b.veld", "def b\n");
    let files = &["a.veld", "b.veld"];

    project.build(files);
    let second = project.build(files);

    assert_eq!(compiled_names(&second), Vec::<String>::new());
    assert!(second.is_success());
}

#[test]
fn partial_failure_retries_exactly_the_failed_file() {
    let project = Project::new("main");
    project.write("good.veld", "def good\n");
    project.write("bad.veld", "def bad\nerror deliberate\n");
    let files = &["good.veld", "bad.veld"];

    let first = project.build(files);
    assert!(!first.is_success());
    assert_eq!(compiled_set(&first), ["good.veld"]);
    assert_eq!(first.failures.len(), 1);
    assert_eq!(
        file_name(first.failures[0].0.path().as_str()),
        "bad.veld",
    );

    // the good file's integration was recorded; fixing the bad file
    // recompiles only the bad file
    project.write("bad.veld", "def bad\n");
    let second = project.build(files);

    assert_eq!(compiled_names(&second), ["bad.veld"]);
    assert!(second.is_success());
}

#[test]
fn removing_a_provided_entity_rebuilds_cascading_dependents() {
    let project = Project::new("main");
    project.write("a.veld", "def a\nuse b\n");
    project.write("b.veld", "def b\nuse gone cascading\n");
    project.write("c.veld", "def c\ndef gone\n");
    let files = &["a.veld", "b.veld", "c.veld"];

    project.build(files);

    // deleting `gone` changes its key; B depends on it cascading, so B's
    // own dependents rebuild as well
    project.write("c.veld", "def c\n");
    let second = project.build(files);

    assert_eq!(compiled_names(&second)[0], "c.veld");
    assert_eq!(compiled_set(&second), ["a.veld", "b.veld", "c.veld"]);
    assert_eq!(reason_of(&second, "b.veld"), QueueReason::Dependencies);
    assert_eq!(reason_of(&second, "a.veld"), QueueReason::Dependencies);
}

#[test]
fn dropped_inputs_invalidate_their_dependents() {
    let project = Project::new("main");
    project.write("user.veld", "def user\nuse helper\n");
    project.write("helper.veld", "def helper\n");

    project.build(&["user.veld", "helper.veld"]);

    // the helper file vanished from the build entirely
    let second = project.build(&["user.veld"]);

    assert_eq!(compiled_names(&second), ["user.veld"]);
    assert_eq!(reason_of(&second, "user.veld"), QueueReason::Dependencies);
}

#[test]
fn member_addition_wakes_potential_member_dependents() {
    let project = Project::new("main");
    project.write(
        "sub.veld",
        "type Subclass sig : Base\nuse-potential Base cascading\n",
    );
    project.write("base.veld", "type Base\n");
    let files = &["sub.veld", "base.veld"];

    project.build(files);

    // adding a member to Base must rebuild the subclass even though no
    // concrete member arc existed
    project.write("base.veld", "type Base\nmember Base.tick sig ()\n");
    let second = project.build(files);

    assert_eq!(compiled_names(&second), ["base.veld", "sub.veld"]);
}

#[test]
fn cross_module_invalidation_follows_the_interface_fingerprint() {
    let lib = Project::new("lib");
    lib.write("lib.veld", "def helper sig v1\n");
    lib.build(&["lib.veld"]);

    let lib_artifact = lib.path("lib.vdep");
    assert!(lib_artifact.exists());

    let app = Project::new("app");
    app.write(
        "app.veld",
        &format!("def app\nexternal {}\n", lib_artifact.display()),
    );

    let mut arguments = app.arguments(&["app.veld"]);
    arguments.cross_module_incremental = true;
    let frontend = SummaryFrontend::new("app");
    let cancel = AtomicBool::new(false);

    let first = execute(&arguments, &frontend, &cancel).unwrap();
    assert_eq!(compiled_set(&first), ["app.veld"]);

    // a body-only edit leaves the foreign interface fingerprint alone
    lib.write("lib.veld", "def helper sig v1\nbody only\n");
    lib.build(&["lib.veld"]);

    let second = execute(&arguments, &frontend, &cancel).unwrap();
    assert_eq!(compiled_names(&second), Vec::<String>::new());

    // a signature edit moves it, and the depending file requeues
    lib.write("lib.veld", "def helper sig v2\n");
    lib.build(&["lib.veld"]);

    let third = execute(&arguments, &frontend, &cancel).unwrap();
    assert_eq!(compiled_names(&third), ["app.veld"]);
    assert_eq!(
        reason_of(&third, "app.veld"),
        QueueReason::ExternallyInvalidated,
    );
}

#[test]
fn verification_failures_fail_the_build_but_not_the_jobs() {
    let project = Project::new("main");
    project.write(
        "two.veld",
        "def two\nuse-member Base.init cascading\n",
    );

    let mut arguments = project.arguments(&["two.veld"]);
    arguments.verify_incremental_dependencies = true;

    let outcome = execute(
        &arguments,
        &SummaryFrontend::new("main"),
        &AtomicBool::new(false),
    )
    .unwrap();

    assert!(outcome.failures.is_empty());
    assert!(!outcome.is_success());

    let (_, verification) = &outcome.verifications[0];
    assert!(verification
        .diagnostics
        .iter()
        .any(|diagnostic| diagnostic.message.contains("unexpected")));
}
