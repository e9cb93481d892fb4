//! The incremental build loop.
//!
//! One build: load the prior module graph, classify the inputs into the
//! initial dirty set, dispatch compile jobs in parallel, integrate each
//! emitted file graph on the driver thread, requeue dependents of whatever
//! changed, and persist the updated module graph.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
};

use thiserror::Error;
use tracing::{debug, info, warn};
use veldc_depend::{ReferencedNameTracker, SourceFileDepGraph};
use veldc_frontend::{CompileFailure, Frontend};
use veldc_hash::{HashMap, HashSet};
use veldc_intern::Identifier;
use veldc_module_graph::{
    FileId, IntegrateError, ModuleDepGraph, QueueReason,
};
use veldc_source_file::SourceFile;
use veldc_verify::Verification;

use crate::{
    args::Arguments, artifact_io::write_artifact,
    output_file_map::OutputFileMap,
};

/// An error that aborts the whole build (as opposed to failing one job).
#[derive(Debug, Error)]
pub enum BuildError {
    /// An input file could not be loaded.
    #[error(transparent)]
    Source(#[from] veldc_source_file::Error),

    /// The output file map could not be loaded.
    #[error(transparent)]
    OutputMap(#[from] crate::output_file_map::Error),

    /// Integration detected an internal inconsistency; this is a compiler
    /// bug, not a user error.
    #[error("internal error: {0}")]
    Internal(#[from] IntegrateError),

    /// The worker pool could not be built.
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The module graph could not be persisted.
    #[error("failed to persist `{path}`: {source}")]
    Persist {
        /// The artifact path that failed.
        path: PathBuf,

        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Verifier fix-its could not be written back.
    #[error("failed to apply fix-its to `{path}`: {source}")]
    FixIt {
        /// The source path that failed.
        path: PathBuf,

        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// What one finished build looks like.
#[derive(Debug)]
pub struct BuildOutcome {
    /// The files that compiled, in completion order, each with the reason
    /// it was queued.
    pub compiled: Vec<(FileId, QueueReason)>,

    /// The files whose jobs failed, with the front end's message.
    pub failures: Vec<(FileId, CompileFailure)>,

    /// Per-file verification results, present when
    /// `-verify-incremental-dependencies` is set. The source is captured
    /// as verified, before any fix-its were applied.
    pub verifications: Vec<(SourceFile, Verification)>,

    /// The module graph at the end of the build.
    pub graph: ModuleDepGraph,
}

impl BuildOutcome {
    /// Whether every job succeeded and every verification came out clean.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
            && self
                .verifications
                .iter()
                .all(|(_, verification)| verification.is_clean())
    }
}

enum JobOutcome {
    Cancelled(FileId),
    Success {
        id: FileId,
        graph: SourceFileDepGraph,
        tracker: ReferencedNameTracker,
    },
    Failure {
        id: FileId,
        failure: CompileFailure,
    },
}

fn file_id_of(source: &SourceFile) -> FileId {
    FileId(Identifier::new(source.path().display().to_string()))
}

/// The current interface fingerprint of a foreign artifact, or `None` when
/// it cannot be read — which the caller treats as "changed".
fn external_fingerprint(path: &Path) -> Option<u64> {
    let bytes = std::fs::read(path).ok()?;

    if let Ok(module) = veldc_artifact::read_module_graph(&bytes) {
        return Some(module.interface_fingerprint());
    }

    veldc_artifact::read_source_file_graph(&bytes)
        .ok()
        .map(|graph| graph.interface_hash())
}

/// Runs one build.
///
/// The module graph lives on this thread for the whole build; workers only
/// compile and hand their file graphs back over the completion channel, so
/// every `integrate` call is single-threaded.
///
/// # Errors
///
/// Returns a [`BuildError`] for whole-build failures. Per-job failures do
/// not abort the build; they are reported in the outcome.
#[allow(clippy::too_many_lines)]
pub fn execute(
    arguments: &Arguments,
    frontend: &dyn Frontend,
    cancel: &AtomicBool,
) -> Result<BuildOutcome, BuildError> {
    let output_map = match &arguments.output_file_map {
        Some(path) => OutputFileMap::load(path)?,
        None => OutputFileMap::empty(),
    };
    let module_artifact_path =
        output_map.module_dependency_artifact(&arguments.module_name);

    // step 1: the prior graph, if this is an incremental build
    let mut graph = if arguments.incremental {
        match veldc_artifact::read_module_graph_from_path(
            &module_artifact_path,
        ) {
            Ok(graph) => graph,
            Err(veldc_artifact::ReadError::Io(error))
                if error.kind() == std::io::ErrorKind::NotFound =>
            {
                ModuleDepGraph::new()
            }
            Err(error) => {
                // a malformed artifact is treated as missing
                warn!(%error, "discarding prior module graph");
                ModuleDepGraph::new()
            }
        }
    } else {
        ModuleDepGraph::new()
    };

    // step 2: classify the inputs
    let mut sources: HashMap<FileId, SourceFile> = HashMap::default();
    let mut artifact_paths: HashMap<FileId, PathBuf> = HashMap::default();
    let mut input_ids: HashSet<FileId> = HashSet::default();
    let mut queue_log: HashMap<FileId, QueueReason> = HashMap::default();

    for input in &arguments.inputs {
        let source = SourceFile::load(input)?;
        let id = file_id_of(&source);

        let artifact_path = output_map.dependency_artifact(source.path());
        let artifact_ident =
            Identifier::new(artifact_path.display().to_string());

        input_ids.insert(id);
        artifact_paths.insert(id, artifact_path);

        match graph.file(id) {
            None => {
                graph.register_file(id, artifact_ident);
                queue_log.insert(id, QueueReason::Initial);
            }
            Some(record)
                if record.content_hash
                    != Some(source.content_fingerprint()) =>
            {
                graph.mark_queued(id, QueueReason::LocallyInvalidated);
                queue_log.insert(id, QueueReason::LocallyInvalidated);
            }
            Some(_) => {}
        }

        sources.insert(id, source);
    }

    // inputs that vanished since the prior build: their provides are gone,
    // which is a change to every one of their keys
    let removed: Vec<FileId> = graph
        .files()
        .map(|(id, _)| id)
        .filter(|id| !input_ids.contains(id))
        .collect();

    let mut removed_keys = Vec::new();
    for id in removed {
        if let Some(record) = graph.remove_file(id) {
            removed_keys
                .extend(record.provides.iter().map(|(key, _)| *key));
        }
    }

    // step 2, externally-invalidated: foreign artifacts whose interface
    // fingerprint moved since we last built against them
    if arguments.cross_module_incremental {
        for external in graph.externals() {
            let current = external_fingerprint(Path::new(external.as_str()));
            let changed = match (graph.external_hash(external), current) {
                (Some(previous), Some(current)) => previous != current,
                // no baseline or unreadable artifact: assume changed
                _ => true,
            };

            if !changed {
                continue;
            }

            for id in graph.invalidated_by_external(external) {
                if graph.mark_queued(id, QueueReason::ExternallyInvalidated)
                {
                    queue_log
                        .insert(id, QueueReason::ExternallyInvalidated);
                }
            }
        }
    }

    // step 3: dependents of everything already known to have changed
    for id in graph.find_dependents(&removed_keys) {
        if graph.mark_queued(id, QueueReason::Dependencies) {
            queue_log.insert(id, QueueReason::Dependencies);
        }
    }

    // step 4: dispatch and integrate until the queue drains
    let threads = arguments.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    });
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;

    let mut compiled = Vec::new();
    let mut failures = Vec::new();
    let mut trackers: Vec<(FileId, ReferencedNameTracker)> = Vec::new();

    // files already dispatched in this build; a job sees the current text
    // of every source, so nothing it produced goes stale mid-build and
    // re-dispatching a finished file would only repeat its work
    let mut scheduled: HashSet<FileId> = HashSet::default();

    let sources_ref = &sources;

    // the dispatch loop stays on the driver thread; only compile jobs run
    // on the pool
    pool.in_place_scope(|scope| -> Result<(), BuildError> {
        let (sender, receiver) = mpsc::channel::<JobOutcome>();
        let mut in_flight = 0usize;

        loop {
            for (id, reason) in graph.queued_files() {
                if arguments.show_incremental {
                    info!(file = %id, "{reason}");
                }

                graph.mark_compiling(id);
                scheduled.insert(id);
                queue_log.entry(id).or_insert(reason);

                let sender = sender.clone();
                let source = &sources_ref[&id];
                let artifact_ident = Identifier::new(
                    artifact_paths[&id].display().to_string(),
                );
                let show_lifecycle = arguments.show_job_lifecycle;

                in_flight += 1;
                scope.spawn(move |_| {
                    // cooperative cancellation at the job boundary
                    if cancel.load(Ordering::Acquire) {
                        let _ = sender.send(JobOutcome::Cancelled(id));
                        return;
                    }

                    if show_lifecycle {
                        info!(file = %id, "job started");
                    }

                    let outcome = match frontend.compile(source) {
                        Ok(current) => JobOutcome::Success {
                            id,
                            graph: SourceFileDepGraph::build(
                                id.path(),
                                artifact_ident,
                                current.interface_hash,
                                current.content_hash,
                                &current.definitions,
                                &current.tracker,
                            ),
                            tracker: current.tracker,
                        },
                        Err(failure) => JobOutcome::Failure { id, failure },
                    };

                    if show_lifecycle {
                        info!(file = %id, "job finished");
                    }

                    let _ = sender.send(outcome);
                });
            }

            if in_flight == 0 {
                break;
            }

            let outcome =
                receiver.recv().expect("workers outlive the dispatch loop");
            in_flight -= 1;

            match outcome {
                JobOutcome::Cancelled(id) => {
                    debug!(file = %id, "job cancelled before it started");
                    graph.mark_failed(id);
                }

                JobOutcome::Failure { id, failure } => {
                    graph.mark_failed(id);
                    failures.push((id, failure));
                }

                JobOutcome::Success { id, graph: file_graph, tracker } => {
                    // an artifact finishing after cancellation is discarded
                    if cancel.load(Ordering::Acquire) {
                        debug!(file = %id, "discarding artifact of cancelled build");
                        graph.mark_failed(id);
                        continue;
                    }

                    if arguments.emit_dependencies {
                        let bytes =
                            veldc_artifact::write_source_file_graph(
                                &file_graph,
                            );

                        if let Err(error) =
                            write_artifact(&artifact_paths[&id], &bytes)
                        {
                            // a persistent write failure fails the job
                            graph.mark_failed(id);
                            failures.push((id, CompileFailure::Rejected {
                                path: artifact_paths[&id].clone(),
                                line: 0,
                                message: format!(
                                    "failed to write dependency artifact: \
                                     {error}"
                                ),
                            }));
                            continue;
                        }
                    }

                    let changed = graph.integrate(&file_graph)?;
                    compiled.push((
                        id,
                        queue_log
                            .get(&id)
                            .copied()
                            .unwrap_or(QueueReason::Initial),
                    ));

                    if arguments.verify_incremental_dependencies {
                        trackers.push((id, tracker));
                    }

                    if !changed.is_empty() {
                        for dependent in graph.find_dependents(&changed) {
                            if !scheduled.contains(&dependent)
                                && graph.mark_queued(
                                    dependent,
                                    QueueReason::Dependencies,
                                )
                            {
                                queue_log.insert(
                                    dependent,
                                    QueueReason::Dependencies,
                                );
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    })?;

    // verification runs after the build so it sees the final trackers
    let mut verifications = Vec::new();
    for (id, tracker) in trackers {
        let source = &sources[&id];
        let verification = veldc_verify::verify_file(source, &tracker);

        if arguments.apply_fixits && !verification.is_clean() {
            let rewritten = verification.apply_fix_its(source.content());
            std::fs::write(source.path(), rewritten).map_err(|error| {
                BuildError::FixIt { path: id.path().as_str().into(), source: error }
            })?;
        }

        verifications.push((source.clone(), verification));
    }

    // refresh the external baselines for the next build
    if arguments.cross_module_incremental {
        for external in graph.externals() {
            if let Some(fingerprint) =
                external_fingerprint(Path::new(external.as_str()))
            {
                graph.record_external_hash(external, fingerprint);
            }
        }
    }

    // persist the updated module graph
    if arguments.incremental {
        let bytes = veldc_artifact::write_module_graph(&graph);
        write_artifact(&module_artifact_path, &bytes).map_err(|source| {
            BuildError::Persist { path: module_artifact_path.clone(), source }
        })?;
    }

    Ok(BuildOutcome { compiled, failures, verifications, graph })
}
