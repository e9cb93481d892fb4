//! Contains the definition of [`ModuleDepGraph`], the union of every
//! source file's dependency graph, which answers the driver's one question:
//! after this change, who must rebuild?

use enum_as_inner::EnumAsInner;
use thiserror::Error;
use tracing::debug;
use veldc_depend::{DependencyKey, NodeKind, SourceFileDepGraph};
use veldc_hash::{HashMap, HashSet};
use veldc_intern::Identifier;

#[cfg(test)]
mod test;

/// Identifies one source file of the module by its interned canonical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub Identifier);

impl FileId {
    /// Returns the canonical path of the file.
    #[must_use]
    pub const fn path(self) -> Identifier { self.0 }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Why a file entered the compile queue; surfaced verbatim by
/// `-driver-show-incremental`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueReason {
    /// No prior record of the file exists.
    Initial,

    /// The file's content hash differs from the prior build.
    LocallyInvalidated,

    /// A foreign artifact the file depends on changed its interface hash.
    ExternallyInvalidated,

    /// A definition the file uses changed in this build.
    Dependencies,
}

impl std::fmt::Display for QueueReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => f.write_str("initial"),
            Self::LocallyInvalidated => f.write_str("locally invalidated"),
            Self::ExternallyInvalidated => f.write_str(
                "queuing because of incremental external dependencies",
            ),
            Self::Dependencies => {
                f.write_str("queuing because of dependencies")
            }
        }
    }
}

/// The compile-state machine of one source file.
///
/// `UpToDate -> Queued -> Compiling -> {Succeeded, Failed}`; a success may
/// re-queue dependents, a failure leaves the file dirty for the next build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumAsInner)]
pub enum CompileState {
    /// The prior artifact is still valid.
    UpToDate,

    /// The file waits for a compile job, for the recorded reason.
    Queued(QueueReason),

    /// A compile job is running for the file.
    Compiling,

    /// The last job succeeded and its graph was integrated.
    Succeeded,

    /// The last job failed; the file stays dirty.
    Failed,
}

/// Everything the module graph remembers about one source file: the provides
/// set of its last successful compile, the uses its arcs recorded, the two
/// hashes, and where its artifact lives.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// The artifact path the file's dependency graph is written to.
    pub artifact_path: Identifier,

    /// The interface hash of the last integrated revision.
    pub interface_hash: Option<u64>,

    /// The content hash of the last integrated revision.
    pub content_hash: Option<u64>,

    /// The keys the file provides, with per-entity fingerprints where the
    /// entity has one.
    pub provides: Vec<(DependencyKey, Option<u64>)>,

    /// The keys the file uses, with the cascade flag of each arc.
    pub uses: Vec<(DependencyKey, bool)>,

    /// Foreign artifact paths the file depends on.
    pub externals: Vec<Identifier>,

    /// Where the file is in the compile-state machine.
    pub state: CompileState,
}

impl FileRecord {
    fn empty(artifact_path: Identifier) -> Self {
        Self {
            artifact_path,
            interface_hash: None,
            content_hash: None,
            provides: Vec::new(),
            uses: Vec::new(),
            externals: Vec::new(),
            state: CompileState::Queued(QueueReason::Initial),
        }
    }
}

/// An integration failure that indicates a bug rather than a user error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrateError {
    /// Two nodes of one incoming graph claimed the same key with different
    /// fingerprints.
    #[error(
        "hash inconsistency: {key} integrated with fingerprints \
         {lhs:#018x} and {rhs:#018x}"
    )]
    HashInconsistency {
        /// The doubly-defined key.
        key: DependencyKey,

        /// The first fingerprint observed for the key.
        lhs: u64,

        /// The conflicting fingerprint.
        rhs: u64,
    },
}

/// The disjoint union of all source-file dependency graphs, plus the
/// indices that make invalidation queries fast: a map from dependency key
/// to the files using it, the set of incremental external dependencies, and
/// each file's prior hashes.
///
/// The graph is owned by the driver thread; worker jobs hand their emitted
/// file graphs over a channel and never touch it, so integration runs
/// single-threaded and needs no locking.
#[derive(Debug, Clone, Default)]
pub struct ModuleDepGraph {
    files: HashMap<FileId, FileRecord>,

    /// insertion order of `files`, for deterministic reporting
    file_order: Vec<FileId>,

    /// dependency key -> files with an arc to it, in insertion order
    uses_by_def: HashMap<DependencyKey, Vec<(FileId, bool)>>,

    /// foreign artifact path -> files depending on it, in insertion order
    files_by_external: HashMap<Identifier, Vec<FileId>>,

    /// the interface fingerprint each foreign artifact had when this module
    /// last built against it
    external_hashes: HashMap<Identifier, u64>,
}

impl ModuleDepGraph {
    /// Creates an empty module graph.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Returns the record of the given file, if the graph has one.
    #[must_use]
    pub fn file(&self, id: FileId) -> Option<&FileRecord> {
        self.files.get(&id)
    }

    /// Iterates all known files in insertion order.
    pub fn files(&self) -> impl Iterator<Item = (FileId, &FileRecord)> + '_ {
        self.file_order.iter().map(move |id| (*id, &self.files[id]))
    }

    /// Iterates all known files in deterministic (path-sorted) order; this
    /// is the traversal the artifact writer uses.
    #[must_use]
    pub fn files_sorted(&self) -> Vec<(FileId, &FileRecord)> {
        let mut files: Vec<_> = self.files.iter().map(|(id, record)| (*id, record)).collect();
        files.sort_unstable_by_key(|(id, _)| *id);
        files
    }

    /// The set of incremental external dependencies of the whole module, in
    /// deterministic order.
    #[must_use]
    pub fn externals(&self) -> Vec<Identifier> {
        let mut externals: Vec<_> =
            self.files_by_external.keys().copied().collect();
        externals.sort_unstable();
        externals
    }

    /// Registers a file that has no prior record, queueing it as initial.
    pub fn register_file(&mut self, id: FileId, artifact_path: Identifier) {
        if !self.files.contains_key(&id) {
            self.files.insert(id, FileRecord::empty(artifact_path));
            self.file_order.push(id);
        }
    }

    /// Restores a file record decoded from a prior module artifact.
    pub fn restore_file(&mut self, id: FileId, record: FileRecord) {
        for (key, cascading) in &record.uses {
            self.uses_by_def.entry(*key).or_default().push((id, *cascading));
        }
        for external in &record.externals {
            self.files_by_external.entry(*external).or_default().push(id);
        }

        if self.files.insert(id, record).is_none() {
            self.file_order.push(id);
        }
    }

    /// Removes a file from the graph entirely, for inputs that vanished
    /// from the build.
    ///
    /// The caller treats every key the file provided as changed.
    pub fn remove_file(&mut self, id: FileId) -> Option<FileRecord> {
        let record = self.files.remove(&id)?;
        self.file_order.retain(|file| *file != id);

        let uses = record.uses.clone();
        let externals = record.externals.clone();
        self.remove_use_index_entries(id, &uses);
        self.remove_external_index_entries(id, &externals);

        Some(record)
    }

    /// Moves a file to the queued state with the given reason, unless it is
    /// already queued or compiling.
    ///
    /// Returns whether the file actually entered the queue.
    pub fn mark_queued(&mut self, id: FileId, reason: QueueReason) -> bool {
        let Some(record) = self.files.get_mut(&id) else { return false };

        match record.state {
            CompileState::Queued(_) | CompileState::Compiling => false,
            CompileState::UpToDate
            | CompileState::Succeeded
            | CompileState::Failed => {
                record.state = CompileState::Queued(reason);
                true
            }
        }
    }

    /// Moves a queued file to the compiling state.
    pub fn mark_compiling(&mut self, id: FileId) {
        if let Some(record) = self.files.get_mut(&id) {
            debug_assert!(record.state.is_queued());
            record.state = CompileState::Compiling;
        }
    }

    /// Records a failed compile job; the file stays dirty and nothing is
    /// integrated.
    pub fn mark_failed(&mut self, id: FileId) {
        if let Some(record) = self.files.get_mut(&id) {
            record.state = CompileState::Failed;
        }
    }

    fn remove_use_index_entries(&mut self, id: FileId, uses: &[(DependencyKey, bool)]) {
        for (key, _) in uses {
            if let Some(users) = self.uses_by_def.get_mut(key) {
                users.retain(|(user, _)| *user != id);
                if users.is_empty() {
                    self.uses_by_def.remove(key);
                }
            }
        }
    }

    fn remove_external_index_entries(
        &mut self,
        id: FileId,
        externals: &[Identifier],
    ) {
        for external in externals {
            if let Some(users) = self.files_by_external.get_mut(external) {
                users.retain(|user| *user != id);
                if users.is_empty() {
                    self.files_by_external.remove(external);
                }
            }
        }
    }

    /// Merges a freshly emitted source-file graph into the module graph and
    /// returns the set of changed definition keys, in deterministic order.
    ///
    /// The changed set is the symmetric difference of the file's provides
    /// set against the prior revision, plus every surviving key whose
    /// fingerprint moved. Definitions without a self-stable fingerprint are
    /// considered changed exactly when the file's interface hash changed,
    /// so re-integrating an identical graph is a no-op. Adding or removing
    /// a member of a type also marks the type's potential-member key, so
    /// dependents on "any member of `T`" see it.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrateError::HashInconsistency`] if the incoming graph
    /// carries two different fingerprints for one key.
    pub fn integrate(
        &mut self,
        graph: &SourceFileDepGraph,
    ) -> Result<Vec<DependencyKey>, IntegrateError> {
        let id = FileId(graph.source_path());
        self.register_file(id, graph.artifact_path());

        let mut new_provides: Vec<(DependencyKey, Option<u64>)> = Vec::new();
        let mut seen: HashMap<DependencyKey, Option<u64>> = HashMap::default();

        for node in graph.provides() {
            match seen.get(&node.key()) {
                Some(&prior) => {
                    if let (Some(lhs), Some(rhs)) = (prior, node.fingerprint())
                    {
                        if lhs != rhs {
                            return Err(IntegrateError::HashInconsistency {
                                key: node.key(),
                                lhs,
                                rhs,
                            });
                        }
                    }
                }
                None => {
                    seen.insert(node.key(), node.fingerprint());
                    new_provides.push((node.key(), node.fingerprint()));
                }
            }
        }
        new_provides.sort_unstable_by_key(|(key, _)| *key);

        let record = &self.files[&id];
        let interface_changed =
            record.interface_hash != Some(graph.interface_hash());

        let old_provides: HashMap<DependencyKey, Option<u64>> =
            record.provides.iter().copied().collect();
        let new_keys: HashSet<DependencyKey> =
            new_provides.iter().map(|(key, _)| *key).collect();

        let mut changed = Vec::new();
        let mut changed_set: HashSet<DependencyKey> = HashSet::default();

        fn push_changed(
            changed: &mut Vec<DependencyKey>,
            changed_set: &mut HashSet<DependencyKey>,
            key: DependencyKey,
        ) {
            if changed_set.insert(key) {
                changed.push(key);
            }
        }

        for &(key, fingerprint) in &new_provides {
            let is_changed = match old_provides.get(&key) {
                // new definition
                None => true,
                Some(&old_fingerprint) => match (old_fingerprint, fingerprint) {
                    (Some(old), Some(new)) => old != new,
                    // no self-stable hash; fall back to the interface hash
                    _ => interface_changed,
                },
            };

            if is_changed {
                push_changed(&mut changed, &mut changed_set, key);
            }
        }

        // removal of a provides entity is a change to its key
        let mut removed: Vec<DependencyKey> = old_provides
            .keys()
            .copied()
            .filter(|key| !new_keys.contains(key))
            .collect();
        removed.sort_unstable();

        for key in removed {
            push_changed(&mut changed, &mut changed_set, key);
        }

        // member churn on a type wakes its potential-member dependents even
        // when no concrete member arc existed
        let member_churn: Vec<DependencyKey> = changed
            .iter()
            .copied()
            .filter(|key| {
                key.kind == NodeKind::Member
                    && old_provides.contains_key(key) != new_keys.contains(key)
            })
            .map(|key| DependencyKey::potential_member(key.context))
            .collect();

        for key in member_churn {
            push_changed(&mut changed, &mut changed_set, key);
        }

        // re-index the file's uses and externals
        let old_record = self.files.get_mut(&id).expect("registered above");
        let old_uses = std::mem::take(&mut old_record.uses);
        let old_externals = std::mem::take(&mut old_record.externals);
        self.remove_use_index_entries(id, &old_uses);
        self.remove_external_index_entries(id, &old_externals);

        let new_uses: Vec<(DependencyKey, bool)> = graph.uses().collect();
        for (key, cascading) in &new_uses {
            self.uses_by_def.entry(*key).or_default().push((id, *cascading));
        }
        for external in graph.externals() {
            self.files_by_external.entry(*external).or_default().push(id);
        }

        let record = self.files.get_mut(&id).expect("registered above");
        record.artifact_path = graph.artifact_path();
        record.interface_hash = Some(graph.interface_hash());
        record.content_hash = Some(graph.content_hash());
        record.provides = new_provides;
        record.uses = new_uses;
        record.externals = graph.externals().clone();
        record.state = CompileState::Succeeded;

        debug!(
            file = %id,
            changed = changed.len(),
            "integrated source-file graph"
        );

        Ok(changed)
    }

    /// Computes the transitive dependent closure of the given changed keys.
    ///
    /// Work-list BFS: every file with an arc to a changed key joins the
    /// result; if the arc cascades, the file's own provides join the work
    /// list, so invalidation keeps propagating. Each file is expanded at
    /// most once, and the result preserves discovery order so reports are
    /// deterministic.
    #[must_use]
    pub fn find_dependents(
        &self,
        changed_keys: &[DependencyKey],
    ) -> Vec<FileId> {
        let mut worklist: std::collections::VecDeque<DependencyKey> =
            changed_keys.iter().copied().collect();
        let mut queued_keys: HashSet<DependencyKey> =
            changed_keys.iter().copied().collect();

        let mut dependents = Vec::new();
        let mut dependent_set: HashSet<FileId> = HashSet::default();
        let mut cascaded: HashSet<FileId> = HashSet::default();

        while let Some(key) = worklist.pop_front() {
            let Some(users) = self.uses_by_def.get(&key) else { continue };

            for &(user, cascading) in users {
                if dependent_set.insert(user) {
                    dependents.push(user);
                }

                if cascading && cascaded.insert(user) {
                    for (provided, _) in &self.files[&user].provides {
                        if queued_keys.insert(*provided) {
                            worklist.push_back(*provided);
                        }
                    }
                }
            }
        }

        dependents
    }

    /// Returns the files whose incremental external dependencies contain
    /// the given foreign artifact path, in insertion order.
    ///
    /// Used when the foreign artifact changed its interface hash; every
    /// returned file is dirtied cascading.
    #[must_use]
    pub fn invalidated_by_external(&self, path: Identifier) -> Vec<FileId> {
        self.files_by_external.get(&path).cloned().unwrap_or_default()
    }

    /// Records the interface fingerprint observed for a foreign artifact,
    /// so the next build can tell whether it changed.
    pub fn record_external_hash(&mut self, path: Identifier, hash: u64) {
        self.external_hashes.insert(path, hash);
    }

    /// The interface fingerprint a foreign artifact had when this module
    /// last built against it.
    #[must_use]
    pub fn external_hash(&self, path: Identifier) -> Option<u64> {
        self.external_hashes.get(&path).copied()
    }

    /// The interface fingerprint of the whole module: a stable hash over
    /// every file's interface hash. Downstream modules use this to decide
    /// whether anything they can observe changed.
    #[must_use]
    pub fn interface_fingerprint(&self) -> u64 {
        let mut hasher = veldc_stable_hash::StableHasher::new();

        for (id, record) in self.files_sorted() {
            veldc_stable_hash::StableHash::stable_hash(
                id.path().as_str(),
                &mut hasher,
            );
            veldc_stable_hash::StableHash::stable_hash(
                &record.interface_hash,
                &mut hasher,
            );
        }

        hasher.finalize()
    }

    /// Returns the files currently in the failed state, in insertion
    /// order.
    #[must_use]
    pub fn failed_files(&self) -> Vec<FileId> {
        self.file_order
            .iter()
            .copied()
            .filter(|id| self.files[id].state.is_failed())
            .collect()
    }

    /// Returns the files currently queued, in insertion order, with their
    /// queue reasons.
    #[must_use]
    pub fn queued_files(&self) -> Vec<(FileId, QueueReason)> {
        self.file_order
            .iter()
            .copied()
            .filter_map(|id| {
                self.files[&id]
                    .state
                    .as_queued()
                    .map(|reason| (id, *reason))
            })
            .collect()
    }
}
