//! The source/sink request dichotomy.
//!
//! Name resolution inside the front end is organized as tracked requests
//! evaluated against an [`Evaluator`]. A tracked request participates in
//! exactly one of two roles: the *source* role returns the source file
//! currently being compiled, and the *sink* role records one dependency
//! edge into the active referenced-name tracker. Sink evaluations are
//! memoized by the request's stable fingerprint, so re-resolving the same
//! name is free and records nothing twice.

use veldc_depend::ReferencedNameTracker;
use veldc_hash::HashSet;
use veldc_intern::Identifier;
use veldc_source_file::SourceFile;
use veldc_stable_hash::{fingerprint, StableHash, StableHasher};

/// A sink-role request: evaluating it records one dependency edge.
pub trait SinkRequest: StableHash {
    /// Writes the edge this request stands for into the tracker.
    fn record(&self, tracker: &mut ReferencedNameTracker);
}

/// The evaluation context of one compile: the active source file (the lone
/// source-role request) and the tracker that sink requests write into.
#[derive(Debug)]
pub struct Evaluator<'s> {
    source: &'s SourceFile,
    tracker: ReferencedNameTracker,
    evaluated: HashSet<u64>,
}

impl<'s> Evaluator<'s> {
    /// Creates an evaluator for one compile of the given file.
    #[must_use]
    pub fn new(source: &'s SourceFile) -> Self {
        Self {
            source,
            tracker: ReferencedNameTracker::new(),
            evaluated: HashSet::default(),
        }
    }

    /// The source-role request: the file currently being compiled.
    #[must_use]
    pub const fn active_source(&self) -> &'s SourceFile { self.source }

    /// Evaluates a sink-role request, recording its edge on first
    /// evaluation and memoizing it away afterwards.
    pub fn sink<R: SinkRequest>(&mut self, request: &R) {
        if self.evaluated.insert(fingerprint(request)) {
            request.record(&mut self.tracker);
        }
    }

    /// Consumes the evaluator and returns the populated tracker.
    #[must_use]
    pub fn into_tracker(self) -> ReferencedNameTracker { self.tracker }
}

macro_rules! sink_request {
    (
        $(#[$doc:meta])*
        $name:ident { $($field:ident: $ty:ty),* $(,)? }
        |$this:ident, $tracker:ident| $body:expr
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            $(
                #[allow(missing_docs)]
                pub $field: $ty,
            )*
        }

        impl StableHash for $name {
            fn stable_hash(&self, hasher: &mut StableHasher) {
                stringify!($name).stable_hash(hasher);
                $(self.$field.stable_hash(hasher);)*
            }
        }

        impl SinkRequest for $name {
            fn record(&self, tracker: &mut ReferencedNameTracker) {
                let $this = self;
                let $tracker = tracker;
                $body
            }
        }
    };
}

sink_request! {
    /// A reference to a top-level name.
    TopLevelReference { name: Identifier, cascades: bool }
    |this, tracker| tracker.add_top_level_name(this.name, this.cascades)
}

sink_request! {
    /// A reference to a specific member of a type.
    MemberReference {
        context: Identifier,
        name: Identifier,
        cascades: bool,
    }
    |this, tracker| tracker.add_used_member(this.context, this.name, this.cascades)
}

sink_request! {
    /// A superclass or conformance relation: a dependency on any member
    /// the type may provide.
    PotentialMemberReference { context: Identifier, cascades: bool }
    |this, tracker| tracker.add_potential_member(this.context, this.cascades)
}

sink_request! {
    /// A dynamically looked-up name.
    DynamicLookupReference { name: Identifier, cascades: bool }
    |this, tracker| tracker.add_dynamic_lookup_name(this.name, this.cascades)
}

sink_request! {
    /// A name the file declares at file scope.
    ProvidedName { name: Identifier }
    |this, tracker| tracker.add_provides(this.name)
}

sink_request! {
    /// A reference to the dependency artifact of another module.
    ExternalReference { path: Identifier }
    |this, tracker| tracker.add_external_depend(this.path)
}
