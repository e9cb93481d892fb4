//! Compiler-provided dependency entries awaiting a matching expectation.

use veldc_hash::HashMap;

use crate::expectation::{Kind, Scope};

/// The fulfillment state of an [`Obligation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Not yet paired with an expectation.
    Owed,

    /// Satisfied by a matching expectation.
    Fulfilled,

    /// Paired with an expectation whose additional requirements did not
    /// pass.
    Failed,
}

/// One entry the front end run left in the tracker, awaiting verification.
///
/// All obligations begin owed; an expectation moves each to fulfilled or
/// failed exactly once, and whatever is still owed at termination is
/// diagnosed as unexpected.
#[derive(Debug, Clone)]
pub struct Obligation {
    /// The composite lookup key (the text a matching expectation carries
    /// in its braces).
    pub key: String,

    /// The entry's own name; what the diagnostic prints when it differs
    /// from the key.
    pub name: String,

    /// The kind of dependency entry.
    pub kind: Kind,

    /// Whether the recorded dependency cascades.
    pub scope: Scope,

    state: State,
}

impl Obligation {
    /// Creates an owed obligation.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is [`Kind::Negative`]; only expectations can be
    /// negative.
    #[must_use]
    pub fn new(key: String, name: String, kind: Kind, scope: Scope) -> Self {
        assert!(kind != Kind::Negative, "cannot form a negative obligation");

        Self { key, name, kind, scope, state: State::Owed }
    }

    /// Whether the obligation still awaits an expectation.
    #[must_use]
    pub fn is_owed(&self) -> bool { self.state == State::Owed }

    /// Marks the obligation satisfied.
    pub fn fulfill(&mut self) {
        debug_assert!(
            self.state == State::Owed,
            "cannot fulfill an obligation more than once"
        );
        self.state = State::Fulfilled;
    }

    /// Marks the obligation matched-but-rejected.
    pub fn fail(&mut self) {
        debug_assert!(
            self.state == State::Owed,
            "cannot fail an obligation more than once"
        );
        self.state = State::Failed;
    }
}

/// Obligations indexed by `(key, kind)`, preserving insertion order for
/// deterministic diagnosis.
#[derive(Debug, Default)]
pub struct ObligationMap {
    entries: Vec<Obligation>,
    index: HashMap<(String, Kind), usize>,
}

impl ObligationMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Inserts an obligation; the first entry for a `(key, kind)` pair
    /// wins, matching how duplicate tracker entries collapse.
    pub fn insert(&mut self, obligation: Obligation) {
        let composite = (obligation.key.clone(), obligation.kind);

        if self.index.contains_key(&composite) {
            return;
        }

        self.index.insert(composite, self.entries.len());
        self.entries.push(obligation);
    }

    /// Finds the owed obligation for an expectation's key and kind.
    pub fn find_owed(
        &mut self,
        key: &str,
        kind: Kind,
    ) -> Option<&mut Obligation> {
        let index = *self.index.get(&(key.to_owned(), kind))?;
        let obligation = &mut self.entries[index];

        obligation.is_owed().then_some(obligation)
    }

    /// Iterates the obligations still owed, in insertion order.
    pub fn owed_mut(&mut self) -> impl Iterator<Item = &mut Obligation> + '_ {
        self.entries.iter_mut().filter(|obligation| obligation.is_owed())
    }
}
