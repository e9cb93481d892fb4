//! Contains the definition of [`Identifier`], the interned immutable byte
//! string used for every name that flows through the dependency graph.
//!
//! Two identifiers compare by identity: interning the same text twice yields
//! the same handle, so equality and hashing are integer operations. The
//! empty string is the distinguished identifier
//! [`Identifier::EMPTY`], which always has index 0.
//!
//! Identifier *ordering* compares the interned text instead of the index, so
//! that traversals sorted by identifier are deterministic across processes
//! regardless of interning order. The two notions agree on equality because
//! the interner deduplicates.

use std::fmt::{Debug, Display};

use lazy_static::lazy_static;
use parking_lot::RwLock;
use veldc_stable_hash::{StableHash, StableHasher};

struct Interner {
    ids: veldc_hash::HashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

impl Interner {
    fn new() -> Self {
        let mut interner =
            Self { ids: veldc_hash::HashMap::default(), strings: Vec::new() };

        // index 0 is reserved for the empty identifier
        interner.ids.insert("", 0);
        interner.strings.push("");

        interner
    }
}

lazy_static! {
    static ref INTERNER: RwLock<Interner> = RwLock::new(Interner::new());
}

/// An interned, immutable string handle.
///
/// The handle is a plain index into the process-wide interner; copying it is
/// free and comparing two handles compares the indices.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier(u32);

impl Identifier {
    /// The distinguished empty identifier, index 0.
    pub const EMPTY: Self = Self(0);

    /// Interns the given text and returns its handle.
    ///
    /// Interning the same text twice returns the same handle.
    #[must_use]
    pub fn new(text: impl AsRef<str>) -> Self {
        let text = text.as_ref();

        if text.is_empty() {
            return Self::EMPTY;
        }

        if let Some(&id) = INTERNER.read().ids.get(text) {
            return Self(id);
        }

        let mut interner = INTERNER.write();

        // another thread may have interned it between the two locks
        if let Some(&id) = interner.ids.get(text) {
            return Self(id);
        }

        let leaked: &'static str = Box::leak(text.to_owned().into_boxed_str());
        let id = u32::try_from(interner.strings.len())
            .expect("interner exhausted the 32-bit index space");

        interner.ids.insert(leaked, id);
        interner.strings.push(leaked);

        Self(id)
    }

    /// Returns the interned text.
    #[must_use]
    pub fn as_str(self) -> &'static str { INTERNER.read().strings[self.0 as usize] }

    /// Returns whether this is the empty identifier.
    #[must_use]
    pub const fn is_empty(self) -> bool { self.0 == 0 }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.0 == other.0 {
            return std::cmp::Ordering::Equal;
        }

        self.as_str().cmp(other.as_str())
    }
}

impl StableHash for Identifier {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        // the handle index is process-local; only the text is stable
        self.as_str().stable_hash(hasher);
    }
}

impl Debug for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identifier({:?})", self.as_str())
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.as_str(), f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interning_deduplicates() {
        assert_eq!(Identifier::new("tick"), Identifier::new("tick"));
        assert_ne!(Identifier::new("tick"), Identifier::new("tock"));
    }

    #[test]
    fn empty_is_identifier_zero() {
        assert_eq!(Identifier::new(""), Identifier::EMPTY);
        assert!(Identifier::EMPTY.is_empty());
        assert_eq!(Identifier::EMPTY.as_str(), "");
    }

    #[test]
    fn ordering_follows_the_text() {
        let mut names =
            vec![Identifier::new("zeta"), Identifier::new("alpha")];
        names.sort();

        assert_eq!(names[0].as_str(), "alpha");
        assert_eq!(names[1].as_str(), "zeta");
    }

    #[test]
    fn stable_hash_matches_the_text() {
        assert_eq!(
            veldc_stable_hash::fingerprint(&Identifier::new("name")),
            veldc_stable_hash::fingerprint("name"),
        );
    }
}
