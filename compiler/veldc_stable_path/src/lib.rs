//! Contains the definition of [`StablePath`], the hierarchical,
//! location-independent identity for declarations.
//!
//! A path names a declaration by where it lives: the module at the root, a
//! chain of containers, and finally the declaration's own name component.
//! Every component folds down to a 64-bit [`PathId`] through the stable
//! hasher, so a path's identity is deterministic across processes and
//! architectures. Nothing about a path depends on host memory layout; every
//! input that contributes to the identity must itself have a stable hash
//! contract.

#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links
)]

use veldc_stable_hash::{StableHash, StableHasher};

#[cfg(test)]
mod test;

/// The kind of a single path component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Component {
    /// The root of a module; the only component with no parent.
    Module = 0,

    /// A declaration that encloses other declarations: a nominal type, an
    /// extension, a scope.
    Container = 1,

    /// A leaf declaration: a function, a variable, an associated value.
    Name = 2,
}

impl StableHash for Component {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        (*self as u8).stable_hash(hasher);
    }
}

/// The 64-bit fingerprint of a [`StablePath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId(u64);

impl PathId {
    /// The parent of every module root.
    pub const ROOT: Self = Self(0);

    /// Returns the raw 64-bit fingerprint value.
    #[must_use]
    pub const fn value(self) -> u64 { self.0 }
}

impl StableHash for PathId {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        self.0.stable_hash(hasher);
    }
}

/// A hierarchical identity for one declaration.
///
/// Construction goes exclusively through the three smart constructors
/// [`root`](Self::root), [`container`](Self::container) and
/// [`name`](Self::name); each hashes its extra data down to a single
/// `extra_hash`, so a path is always exactly three words regardless of how
/// much data identifies the declaration. Two paths are equal iff all three
/// fields are equal; their [`PathId`]s collide with cryptographic
/// probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StablePath {
    parent: PathId,
    kind: Component,
    extra_hash: u64,
}

impl StablePath {
    /// A distinguished value for hash-table slots.
    ///
    /// The tombstone is not the path of any declaration and must never be
    /// fingerprinted.
    pub const TOMBSTONE: Self = Self {
        parent: PathId(u64::MAX),
        kind: Component::Module,
        extra_hash: u64::MAX,
    };

    fn extra_hash_of<E: StableHash>(extras: &E) -> u64 {
        let mut hasher = StableHasher::new();
        extras.stable_hash(&mut hasher);
        hasher.finalize()
    }

    /// Creates the root path of a module.
    ///
    /// Pass a tuple to fold more than one value into the identity.
    #[must_use]
    pub fn root<E: StableHash>(extras: E) -> Self {
        Self {
            parent: PathId::ROOT,
            kind: Component::Module,
            extra_hash: Self::extra_hash_of(&extras),
        }
    }

    /// Creates the path of a declaration that encloses other declarations.
    #[must_use]
    pub fn container<E: StableHash>(parent: &Self, extras: E) -> Self {
        Self {
            parent: parent.fingerprint(),
            kind: Component::Container,
            extra_hash: Self::extra_hash_of(&extras),
        }
    }

    /// Creates the path of a leaf declaration.
    #[must_use]
    pub fn name<E: StableHash>(parent: &Self, extras: E) -> Self {
        Self {
            parent: parent.fingerprint(),
            kind: Component::Name,
            extra_hash: Self::extra_hash_of(&extras),
        }
    }

    /// Returns whether this is the distinguished tombstone value.
    #[must_use]
    pub fn is_tombstone(&self) -> bool { *self == Self::TOMBSTONE }

    /// Computes the 64-bit fingerprint identifying this path.
    ///
    /// The fingerprint is a function of `(parent, kind, extra_hash)` and
    /// nothing else.
    ///
    /// # Panics
    ///
    /// Panics if called on the tombstone value.
    #[must_use]
    pub fn fingerprint(&self) -> PathId {
        assert!(!self.is_tombstone(), "cannot fingerprint the tombstone path");

        let mut hasher = StableHasher::new();
        self.parent.stable_hash(&mut hasher);
        self.kind.stable_hash(&mut hasher);
        self.extra_hash.stable_hash(&mut hasher);

        PathId(hasher.finalize())
    }
}
