//! Contains the definition of [`DependencyKey`] and its component
//! enumerations.

use std::fmt::Display;

use veldc_intern::Identifier;
use veldc_stable_hash::{StableHash, StableHasher};

/// What kind of entity a dependency node refers to.
///
/// Each kind defines the meaning of the `(context, name)` identifier pair of
/// the key that carries it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumCount,
    strum::FromRepr,
)]
#[repr(u8)]
pub enum NodeKind {
    /// A top-level name; `context` is empty, `name` is the name.
    TopLevel = 0,

    /// A nominal type; `context` is the type, `name` is empty.
    Nominal = 1,

    /// Any member of a type that a dependent may acquire; `context` is the
    /// type, `name` is empty. Sensitive to additions and removals on the
    /// type.
    PotentialMember = 2,

    /// A specific member of a type; `context` is the type, `name` is the
    /// member.
    Member = 3,

    /// A name looked up dynamically; `context` is empty, `name` is the
    /// name.
    DynamicLookup = 4,

    /// A dependency artifact of another module; `context` is empty, `name`
    /// is the artifact path.
    ExternalDepend = 5,

    /// The distinguished node a source file contributes for itself;
    /// `context` is empty, `name` is the source path.
    SourceFileProvide = 6,
}

impl StableHash for NodeKind {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        (*self as u8).stable_hash(hasher);
    }
}

/// Which aspect of an entity a node refers to.
///
/// The interface aspect covers everything a dependent can observe; the
/// implementation aspect covers the rest (bodies of non-inlinable
/// functions, the raw file content).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumCount,
    strum::FromRepr,
)]
#[repr(u8)]
pub enum Aspect {
    /// The externally visible surface of the entity.
    Interface = 0,

    /// The parts of the entity no dependent can observe.
    Implementation = 1,
}

impl StableHash for Aspect {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        (*self as u8).stable_hash(hasher);
    }
}

/// The key identifying one dependency node: what kind of entity, which
/// aspect of it, and the `(context, name)` identifier pair whose meaning the
/// kind defines.
///
/// Either identifier may be empty; the pair as a whole is significant.
///
/// The derived ordering (kind, aspect, then identifiers by text) is the
/// deterministic traversal order used whenever keys must be visited in a
/// stable sequence, in particular by the artifact writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyKey {
    /// The kind of entity the key refers to.
    pub kind: NodeKind,

    /// The aspect of the entity the key refers to.
    pub aspect: Aspect,

    /// The context identifier; meaning depends on `kind`.
    pub context: Identifier,

    /// The name identifier; meaning depends on `kind`.
    pub name: Identifier,
}

impl DependencyKey {
    /// Creates a key for a top-level name.
    #[must_use]
    pub const fn top_level(name: Identifier) -> Self {
        Self {
            kind: NodeKind::TopLevel,
            aspect: Aspect::Interface,
            context: Identifier::EMPTY,
            name,
        }
    }

    /// Creates a key for a nominal type.
    #[must_use]
    pub const fn nominal(context: Identifier) -> Self {
        Self {
            kind: NodeKind::Nominal,
            aspect: Aspect::Interface,
            context,
            name: Identifier::EMPTY,
        }
    }

    /// Creates a key for "any member" of a nominal type.
    #[must_use]
    pub const fn potential_member(context: Identifier) -> Self {
        Self {
            kind: NodeKind::PotentialMember,
            aspect: Aspect::Interface,
            context,
            name: Identifier::EMPTY,
        }
    }

    /// Creates a key for a specific member of a nominal type.
    #[must_use]
    pub const fn member(context: Identifier, name: Identifier) -> Self {
        Self {
            kind: NodeKind::Member,
            aspect: Aspect::Interface,
            context,
            name,
        }
    }

    /// Creates a key for a dynamically looked-up name.
    #[must_use]
    pub const fn dynamic_lookup(name: Identifier) -> Self {
        Self {
            kind: NodeKind::DynamicLookup,
            aspect: Aspect::Interface,
            context: Identifier::EMPTY,
            name,
        }
    }

    /// Creates a key for a dependency artifact of another module.
    #[must_use]
    pub const fn external(path: Identifier) -> Self {
        Self {
            kind: NodeKind::ExternalDepend,
            aspect: Aspect::Interface,
            context: Identifier::EMPTY,
            name: path,
        }
    }

    /// Creates the key of the distinguished node a source file contributes
    /// for itself.
    #[must_use]
    pub const fn source_file_provide(
        source_path: Identifier,
        aspect: Aspect,
    ) -> Self {
        Self {
            kind: NodeKind::SourceFileProvide,
            aspect,
            context: Identifier::EMPTY,
            name: source_path,
        }
    }

    /// Returns the same key with the given aspect.
    #[must_use]
    pub const fn with_aspect(mut self, aspect: Aspect) -> Self {
        self.aspect = aspect;
        self
    }
}

impl StableHash for DependencyKey {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        self.kind.stable_hash(hasher);
        self.aspect.stable_hash(hasher);
        self.context.stable_hash(hasher);
        self.name.stable_hash(hasher);
    }
}

impl Display for DependencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            NodeKind::TopLevel => write!(f, "top-level `{}`", self.name),
            NodeKind::Nominal => write!(f, "nominal `{}`", self.context),
            NodeKind::PotentialMember => {
                write!(f, "potential member of `{}`", self.context)
            }
            NodeKind::Member => {
                write!(f, "member `{}.{}`", self.context, self.name)
            }
            NodeKind::DynamicLookup => {
                write!(f, "dynamic member `{}`", self.name)
            }
            NodeKind::ExternalDepend => {
                write!(f, "external `{}`", self.name)
            }
            NodeKind::SourceFileProvide => {
                write!(f, "source file `{}`", self.name)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use strum::EnumCount;

    use super::*;

    #[test]
    fn identifier_pair_is_significant() {
        let base = Identifier::new("Base");
        let init = Identifier::new("init");

        assert_ne!(
            DependencyKey::member(base, init),
            DependencyKey::member(init, base),
        );
        assert_ne!(
            DependencyKey::top_level(init),
            DependencyKey::dynamic_lookup(init),
        );
    }

    #[test]
    fn kind_fits_the_three_bit_record_field() {
        assert!(NodeKind::COUNT <= 8);
        assert!(Aspect::COUNT <= 2);
    }

    #[test]
    fn ordering_is_stable_across_interning_order() {
        // interned in reverse of their textual order on purpose
        let zeta = DependencyKey::top_level(Identifier::new("zeta"));
        let alpha = DependencyKey::top_level(Identifier::new("alpha"));

        assert!(alpha < zeta);
    }
}
