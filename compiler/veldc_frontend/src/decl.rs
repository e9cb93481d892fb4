//! The declaration model the stable-path builder dispatches over.
//!
//! Declaration kinds are a closed set carried as a tagged variant;
//! [`path_of`] dispatches on the tag to pick the right path component, and
//! the fingerprint helpers fold a declaration's identity and signature into
//! the per-entity hashes the dependency graph stores.

use veldc_intern::Identifier;
use veldc_stable_hash::{StableHash, StableHasher};
use veldc_stable_path::StablePath;

/// The closed set of declaration kinds the dependency graph distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DeclKind {
    /// The module itself; the root of every path.
    Module = 0,

    /// A nominal type: provides members and may be inherited from or
    /// conformed to.
    Nominal = 1,

    /// A top-level declaration that is not a type: a function or a
    /// variable.
    TopLevel = 2,

    /// A member of a nominal type.
    Member = 3,
}

impl StableHash for DeclKind {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        (*self as u8).stable_hash(hasher);
    }
}

/// One declaration as the front end describes it to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    /// What kind of declaration this is.
    pub kind: DeclKind,

    /// The name of the module the declaration lives in.
    pub module: Identifier,

    /// The enclosing nominal type, for members.
    pub context: Option<Identifier>,

    /// The declaration's own name. For [`DeclKind::Module`] this equals
    /// the module name.
    pub name: Identifier,

    /// The signature text that participates in the entity's ABI.
    pub signature: String,
}

/// Computes the stable path of a declaration, dispatching on its kind.
#[must_use]
pub fn path_of(decl: &Decl) -> StablePath {
    let module = StablePath::root(decl.module);

    match decl.kind {
        DeclKind::Module => module,

        DeclKind::Nominal => StablePath::container(&module, decl.name),

        DeclKind::TopLevel => StablePath::name(&module, decl.name),

        DeclKind::Member => {
            let context = StablePath::container(
                &module,
                decl.context.unwrap_or(Identifier::EMPTY),
            );
            StablePath::name(&context, decl.name)
        }
    }
}

/// The fingerprint of a declaration that has no members of its own: its
/// stable path plus its signature.
#[must_use]
pub fn leaf_fingerprint(decl: &Decl) -> u64 {
    let mut hasher = StableHasher::new();

    path_of(decl).fingerprint().value().stable_hash(&mut hasher);
    decl.signature.as_str().stable_hash(&mut hasher);

    hasher.finalize()
}

/// The fingerprint of a nominal type: its own signature (inheritance
/// clause, generic parameters) plus the signatures of its members in
/// deterministic order.
#[must_use]
pub fn nominal_fingerprint(decl: &Decl, members: &[Decl]) -> u64 {
    let mut hasher = StableHasher::new();

    path_of(decl).fingerprint().value().stable_hash(&mut hasher);
    decl.signature.as_str().stable_hash(&mut hasher);

    let mut members: Vec<_> = members
        .iter()
        .map(|member| (member.name, member.signature.as_str()))
        .collect();
    members.sort_unstable();

    hasher.combine(&members.len());
    for (name, signature) in members {
        name.stable_hash(&mut hasher);
        signature.stable_hash(&mut hasher);
    }

    hasher.finalize()
}
