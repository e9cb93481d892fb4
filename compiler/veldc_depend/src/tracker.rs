//! Contains the definition of [`ReferencedNameTracker`], the per-file
//! accumulator of outgoing dependency edges.

use veldc_hash::{HashMap, HashSet};
use veldc_intern::Identifier;

use crate::key::NodeKind;

/// Accumulates the names one source file referenced while it was compiled.
///
/// The front end calls the `add_*` operations as it resolves names; each
/// call is idempotent on its key, and the cascade flag of a key is the
/// logical OR over all recordings of that key — once a use cascades, it
/// stays cascading.
#[derive(Debug, Clone, Default)]
pub struct ReferencedNameTracker {
    top_level: HashMap<Identifier, bool>,
    members: HashMap<(Identifier, Identifier), bool>,
    potential_members: HashMap<Identifier, bool>,
    dynamic_lookups: HashMap<Identifier, bool>,
    provides: HashSet<Identifier>,
    externals: HashSet<Identifier>,
}

impl ReferencedNameTracker {
    /// Creates an empty tracker for one source file.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Records a use of a top-level name.
    pub fn add_top_level_name(&mut self, name: Identifier, cascades: bool) {
        *self.top_level.entry(name).or_insert(false) |= cascades;
    }

    /// Records a use of a specific member of a type.
    ///
    /// A member use implies a use of the nominal type itself; the nominal
    /// entry is synthesized during enumeration.
    pub fn add_used_member(
        &mut self,
        context: Identifier,
        name: Identifier,
        cascades: bool,
    ) {
        *self.members.entry((context, name)).or_insert(false) |= cascades;
    }

    /// Records a dependency on "any member" of a type — a superclass or
    /// conformance relation that is sensitive to member additions and
    /// removals.
    pub fn add_potential_member(&mut self, context: Identifier, cascades: bool) {
        *self.potential_members.entry(context).or_insert(false) |= cascades;
    }

    /// Records a use of a dynamically looked-up name.
    pub fn add_dynamic_lookup_name(
        &mut self,
        name: Identifier,
        cascades: bool,
    ) {
        *self.dynamic_lookups.entry(name).or_insert(false) |= cascades;
    }

    /// Records a name this file declares at file scope.
    pub fn add_provides(&mut self, name: Identifier) {
        self.provides.insert(name);
    }

    /// Records a reference to a dependency artifact of another module.
    pub fn add_external_depend(&mut self, path: Identifier) {
        self.externals.insert(path);
    }

    /// Returns the names this file declares at file scope, in deterministic
    /// order.
    #[must_use]
    pub fn provides(&self) -> Vec<Identifier> {
        let mut provides: Vec<_> = self.provides.iter().copied().collect();
        provides.sort_unstable();
        provides
    }

    /// Returns the foreign artifact paths this file references, in
    /// deterministic order.
    #[must_use]
    pub fn externals(&self) -> Vec<Identifier> {
        let mut externals: Vec<_> = self.externals.iter().copied().collect();
        externals.sort_unstable();
        externals
    }

    /// Whether the given member context resolves to a declaration this file
    /// itself provides.
    ///
    /// Contexts are recorded module-qualified (`main.Base`), provides by
    /// bare name (`Base`), so only the final segment participates.
    fn provides_context(&self, context: Identifier) -> bool {
        let text = context.as_str();
        let bare = text.rsplit('.').next().unwrap_or(text);

        !bare.is_empty() && self.provides.contains(&Identifier::new(bare))
    }

    /// Emits `(node_kind, context, name, cascades)` for every recorded use.
    ///
    /// Member uses additionally emit one [`NodeKind::Nominal`] entry per
    /// referenced type, cascading if any use of that type cascades. Extra
    /// external dependencies observed by collaborators (foreign importers)
    /// are merged with the tracker's own. When `include_intrafile` is
    /// false, uses that resolve to this file's own provides are skipped.
    ///
    /// Emission order is deterministic: kinds in declaration order, entries
    /// within a kind sorted by identifier text.
    pub fn enumerate_uses(
        &self,
        include_intrafile: bool,
        external_deps: impl IntoIterator<Item = Identifier>,
        mut visitor: impl FnMut(NodeKind, Identifier, Identifier, bool),
    ) {
        let mut top_level: Vec<_> = self
            .top_level
            .iter()
            .filter(|(name, _)| {
                include_intrafile || !self.provides.contains(*name)
            })
            .map(|(&name, &cascades)| (name, cascades))
            .collect();
        top_level.sort_unstable();

        for (name, cascades) in top_level {
            visitor(NodeKind::TopLevel, Identifier::EMPTY, name, cascades);
        }

        // every referenced type is also a use of the nominal itself
        let mut nominals: HashMap<Identifier, bool> = HashMap::default();
        for (&(context, _), &cascades) in &self.members {
            *nominals.entry(context).or_insert(false) |= cascades;
        }
        for (&context, &cascades) in &self.potential_members {
            *nominals.entry(context).or_insert(false) |= cascades;
        }

        let mut nominals: Vec<_> = nominals
            .into_iter()
            .filter(|(context, _)| {
                include_intrafile || !self.provides_context(*context)
            })
            .collect();
        nominals.sort_unstable();

        for (context, cascades) in nominals {
            visitor(NodeKind::Nominal, context, Identifier::EMPTY, cascades);
        }

        let mut potential: Vec<_> = self
            .potential_members
            .iter()
            .filter(|(context, _)| {
                include_intrafile || !self.provides_context(**context)
            })
            .map(|(&context, &cascades)| (context, cascades))
            .collect();
        potential.sort_unstable();

        for (context, cascades) in potential {
            visitor(
                NodeKind::PotentialMember,
                context,
                Identifier::EMPTY,
                cascades,
            );
        }

        let mut members: Vec<_> = self
            .members
            .iter()
            .filter(|((context, _), _)| {
                include_intrafile || !self.provides_context(*context)
            })
            .map(|(&(context, name), &cascades)| (context, name, cascades))
            .collect();
        members.sort_unstable();

        for (context, name, cascades) in members {
            visitor(NodeKind::Member, context, name, cascades);
        }

        let mut dynamic: Vec<_> = self
            .dynamic_lookups
            .iter()
            .map(|(&name, &cascades)| (name, cascades))
            .collect();
        dynamic.sort_unstable();

        for (name, cascades) in dynamic {
            visitor(NodeKind::DynamicLookup, Identifier::EMPTY, name, cascades);
        }

        let mut externals: HashSet<Identifier> = self.externals.clone();
        externals.extend(external_deps);

        let mut externals: Vec<_> = externals.into_iter().collect();
        externals.sort_unstable();

        for path in externals {
            visitor(NodeKind::ExternalDepend, Identifier::EMPTY, path, true);
        }
    }
}
