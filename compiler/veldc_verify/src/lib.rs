//! Verifies dependencies registered against the referenced-name tracker of
//! a source file.
//!
//! The source carries *expectations* in comments; the front end run leaves
//! *obligations* in the tracker. The verifier pairs the two: every
//! obligation must be fulfilled by a matching expectation, a
//! `no-dependency` expectation must match nothing, and whatever remains
//! owed is diagnosed — with a fix-it that inserts the missing expectation
//! comment.

use veldc_depend::{NodeKind, ReferencedNameTracker};
use veldc_diagnostic::{Diagnostic, FixIt};
use veldc_hash::HashMap;
use veldc_source_file::{SourceFile, Span};

pub mod expectation;
mod obligation;


use expectation::{parse_expectations, Expectation, Kind, Scope};
use obligation::{Obligation, ObligationMap};

/// The outcome of verifying one source file.
#[derive(Debug, Clone)]
pub struct Verification {
    /// The diagnostics, sorted by source location.
    pub diagnostics: Vec<Diagnostic>,
}

impl Verification {
    /// Whether verification succeeded with no diagnostics.
    #[must_use]
    pub fn is_clean(&self) -> bool { self.diagnostics.is_empty() }

    /// Collects every fix-it carried by the diagnostics, sorted by start
    /// location.
    #[must_use]
    pub fn fix_its(&self) -> Vec<FixIt> {
        let mut fix_its: Vec<FixIt> = self
            .diagnostics
            .iter()
            .flat_map(|diagnostic| diagnostic.fix_its.iter().cloned())
            .collect();
        fix_its.sort_by_key(|fix_it| fix_it.span.start);
        fix_its
    }

    /// Applies the emitted fix-its to the source content, returning the
    /// rewritten buffer. Fix-its must not overlap.
    #[must_use]
    pub fn apply_fix_its(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut last = 0usize;

        for fix_it in self.fix_its() {
            assert!(
                last <= fix_it.span.start,
                "cannot handle overlapping fix-its"
            );

            result.push_str(&content[last..fix_it.span.start]);
            result.push_str(&fix_it.replacement);
            result.push('\n');
            last = fix_it.span.end;
        }

        result.push_str(&content[last..]);
        result
    }
}

fn describe_cascade(scope: Scope) -> &'static str {
    match scope {
        Scope::Private => "non-cascading",
        Scope::Cascading => "cascading",
        Scope::None => unreachable!("obligations always carry a scope"),
    }
}

/// `// expected-<selector> {{<key>}}` for an owed obligation.
fn render_fix_it(obligation: &Obligation) -> String {
    let selector = expectation::selector_for(obligation.kind, obligation.scope)
        .expect("every obligation kind/scope pair has a selector");

    format!("// {selector} {{{{{}}}}}", obligation.key)
}

fn construct_obligations(tracker: &ReferencedNameTracker) -> ObligationMap {
    let mut obligations = ObligationMap::new();

    for name in tracker.provides() {
        obligations.insert(Obligation::new(
            name.as_str().to_owned(),
            name.as_str().to_owned(),
            Kind::Provides,
            Scope::None,
        ));
    }

    tracker.enumerate_uses(
        true,
        std::iter::empty(),
        |kind, context, name, cascades| {
            let scope =
                if cascades { Scope::Cascading } else { Scope::Private };

            match kind {
                // the external dependency set is usually a large slice of
                // the SDK; not what this verifier is for
                NodeKind::ExternalDepend => {}

                // nominals duplicate member entries; the member itself is
                // what matters
                NodeKind::Nominal => {}

                // top-level uses have no expectation selector
                NodeKind::TopLevel | NodeKind::SourceFileProvide => {}

                NodeKind::PotentialMember => {
                    obligations.insert(Obligation::new(
                        context.as_str().to_owned(),
                        String::new(),
                        Kind::PotentialMember,
                        scope,
                    ));
                }

                NodeKind::Member => {
                    obligations.insert(Obligation::new(
                        format!("{context}.{name}"),
                        context.as_str().to_owned(),
                        Kind::Member,
                        scope,
                    ));
                }

                NodeKind::DynamicLookup => {
                    obligations.insert(Obligation::new(
                        name.as_str().to_owned(),
                        name.as_str().to_owned(),
                        Kind::DynamicMember,
                        scope,
                    ));
                }
            }
        },
    );

    obligations
}

fn verify_positive_expectations(
    expectations: &[Expectation],
    obligations: &mut ObligationMap,
    negatives: &mut HashMap<String, Expectation>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for expectation in expectations {
        let wants_cascade = expectation.scope == Scope::Cascading;

        if expectation.kind == Kind::Negative {
            // verified separately, against whatever remains owed
            negatives
                .insert(expectation.message.clone(), expectation.clone());
            continue;
        }

        let Some(obligation) =
            obligations.find_owed(&expectation.message, expectation.kind)
        else {
            let what = match expectation.kind {
                Kind::Member => "member dependency",
                Kind::PotentialMember => "potential member dependency",
                Kind::DynamicMember => "dynamic member dependency",
                Kind::Provides => "provided dependency",
                Kind::Negative => unreachable!(),
            };

            diagnostics.push(Diagnostic::error(
                expectation.message_span,
                format!("expected {what} does not exist: {}", expectation.message),
            ));
            continue;
        };

        match expectation.kind {
            Kind::Member | Kind::PotentialMember => {
                let has_cascade = obligation.scope == Scope::Cascading;

                if has_cascade == wants_cascade {
                    obligation.fulfill();
                } else {
                    let noun = if expectation.kind == Kind::Member {
                        "dependency"
                    } else {
                        "potential member dependency"
                    };

                    diagnostics.push(Diagnostic::error(
                        expectation.message_span,
                        format!(
                            "expected {} {noun}; found {} {noun} instead",
                            if wants_cascade { "cascading" } else { "non-cascading" },
                            if has_cascade { "cascading" } else { "non-cascading" },
                        ),
                    ));
                    obligation.fail();
                }
            }

            Kind::Provides | Kind::DynamicMember => obligation.fulfill(),

            Kind::Negative => unreachable!(),
        }
    }
}

fn verify_negative_expectations(
    obligations: &mut ObligationMap,
    negatives: &HashMap<String, Expectation>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for obligation in obligations.owed_mut() {
        let Some(expectation) = negatives.get(&obligation.key) else {
            continue;
        };

        diagnostics.push(Diagnostic::error(
            expectation.message_span,
            format!("unexpected dependency exists: {}", expectation.message),
        ));
        obligation.fail();
    }
}

fn diagnose_unfulfilled_obligations(
    source: &SourceFile,
    obligations: &mut ObligationMap,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // diagnosing the end of the buffer keeps the message visible without
    // pointing at an unrelated line
    let end = Span::new(source.content().len(), source.content().len());

    for obligation in obligations.owed_mut() {
        let (message, note) = match obligation.kind {
            Kind::Member => (
                format!(
                    "unexpected {} dependency: {}",
                    describe_cascade(obligation.scope),
                    obligation.key,
                ),
                "expect a member dependency",
            ),
            Kind::DynamicMember => (
                format!(
                    "unexpected {} dynamic member dependency: {}",
                    describe_cascade(obligation.scope),
                    obligation.name,
                ),
                "expect a dynamic member dependency",
            ),
            Kind::PotentialMember => (
                format!(
                    "unexpected {} potential member dependency: {}",
                    describe_cascade(obligation.scope),
                    obligation.key,
                ),
                "expect a potential member",
            ),
            Kind::Provides => (
                format!("unexpected provided entity: {}", obligation.name),
                "expect a provide",
            ),
            Kind::Negative => {
                unreachable!("obligations may not be negative")
            }
        };

        diagnostics.push(Diagnostic::error(end, message));
        diagnostics.push(
            Diagnostic::note(end, note)
                .with_fix_it(FixIt::new(end, render_fix_it(obligation))),
        );
    }
}

/// Verifies that the expectations written in `source` agree with the
/// obligations the front end left in `tracker`.
///
/// The returned diagnostics are sorted by source location; an empty list
/// means the file verified clean.
#[must_use]
pub fn verify_file(
    source: &SourceFile,
    tracker: &ReferencedNameTracker,
) -> Verification {
    let mut diagnostics = Vec::new();

    let expectations = parse_expectations(source, &mut diagnostics);
    let mut obligations = construct_obligations(tracker);

    let mut negatives = HashMap::default();
    verify_positive_expectations(
        &expectations,
        &mut obligations,
        &mut negatives,
        &mut diagnostics,
    );
    verify_negative_expectations(&mut obligations, &negatives, &mut diagnostics);
    diagnose_unfulfilled_obligations(source, &mut obligations, &mut diagnostics);

    veldc_diagnostic::sort_for_emission(&mut diagnostics);

    Verification { diagnostics }
}
