//! Parsing of `expected-<selector> {{<key>}}` comments.
//!
//! Not every combination of scope and kind makes sense; the supported set
//! is given exhaustively by [`EXPECTATION_MATRIX`], and both the parser and
//! the fix-it renderer are driven by it, so the two can never drift apart.

use veldc_diagnostic::Diagnostic;
use veldc_source_file::{SourceFile, Span};

/// The kind of dependency entry an expectation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// The key must match no obligation at all.
    Negative,

    /// A name the file provides.
    Provides,

    /// A specific member dependency.
    Member,

    /// A superclass or conformance dependency; sensitive to member
    /// additions and removals.
    PotentialMember,

    /// A dynamically looked-up member dependency.
    DynamicMember,
}

/// Whether the expected dependency cascades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// No scope information; only negative and provides expectations.
    None,

    /// The dependency does not cascade.
    Private,

    /// The dependency cascades.
    Cascading,
}

/// The exhaustive matrix of supported expectation selectors.
pub const EXPECTATION_MATRIX: &[(&str, Scope, Kind)] = &[
    ("expected-no-dependency", Scope::None, Kind::Negative),
    ("expected-provides", Scope::None, Kind::Provides),
    ("expected-private-superclass", Scope::Private, Kind::PotentialMember),
    ("expected-cascading-superclass", Scope::Cascading, Kind::PotentialMember),
    ("expected-private-conformance", Scope::Private, Kind::PotentialMember),
    ("expected-cascading-conformance", Scope::Cascading, Kind::PotentialMember),
    ("expected-private-member", Scope::Private, Kind::Member),
    ("expected-cascading-member", Scope::Cascading, Kind::Member),
    ("expected-private-dynamic-member", Scope::Private, Kind::DynamicMember),
    (
        "expected-cascading-dynamic-member",
        Scope::Cascading,
        Kind::DynamicMember,
    ),
];

/// The selector rendered into a fix-it for the given pair; the first
/// matching matrix row wins, so a potential-member obligation renders as a
/// superclass expectation.
#[must_use]
pub fn selector_for(kind: Kind, scope: Scope) -> Option<&'static str> {
    EXPECTATION_MATRIX
        .iter()
        .find(|(_, s, k)| *s == scope && *k == kind)
        .map(|(selector, _, _)| *selector)
}

/// One parsed expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    /// The full range of the `expected-... {{...}}` text.
    pub span: Span,

    /// The range of the key text inside the braces.
    pub message_span: Span,

    /// The key text inside the braces.
    pub message: String,

    /// What the expectation expects.
    pub kind: Kind,

    /// Whether it expects the dependency to cascade.
    pub scope: Scope,
}

/// Scans the whole source for expectations.
///
/// Parse problems become ordinary diagnostics rather than hard failures,
/// so a half-written expectation still gets reported next to the real
/// mismatches.
pub fn parse_expectations(
    source: &SourceFile,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Expectation> {
    let content = source.content();
    let mut expectations = Vec::new();

    let mut search_from = 0usize;
    while let Some(offset) = content[search_from..].find("expected-") {
        let start = search_from + offset;
        search_from = start + 1;

        let rest = &content[start..];

        let Some(&(selector, scope, kind)) = EXPECTATION_MATRIX
            .iter()
            .find(|(selector, _, _)| rest.starts_with(selector))
        else {
            let end = start + rest.find(char::is_whitespace).unwrap_or(rest.len());
            diagnostics.push(Diagnostic::error(
                Span::new(start, end),
                "unknown expectation selector",
            ));
            continue;
        };

        let after_selector = &rest[selector.len()..];
        let skipped = after_selector.len()
            - after_selector.trim_start_matches([' ', '\t']).len();
        let braces_start = start + selector.len() + skipped;
        let braces = &content[braces_start..];

        if !braces.starts_with("{{") {
            diagnostics.push(Diagnostic::error(
                Span::new(start, braces_start),
                "expected {{ in expectation",
            ));
            continue;
        }

        let Some(close) = braces.find("}}") else {
            diagnostics.push(Diagnostic::error(
                Span::new(start, braces_start + 2),
                "didn't find '}}' to match '{{' in expectation",
            ));
            continue;
        };

        let message_span = Span::new(braces_start + 2, braces_start + close);
        let span = Span::new(start, braces_start + close + 2);

        expectations.push(Expectation {
            span,
            message_span,
            message: content[message_span.range()].to_owned(),
            kind,
            scope,
        });
    }

    expectations
}
