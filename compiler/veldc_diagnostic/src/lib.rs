//! Contains the definition of the [`Diagnostic`] struct and related types.
//!
//! Diagnostics produced by the graph verifier and the driver are plain data;
//! rendering to the terminal is the driver's job. Keeping the two decoupled
//! means a diagnostic can be constructed anywhere, sorted deterministically,
//! and only turned into text at the very edge of the program.

use derive_new::new;
use veldc_source_file::Span;

/// Enumeration of the severity levels of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// An error that fails the invocation.
    Error,

    /// A warning that does not fail the invocation.
    Warning,

    /// Additional context attached to a preceding diagnostic.
    Note,
}

/// A text replacement that, when applied, resolves the diagnostic it is
/// attached to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, new)]
pub struct FixIt {
    /// The source region to replace. An empty span inserts at its start
    /// offset.
    pub span: Span,

    /// The replacement text.
    pub replacement: String,
}

/// A struct containing all the information required to display one
/// diagnostic to the user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Diagnostic {
    /// The byte region the diagnostic points at.
    pub span: Span,

    /// The message to display to the user.
    pub message: String,

    /// The severity of the diagnostic.
    pub severity: Severity,

    /// Replacements that would resolve the diagnostic, if any.
    pub fix_its: Vec<FixIt>,
}

impl Diagnostic {
    /// Creates an error diagnostic at the given span.
    #[must_use]
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Error,
            fix_its: Vec::new(),
        }
    }

    /// Creates a note diagnostic at the given span.
    #[must_use]
    pub fn note(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Note,
            fix_its: Vec::new(),
        }
    }

    /// Attaches a fix-it to the diagnostic.
    #[must_use]
    pub fn with_fix_it(mut self, fix_it: FixIt) -> Self {
        self.fix_its.push(fix_it);
        self
    }
}

/// Sorts diagnostics by source location, then severity, then message, so
/// emission order never depends on construction order.
pub fn sort_for_emission(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then_with(|| a.span.end.cmp(&b.span.end))
            .then_with(|| a.severity.cmp(&b.severity))
            .then_with(|| a.message.cmp(&b.message))
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn emission_order_is_by_location() {
        let mut diagnostics = vec![
            Diagnostic::error(Span::new(40, 41), "later"),
            Diagnostic::note(Span::new(3, 4), "note first"),
            Diagnostic::error(Span::new(3, 4), "error first"),
        ];

        sort_for_emission(&mut diagnostics);

        assert_eq!(diagnostics[0].message, "error first");
        assert_eq!(diagnostics[1].message, "note first");
        assert_eq!(diagnostics[2].message, "later");
    }
}
