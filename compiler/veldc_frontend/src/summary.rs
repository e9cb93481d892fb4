//! The declaration-summary front end.
//!
//! A summary file is the distilled shape of a real source file: one
//! directive per line describing what the file declares and what it
//! references, with everything else treated as body text. The driver binary
//! and the scenario tests compile these summaries; a full parser and
//! semantic analyzer would populate the same structures through the same
//! [`Evaluator`] sinks.
//!
//! ```text
//! module main
//!
//! type Base sig : Root
//! member Base.init sig ()
//! def tick sig () -> Int
//!
//! use tock cascading
//! use-member Base.init
//! use-potential Base cascading
//! use-dynamic value
//! external ../lib/lib.vdep
//!
//! // comment; body text below only moves the content hash
//! tick body line
//! ```
//!
//! Type contexts are recorded module-qualified (`main.Base`); an already
//! qualified context is taken as written.

use veldc_depend::{DependencyKey, ProvidedDefinition};
use veldc_intern::Identifier;
use veldc_source_file::SourceFile;
use veldc_stable_hash::{StableHash, StableHasher};

use crate::{
    decl::{leaf_fingerprint, nominal_fingerprint, Decl, DeclKind},
    request::{
        DynamicLookupReference, Evaluator, ExternalReference,
        MemberReference, PotentialMemberReference, ProvidedName,
        TopLevelReference,
    },
    CompileFailure, CompiledSource, Frontend,
};

/// The front end over declaration-summary files.
#[derive(Debug, Clone)]
pub struct SummaryFrontend {
    default_module: String,
}

impl SummaryFrontend {
    /// Creates a front end that attributes files without a `module`
    /// directive to the given module.
    #[must_use]
    pub fn new(default_module: impl Into<String>) -> Self {
        Self { default_module: default_module.into() }
    }

    fn module_of(&self, source: &SourceFile) -> Identifier {
        source
            .content()
            .lines()
            .filter_map(|line| line.trim().strip_prefix("module "))
            .map(str::trim)
            .next()
            .map_or_else(
                || Identifier::new(&self.default_module),
                Identifier::new,
            )
    }
}

fn qualify(module: Identifier, context: &str) -> Identifier {
    if context.contains('.') {
        Identifier::new(context)
    } else {
        Identifier::new(format!("{module}.{context}"))
    }
}

fn reject(
    source: &SourceFile,
    line: usize,
    message: impl Into<String>,
) -> CompileFailure {
    CompileFailure::Rejected {
        path: source.path().clone(),
        line,
        message: message.into(),
    }
}

/// Splits `Type.name`, rejecting a bare name.
fn split_member<'a>(
    source: &SourceFile,
    line: usize,
    text: &'a str,
) -> Result<(&'a str, &'a str), CompileFailure> {
    text.rsplit_once('.').ok_or_else(|| {
        reject(source, line, format!("expected `Type.member`, found `{text}`"))
    })
}

struct ParsedSummary {
    decls: Vec<Decl>,
}

impl Frontend for SummaryFrontend {
    fn compile(
        &self,
        source: &SourceFile,
    ) -> Result<CompiledSource, CompileFailure> {
        let module = self.module_of(source);
        let mut evaluator = Evaluator::new(source);
        let mut parsed = ParsedSummary { decls: Vec::new() };

        for (index, raw_line) in
            evaluator.active_source().content().lines().enumerate()
        {
            let line = index + 1;
            let trimmed = raw_line.trim();

            if trimmed.is_empty()
                || trimmed.starts_with("//")
                || trimmed.starts_with('#')
            {
                continue;
            }

            let mut tokens = trimmed.split_whitespace();
            let Some(directive) = tokens.next() else { continue };
            let operands: Vec<&str> = tokens.collect();

            let cascades = operands.last() == Some(&"cascading");
            let plain_operands: &[&str] = if cascades {
                &operands[..operands.len() - 1]
            } else {
                &operands
            };

            let first = |what: &str| {
                plain_operands.first().copied().ok_or_else(|| {
                    reject(source, line, format!("`{directive}` needs {what}"))
                })
            };
            let signature =
                || plain_operands.get(1..).unwrap_or_default().join(" ");

            match directive {
                // resolved by module_of before the line walk
                "module" => {}

                "def" => {
                    let name = first("a name")?;
                    parsed.decls.push(Decl {
                        kind: DeclKind::TopLevel,
                        module,
                        context: None,
                        name: Identifier::new(name),
                        signature: signature(),
                    });
                }

                "type" => {
                    let name = first("a name")?;
                    parsed.decls.push(Decl {
                        kind: DeclKind::Nominal,
                        module,
                        context: None,
                        name: Identifier::new(name),
                        signature: signature(),
                    });
                }

                "member" => {
                    let (context, name) =
                        split_member(source, line, first("`Type.member`")?)?;
                    parsed.decls.push(Decl {
                        kind: DeclKind::Member,
                        module,
                        context: Some(Identifier::new(context)),
                        name: Identifier::new(name),
                        signature: signature(),
                    });
                }

                "use" => {
                    evaluator.sink(&TopLevelReference {
                        name: Identifier::new(first("a name")?),
                        cascades,
                    });
                }

                "use-member" => {
                    let (context, name) =
                        split_member(source, line, first("`Type.member`")?)?;
                    evaluator.sink(&MemberReference {
                        context: qualify(module, context),
                        name: Identifier::new(name),
                        cascades,
                    });
                }

                "use-potential" => {
                    evaluator.sink(&PotentialMemberReference {
                        context: qualify(module, first("a type")?),
                        cascades,
                    });
                }

                "use-dynamic" => {
                    evaluator.sink(&DynamicLookupReference {
                        name: Identifier::new(first("a name")?),
                        cascades,
                    });
                }

                "external" => {
                    evaluator.sink(&ExternalReference {
                        path: Identifier::new(first("a path")?),
                    });
                }

                "error" => {
                    return Err(reject(source, line, operands.join(" ")));
                }

                // body text; contributes only to the content hash
                _ => {}
            }
        }

        let mut definitions = Vec::new();
        let mut surface = StableHasher::new();

        for decl in &parsed.decls {
            decl.kind.stable_hash(&mut surface);
            decl.context
                .unwrap_or(Identifier::EMPTY)
                .stable_hash(&mut surface);
            decl.name.stable_hash(&mut surface);
            decl.signature.as_str().stable_hash(&mut surface);

            match decl.kind {
                DeclKind::Module => {}

                DeclKind::TopLevel => {
                    definitions.push(ProvidedDefinition {
                        key: DependencyKey::top_level(decl.name),
                        fingerprint: Some(leaf_fingerprint(decl)),
                    });
                    evaluator.sink(&ProvidedName { name: decl.name });
                }

                DeclKind::Nominal => {
                    let members: Vec<Decl> = parsed
                        .decls
                        .iter()
                        .filter(|member| {
                            member.kind == DeclKind::Member
                                && member.context == Some(decl.name)
                        })
                        .cloned()
                        .collect();

                    let qualified = qualify(module, decl.name.as_str());
                    let fingerprint = nominal_fingerprint(decl, &members);

                    definitions.push(ProvidedDefinition {
                        key: DependencyKey::nominal(qualified),
                        fingerprint: Some(fingerprint),
                    });
                    definitions.push(ProvidedDefinition {
                        key: DependencyKey::potential_member(qualified),
                        fingerprint: Some(fingerprint),
                    });
                    definitions.push(ProvidedDefinition {
                        key: DependencyKey::top_level(decl.name),
                        fingerprint: Some(leaf_fingerprint(decl)),
                    });
                    evaluator.sink(&ProvidedName { name: decl.name });
                }

                DeclKind::Member => {
                    let context = decl.context.unwrap_or(Identifier::EMPTY);
                    definitions.push(ProvidedDefinition {
                        key: DependencyKey::member(
                            qualify(module, context.as_str()),
                            decl.name,
                        ),
                        fingerprint: Some(leaf_fingerprint(decl)),
                    });
                }
            }
        }

        Ok(CompiledSource {
            definitions,
            interface_hash: surface.finalize(),
            content_hash: source.content_fingerprint(),
            tracker: evaluator.into_tracker(),
        })
    }
}

#[cfg(test)]
mod test {
    use veldc_depend::NodeKind;

    use super::*;

    fn compile(content: &str) -> CompiledSource {
        SummaryFrontend::new("main")
            .compile(&SourceFile::new("two.veld".into(), content.to_owned()))
            .unwrap()
    }

    #[test]
    fn body_edits_move_only_the_content_hash() {
        let before = compile("def tick sig () -> Int\nbody one\n");
        let after = compile("def tick sig () -> Int\nbody two\n");

        assert_eq!(before.interface_hash, after.interface_hash);
        assert_ne!(before.content_hash, after.content_hash);
    }

    #[test]
    fn signature_edits_move_the_interface_hash() {
        let before = compile("def tick sig () -> Int\n");
        let after = compile("def tick sig () -> Bool\n");

        assert_ne!(before.interface_hash, after.interface_hash);
    }

    #[test]
    fn types_provide_nominal_and_potential_member_entries() {
        let compiled =
            compile("type Base sig : Root\nmember Base.init sig ()\n");

        let keys: Vec<_> = compiled
            .definitions
            .iter()
            .map(|definition| definition.key)
            .collect();

        let base = Identifier::new("main.Base");
        assert!(keys.contains(&DependencyKey::nominal(base)));
        assert!(keys.contains(&DependencyKey::potential_member(base)));
        assert!(keys
            .contains(&DependencyKey::top_level(Identifier::new("Base"))));
        assert!(keys.contains(&DependencyKey::member(
            base,
            Identifier::new("init")
        )));
    }

    #[test]
    fn adding_a_member_moves_the_nominal_fingerprint() {
        let fingerprint_of = |content: &str| {
            compile(content)
                .definitions
                .iter()
                .find(|definition| {
                    definition.key
                        == DependencyKey::nominal(Identifier::new("main.Base"))
                })
                .unwrap()
                .fingerprint
        };

        assert_ne!(
            fingerprint_of("type Base\n"),
            fingerprint_of("type Base\nmember Base.init sig ()\n"),
        );
    }

    #[test]
    fn uses_are_recorded_with_their_cascade_flags() {
        let compiled = compile(
            "use tock cascading\nuse-member Base.init\nuse-potential \
             lib.Root cascading\nuse-dynamic value\n",
        );

        let mut entries = Vec::new();
        compiled.tracker.enumerate_uses(
            true,
            std::iter::empty(),
            |kind, context, name, cascades| {
                entries.push((kind, context, name, cascades));
            },
        );

        assert!(entries.contains(&(
            NodeKind::TopLevel,
            Identifier::EMPTY,
            Identifier::new("tock"),
            true,
        )));
        // unqualified contexts pick up the module name
        assert!(entries.contains(&(
            NodeKind::Member,
            Identifier::new("main.Base"),
            Identifier::new("init"),
            false,
        )));
        // already-qualified contexts are taken as written
        assert!(entries.contains(&(
            NodeKind::PotentialMember,
            Identifier::new("lib.Root"),
            Identifier::EMPTY,
            true,
        )));
    }

    #[test]
    fn module_directive_overrides_the_default() {
        let compiled = compile("module app\nuse-potential Base\n");

        let mut contexts = Vec::new();
        compiled.tracker.enumerate_uses(
            true,
            std::iter::empty(),
            |kind, context, _, _| {
                if kind == NodeKind::PotentialMember {
                    contexts.push(context);
                }
            },
        );

        assert_eq!(contexts, vec![Identifier::new("app.Base")]);
    }

    #[test]
    fn error_directives_fail_the_compile() {
        let failure = SummaryFrontend::new("main")
            .compile(&SourceFile::new(
                "bad.veld".into(),
                "def ok\nerror deliberate failure\n".to_owned(),
            ))
            .unwrap_err();

        let CompileFailure::Rejected { line, message, .. } = failure;
        assert_eq!(line, 2);
        assert_eq!(message, "deliberate failure");
    }

    #[test]
    fn malformed_member_references_are_rejected() {
        let failure = SummaryFrontend::new("main")
            .compile(&SourceFile::new(
                "bad.veld".into(),
                "use-member notdotted\n".to_owned(),
            ))
            .unwrap_err();

        let CompileFailure::Rejected { line, .. } = failure;
        assert_eq!(line, 1);
    }
}
