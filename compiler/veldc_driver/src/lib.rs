//! Contains the main `run()` function for the incremental build driver.

use std::{process::ExitCode, sync::atomic::AtomicBool};

use codespan_reporting::{
    diagnostic::{Diagnostic, Label},
    files::SimpleFile,
    term::{self, termcolor::WriteColor},
};
use veldc_frontend::SummaryFrontend;

pub mod args;
pub mod artifact_io;
pub mod build;
pub mod output_file_map;

pub use args::Arguments;
pub use build::{execute, BuildError, BuildOutcome};

fn emit_plain_error(
    err_writer: &mut dyn WriteColor,
    config: &term::Config,
    message: String,
) {
    let empty = SimpleFile::new("", "");
    let diagnostic = Diagnostic::<()>::error().with_message(message);

    let _ = term::emit(err_writer, config, &empty, &diagnostic);
}

fn severity_of(
    severity: veldc_diagnostic::Severity,
) -> codespan_reporting::diagnostic::Severity {
    match severity {
        veldc_diagnostic::Severity::Error => {
            codespan_reporting::diagnostic::Severity::Error
        }
        veldc_diagnostic::Severity::Warning => {
            codespan_reporting::diagnostic::Severity::Warning
        }
        veldc_diagnostic::Severity::Note => {
            codespan_reporting::diagnostic::Severity::Note
        }
    }
}

/// Runs a build with the given arguments, reporting to the given writer.
///
/// The exit code is 0 iff every job succeeded, every verification came out
/// clean, and the module graph was persisted.
#[must_use]
pub fn run(
    arguments: &Arguments,
    err_writer: &mut dyn WriteColor,
) -> ExitCode {
    let config = term::Config::default();
    let frontend = SummaryFrontend::new(&arguments.module_name);
    let cancel = AtomicBool::new(false);

    let outcome = match execute(arguments, &frontend, &cancel) {
        Ok(outcome) => outcome,
        Err(error) => {
            emit_plain_error(err_writer, &config, error.to_string());
            return ExitCode::FAILURE;
        }
    };

    // verifier diagnostics are already sorted by source location
    for (source, verification) in &outcome.verifications {
        let file = SimpleFile::new(
            source.path().display().to_string(),
            source.content().as_str(),
        );

        for diagnostic in &verification.diagnostics {
            let rendered = Diagnostic::new(severity_of(diagnostic.severity))
                .with_message(diagnostic.message.clone())
                .with_labels(vec![Label::primary(
                    (),
                    diagnostic.span.range(),
                )]);

            let _ = term::emit(err_writer, &config, &file, &rendered);
        }
    }

    for (_, failure) in &outcome.failures {
        emit_plain_error(err_writer, &config, failure.to_string());
    }

    if outcome.failures.is_empty() {
        if outcome.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    } else {
        let failing: Vec<_> = outcome
            .failures
            .iter()
            .map(|(id, _)| id.to_string())
            .collect();

        emit_plain_error(
            err_writer,
            &config,
            format!("build failed; failing files: {}", failing.join(", ")),
        );

        ExitCode::FAILURE
    }
}
