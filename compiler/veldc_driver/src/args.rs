//! The command-line surface of the driver.

use std::path::PathBuf;

use clap::{builder::styling, Parser};

/// Represents a CLI invocation of the incremental build driver.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "veldc", styles = get_styles())]
pub struct Arguments {
    /// The source files of the module.
    pub inputs: Vec<PathBuf>,

    /// The name of the module being built.
    #[clap(long = "module-name", default_value = "main")]
    pub module_name: String,

    /// Enables the incremental build loop: prior artifacts are loaded and
    /// only invalidated files recompile.
    #[clap(long = "incremental")]
    pub incremental: bool,

    /// Writes a dependency artifact for each successful job.
    #[clap(long = "emit-dependencies")]
    pub emit_dependencies: bool,

    /// Logs, per job, why it entered the compile queue.
    #[clap(long = "driver-show-incremental")]
    pub show_incremental: bool,

    /// Logs job start and finish events.
    #[clap(long = "driver-show-job-lifecycle")]
    pub show_job_lifecycle: bool,

    /// The output file map: one entry per source file naming its object,
    /// interface-module and dependency-artifact outputs, keyed by
    /// canonical path.
    #[clap(long = "output-file-map")]
    pub output_file_map: Option<PathBuf>,

    /// Verifies the expectation comments in each source against the
    /// dependencies the front end recorded.
    #[clap(long = "verify-incremental-dependencies")]
    pub verify_incremental_dependencies: bool,

    /// Applies verifier fix-its back to the source files.
    #[clap(long = "apply-fixits")]
    pub apply_fixits: bool,

    /// Considers dependency artifacts of other modules when computing the
    /// dirty set.
    #[clap(long = "enable-experimental-cross-module-incremental-build")]
    pub cross_module_incremental: bool,

    /// The number of parallel compile jobs; defaults to the number of
    /// available cores.
    #[clap(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,
}

impl Arguments {
    /// A baseline invocation over the given inputs, everything else at its
    /// defaults.
    #[must_use]
    pub fn over_inputs(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            module_name: "main".to_owned(),
            incremental: false,
            emit_dependencies: false,
            show_incremental: false,
            show_job_lifecycle: false,
            output_file_map: None,
            verify_incremental_dependencies: false,
            apply_fixits: false,
            cross_module_incremental: false,
            jobs: None,
        }
    }
}

#[must_use]
const fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            styling::Style::new().bold().underline().fg_color(Some(
                styling::Color::Ansi(styling::AnsiColor::Yellow),
            )),
        )
        .header(
            styling::Style::new()
                .bold()
                .underline()
                .fg_color(Some(styling::Color::Ansi(styling::AnsiColor::Cyan))),
        )
        .literal(
            styling::Style::new().fg_color(Some(styling::Color::Ansi(
                styling::AnsiColor::Green,
            ))),
        )
        .invalid(
            styling::Style::new()
                .bold()
                .fg_color(Some(styling::Color::Ansi(styling::AnsiColor::Red))),
        )
        .error(
            styling::Style::new()
                .bold()
                .fg_color(Some(styling::Color::Ansi(styling::AnsiColor::Red))),
        )
        .valid(
            styling::Style::new().bold().underline().fg_color(Some(
                styling::Color::Ansi(styling::AnsiColor::Green),
            )),
        )
        .placeholder(
            styling::Style::new().fg_color(Some(styling::Color::Ansi(
                styling::AnsiColor::White,
            ))),
        )
}
