//! The `veldc` driver executable.

use std::process::ExitCode;

use clap::Parser;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let arguments = veldc_driver::Arguments::parse();
    let mut err_writer = StandardStream::stderr(ColorChoice::Auto);

    veldc_driver::run(&arguments, &mut err_writer)
}
