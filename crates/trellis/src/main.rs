#![warn(missing_docs)]

//! Entry point for the `trellis` binary.

mod build;
mod cli;
mod error;
mod inspect;

use std::{io, process};

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, registry};
use trellis_graph::CYCLE_TARGET;

use crate::{
    cli::{Cli, Commands},
    error::Result,
};

fn main() {
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("error: {}", err.pretty());
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, and dispatch to the chosen subcommand.
fn run() -> Result<()> {
    let Cli { log, command } = Cli::parse();
    let env_filter = logging::env_filter_from_spec(&log.spec());

    let trace_cycles = matches!(&command, Commands::Build(args) if args.trace_cycles);
    let (capture_layer, capture) = if trace_cycles {
        let (layer, capture) =
            logging::capture::layer(Some(CYCLE_TARGET), logging::capture::DEFAULT_CAPACITY);
        let filter = logging::env_filter_from_spec(&format!("{CYCLE_TARGET}=debug"));
        (Some(layer.with_filter(filter)), Some(capture))
    } else {
        (None, None)
    };

    registry()
        .with(
            fmt::layer()
                .without_time()
                .with_writer(io::stderr)
                .with_filter(env_filter),
        )
        .with(capture_layer)
        .try_init()
        .ok();

    match command {
        Commands::Uri(args) => inspect::run_uri(&args),
        Commands::Get(args) => inspect::run_get(&args),
        Commands::Normalize(args) => inspect::run_normalize(&args),
        Commands::Build(args) => build::run(&args, capture.as_ref()),
    }
}
