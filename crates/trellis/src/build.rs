//! The `build` command: construct every named value and print the registry.

use config::{Configuration, UriHandler};
use logging::capture::Capture;
use trellis_graph::{Container, Registry, TypeRegistry};

use crate::{cli::BuildArgs, error::Result, inspect};

/// Build the file's graph, print it as JSON, then any captured cycle diagnostics.
pub fn run(args: &BuildArgs, cycles: Option<&Capture>) -> Result<()> {
    let config = inspect::load(&args.file)?;
    let registry = build(&config, &args.priority)?;
    println!("{}", serde_json::to_string_pretty(&registry.to_json())?);
    if let Some(capture) = cycles {
        for event in capture.snapshot() {
            eprintln!("{}", event.line());
        }
    }
    Ok(())
}

/// Resolve `config` with the built-in component types.
fn build(config: &Configuration, priority: &[String]) -> Result<Registry> {
    let container = Container::new(TypeRegistry::with_builtins(), UriHandler::standard())
        .with_priority_names(priority.iter().cloned());
    Ok(container.resolve(config)?)
}
