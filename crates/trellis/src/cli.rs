//! Command-line interface definitions for trellis.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use config::Representation;
use logging::LogArgs;

/// Command-line interface for the `trellis` binary.
#[derive(Parser, Debug)]
#[command(
    name = "trellis",
    about = "Inspect configurations and build the object graphs they describe",
    version
)]
pub struct Cli {
    /// Logging controls.
    #[command(flatten)]
    pub log: LogArgs,

    /// What to do.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse compound URIs and print their parts.
    Uri(UriArgs),
    /// Resolve a single value from a configuration file.
    Get(GetArgs),
    /// Print a configuration with its mixins and inheritance applied.
    Normalize(NormalizeArgs),
    /// Build every named value of a configuration and print the result.
    Build(BuildArgs),
}

/// Arguments for the `uri` subcommand.
#[derive(Args, Debug, Clone)]
pub struct UriArgs {
    /// One or more compound URIs, e.g. `file:a.json#key+depth=2|data`.
    #[arg(value_name = "URI", num_args = 1..)]
    pub uris: Vec<String>,
}

/// Arguments for the `get` subcommand.
#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    /// Configuration file (.json or .ron).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Dotted key path to resolve.
    #[arg(value_name = "KEY_PATH")]
    pub key_path: String,

    /// Convert the value to this representation (string, number, boolean, date, url, data, ...).
    #[arg(long = "as", value_name = "REPR")]
    pub repr: Option<Representation>,

    /// Fail instead of falling back to the literal text when a `#` path misses.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `normalize` subcommand.
#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Configuration file (.json or .ron).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Normalize only the configuration at this key path.
    #[arg(value_name = "KEY_PATH")]
    pub key_path: Option<String>,
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Configuration file (.json or .ron).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Build this name before the others. Repeatable; order is kept.
    #[arg(long = "priority", value_name = "NAME")]
    pub priority: Vec<String>,

    /// Print the cycle diagnostics recorded while building.
    #[arg(long)]
    pub trace_cycles: bool,
}
