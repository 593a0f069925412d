//! Error handling for the trellis binary.

use std::result;

use thiserror::Error;
use trellis_graph::Error as GraphError;

/// Convenient result type for trellis commands.
pub type Result<T> = result::Result<T, Error>;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading or resolution errors.
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    /// Object graph construction errors.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    /// A compound URI failed to parse.
    #[error("{0}")]
    Syntax(#[from] compound_uri::Error),
    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A key path had no value.
    #[error("No value at '{0}'")]
    NotFound(String),
}

impl Error {
    /// Render the error for a terminal, with excerpts where the source error has them.
    pub fn pretty(&self) -> String {
        match self {
            Self::Config(err) | Self::Graph(GraphError::Config(err)) => err.pretty(),
            Self::Syntax(err) => err.pretty(),
            other => other.to_string(),
        }
    }
}
