//! Errors raised while building object graphs.

use std::result;

use thiserror::Error;

/// Result alias for object graph operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors raised while building an object graph.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Configuration could not be read or a reference could not be resolved.
    #[error(transparent)]
    Config(#[from] config::Error),

    /// A map was to become an object but nothing said which type.
    #[error("no type hint for '{context}'")]
    MissingTypeHint {
        /// Key path of the node being built.
        context: String,
    },

    /// A `-class`, `-type` or declared property type names no registered type.
    #[error("unknown type '{name}' at '{context}'")]
    UnknownType {
        /// The unregistered name.
        name: String,
        /// Key path of the node being built.
        context: String,
    },

    /// A `-factory` hint names no registered factory.
    #[error("unknown factory '{name}' at '{context}'")]
    UnknownFactory {
        /// The unregistered name.
        name: String,
        /// Key path of the node being built.
        context: String,
    },

    /// A factory reported failure.
    #[error("factory '{name}' failed at '{context}': {message}")]
    Construction {
        /// Factory name.
        name: String,
        /// Key path of the node being built.
        context: String,
        /// Failure description.
        message: String,
    },

    /// The top-level configuration cannot be built at all.
    #[error("root configuration: {message}")]
    RootConfiguration {
        /// Failure description.
        message: String,
    },

    /// A build pass ended with placeholders still waiting on these names.
    #[error("unresolved pending references to: {}", names.join(", "))]
    UnresolvedPending {
        /// Names that never finished building.
        names: Vec<String>,
    },
}
