//! compound-uri: the addressing syntax used for every cross-reference in configuration data.
//!
//! A compound URI names a value through a scheme, a scheme-specific name, an optional
//! fragment, a set of named parameters (each itself a compound URI) and an optional
//! post-resolution format:
//!
//! ```text
//! scheme:name#fragment+param=literal+param@nested|format
//! ```
//!
//! - `[...]` may wrap any compound URI; brackets are required to stop a nested URI
//!   from consuming the parameters that follow it.
//! - `~name` is shorthand for `a:name` (the alias pseudo-scheme).
//! - `+p=text` is shorthand for `+p@s:text` (the literal scheme).
//!
//! Equality and hashing are defined by the canonical form: scheme, name and fragment
//! percent-encoded, parameters sorted by name and each parameter value bracketed and
//! canonicalized recursively.
#![warn(missing_docs)]

mod error;
mod parse;
mod relative;
mod uri;


pub use error::Error;
pub use uri::CompoundUri;

/// Scheme whose name is the literal value itself.
pub const LITERAL_SCHEME: &str = "s";

/// Pseudo-scheme produced by `~name`; resolved through an alias table.
pub const ALIAS_SCHEME: &str = "a";
