//! Configuration engine for declarative object graphs.
//!
//! A [`Configuration`] wraps JSON-shaped data and resolves prefix-coded string
//! values on read: context parameters (`$`), templates (`?`), compound URI
//! references (`@`), root back-references (`#`) and escapes (`` ` ``). URI
//! references dereference through a [`UriHandler`], a registry of
//! [`SchemeResolver`]s. Configurations merge through mixins (`*config`,
//! `*mixin`, `*mixins`) and inheritance (`*extends`).
//!
//! Live components take part through the [`Component`] introspection trait.

mod configuration;
mod convert;
mod error;
mod loader;
pub mod merge;
mod object;
mod resource;
mod scheme;
mod schemes;
mod template;
mod value;

#[cfg(test)]
mod test_merge;
#[cfg(test)]
mod test_parse;
#[cfg(test)]
mod test_resolve;

pub use compound_uri::CompoundUri;
pub use configuration::{Configuration, MAX_RESOLUTION_DEPTH};
pub use convert::{Converter, Representation, StandardConverter};
pub use error::{Error, excerpt_at};
pub use loader::{Format, load_from_path, load_from_str};
pub use object::{
    Component, FromValue, IntoValue, ObjectRef, PropertyDescriptor, PropertyKind, PropertyType,
};
pub use resource::{Resource, ResourceData};
pub use scheme::{Formatter, Params, SchemeResolver, UriHandler};
pub use schemes::{DataFormatter, FileScheme, LiteralScheme, RepresentationFormatter};
pub use value::{Pending, Value};

/// Raw configuration data.
pub type Json = serde_json::Value;
