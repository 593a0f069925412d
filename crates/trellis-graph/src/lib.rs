//! Builds live object graphs from configuration.
//!
//! A [`Container`] takes a root [`Configuration`], builds each top-level
//! name into a value and keeps the results in a named registry. Maps become
//! objects through `-class`, `-type` and `-factory` hints or the declared
//! type of the receiving property; everything else becomes plain values and
//! collections. Named references (`@named:other`) may form cycles: the
//! builder defers the affected assignments and fires each object's
//! `after_configured` hook only once the object is fully wired.
//!
//! Types take part by implementing [`Component`], usually through the
//! [`component!`] macro, and are registered by name in a [`TypeRegistry`].

mod container;
mod error;
mod macros;
mod record;
mod registry;
mod schemes;
mod types;

pub use config::{
    Component, Configuration, FromValue, IntoValue, ObjectRef, Params, PropertyDescriptor,
    PropertyKind, PropertyType, UriHandler, Value,
};
pub use container::{CYCLE_TARGET, Container, WeakContainer};
pub use error::{Error, Result};
pub use record::Record;
pub use registry::Registry;
pub use schemes::{MakeScheme, NamedScheme, NewScheme};
pub use types::{Constructor, Factory, TypeRegistry};
