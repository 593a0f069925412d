//! URI schemes backed by a container: `named:`, `make:` and `new:`.

use compound_uri::CompoundUri;
use config::{Params, SchemeResolver, Value};

use crate::{Error, container::WeakContainer};

/// Surface a builder failure through the configuration layer.
fn dereference_error(uri: &CompoundUri, err: &Error) -> config::Error {
    config::Error::Dereference {
        uri: uri.to_string(),
        message: err.to_string(),
    }
}

/// Apply the URI fragment, if any, as a key path into `value`.
fn project(uri: &CompoundUri, value: Option<Value>) -> Option<Value> {
    match uri.fragment() {
        Some(path) => value.and_then(|v| v.value_at_path(path)),
        None => value,
    }
}

/// `named:<name>#<key-path>`: a registry entry, built on demand. A name that
/// is still building yields a placeholder carrying the key path.
#[derive(Clone)]
pub struct NamedScheme {
    /// Owning container.
    container: WeakContainer,
}

impl NamedScheme {
    /// A resolver for `container`.
    pub fn new(container: WeakContainer) -> Self {
        Self { container }
    }
}

impl SchemeResolver for NamedScheme {
    fn dereference(
        &self,
        uri: &CompoundUri,
        _params: &Params,
    ) -> Result<Option<Value>, config::Error> {
        let Some(container) = self.container.upgrade() else {
            return Ok(None);
        };
        let value = container
            .try_get_named(uri.name())
            .map_err(|err| dereference_error(uri, &err))?;
        Ok(project(uri, value))
    }
}

/// `make:<key-path>+<params>`: the configuration at a root key path, with the
/// URI parameters bound, built into a fresh value on every dereference.
#[derive(Clone)]
pub struct MakeScheme {
    /// Owning container.
    container: WeakContainer,
}

impl MakeScheme {
    /// A resolver for `container`.
    pub fn new(container: WeakContainer) -> Self {
        Self { container }
    }
}

impl SchemeResolver for MakeScheme {
    fn dereference(&self, uri: &CompoundUri, params: &Params) -> Result<Option<Value>, config::Error> {
        let Some(container) = self.container.upgrade() else {
            return Ok(None);
        };
        let value = container
            .make(uri.name(), params)
            .map_err(|err| dereference_error(uri, &err))?;
        Ok(project(uri, value))
    }
}

/// `new:<class>+<params>`: a bare instance with the parameters injected.
#[derive(Clone)]
pub struct NewScheme {
    /// Owning container.
    container: WeakContainer,
}

impl NewScheme {
    /// A resolver for `container`.
    pub fn new(container: WeakContainer) -> Self {
        Self { container }
    }
}

impl SchemeResolver for NewScheme {
    fn dereference(&self, uri: &CompoundUri, params: &Params) -> Result<Option<Value>, config::Error> {
        let Some(container) = self.container.upgrade() else {
            return Ok(None);
        };
        let object = container
            .instantiate(uri.name(), params)
            .map_err(|err| dereference_error(uri, &err))?;
        Ok(project(uri, Some(Value::Object(object))))
    }
}
