//! Scheme registry and URI dereferencing.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    rc::Rc,
};

use compound_uri::{CompoundUri, LITERAL_SCHEME};
use tracing::{debug, warn};

use crate::{
    Converter, Error, Representation, StandardConverter, Value,
    schemes::{DataFormatter, LiteralScheme, RepresentationFormatter},
};

/// Parameters of a URI after each has been dereferenced.
pub type Params = BTreeMap<String, Value>;

/// Alias chains longer than this are treated as cycles.
const MAX_ALIAS_DEPTH: usize = 16;

/// Resolves URIs of one scheme.
pub trait SchemeResolver {
    /// Produce the value a URI names. `Ok(None)` means the URI is well-formed
    /// but names nothing.
    fn dereference(&self, uri: &CompoundUri, params: &Params) -> Result<Option<Value>, Error>;

    /// True when names of this scheme are paths that may be relative to the
    /// resource they appear in.
    fn supports_relative(&self) -> bool {
        false
    }
}

/// Post-resolution transform selected by a URI's `|format` suffix.
pub trait Formatter {
    /// Transform a dereferenced value.
    fn format(&self, value: Value, uri: &CompoundUri, handler: &UriHandler) -> Option<Value>;
}

/// Registry of scheme resolvers, formatters and aliases, plus the per-scheme
/// reference context used to resolve relative URIs.
///
/// Handlers are cheap to clone. The `with_*` methods return a copy with one
/// entry overridden and never touch the original.
#[derive(Clone)]
pub struct UriHandler {
    /// Resolver per scheme name.
    schemes: Rc<HashMap<String, Rc<dyn SchemeResolver>>>,
    /// Formatter per format name.
    formatters: Rc<HashMap<String, Rc<dyn Formatter>>>,
    /// Alias name to URI text.
    aliases: Rc<HashMap<String, String>>,
    /// Base URI per scheme for relative references.
    contexts: Rc<HashMap<String, CompoundUri>>,
    /// Representation conversion.
    converter: Rc<dyn Converter>,
}

impl UriHandler {
    /// A handler with no schemes or formatters and the standard converter.
    pub fn empty() -> Self {
        Self {
            schemes: Rc::default(),
            formatters: Rc::default(),
            aliases: Rc::default(),
            contexts: Rc::default(),
            converter: Rc::new(StandardConverter),
        }
    }

    /// The literal scheme plus a formatter for `json` and for every
    /// representation name.
    pub fn standard() -> Self {
        let mut handler = Self::empty()
            .with_scheme(LITERAL_SCHEME, LiteralScheme)
            .with_formatter("json", DataFormatter);
        for repr in Representation::ALL {
            if repr != Representation::Default {
                handler = handler.with_formatter(repr.as_str(), RepresentationFormatter(repr));
            }
        }
        handler
    }

    /// Copy with a resolver registered for `scheme`.
    pub fn with_scheme(&self, scheme: &str, resolver: impl SchemeResolver + 'static) -> Self {
        self.with_scheme_rc(scheme, Rc::new(resolver))
    }

    /// Copy with a shared resolver registered for `scheme`.
    pub fn with_scheme_rc(&self, scheme: &str, resolver: Rc<dyn SchemeResolver>) -> Self {
        let mut schemes = (*self.schemes).clone();
        schemes.insert(scheme.to_string(), resolver);
        Self {
            schemes: Rc::new(schemes),
            ..self.clone()
        }
    }

    /// Copy with a formatter registered under `name`.
    pub fn with_formatter(&self, name: &str, formatter: impl Formatter + 'static) -> Self {
        let mut formatters = (*self.formatters).clone();
        formatters.insert(name.to_string(), Rc::new(formatter));
        Self {
            formatters: Rc::new(formatters),
            ..self.clone()
        }
    }

    /// Copy with `~alias` bound to the URI text `target`.
    pub fn with_alias(&self, alias: &str, target: &str) -> Self {
        let mut aliases = (*self.aliases).clone();
        aliases.insert(alias.to_string(), target.to_string());
        Self {
            aliases: Rc::new(aliases),
            ..self.clone()
        }
    }

    /// Copy using a different converter.
    pub fn with_converter(&self, converter: impl Converter + 'static) -> Self {
        Self {
            converter: Rc::new(converter),
            ..self.clone()
        }
    }

    /// Copy whose relative references of `scheme` resolve against `base`.
    pub fn with_reference_context(&self, scheme: &str, base: CompoundUri) -> Self {
        let mut contexts = (*self.contexts).clone();
        contexts.insert(scheme.to_string(), base);
        Self {
            contexts: Rc::new(contexts),
            ..self.clone()
        }
    }

    /// Base URI for relative references of `scheme`.
    pub fn reference_context(&self, scheme: &str) -> Option<&CompoundUri> {
        self.contexts.get(scheme)
    }

    /// True when a resolver is registered for `scheme`.
    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.schemes.contains_key(scheme)
    }

    /// Registered scheme names, sorted.
    pub fn scheme_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The converter used for representation requests.
    pub fn converter(&self) -> &dyn Converter {
        self.converter.as_ref()
    }

    /// Parse and dereference URI text. Failures are logged and yield `None`.
    pub fn dereference(&self, text: &str) -> Option<Value> {
        match CompoundUri::parse(text) {
            Ok(uri) => self.dereference_uri(&uri),
            Err(err) => {
                warn!(uri = text, error = %err, "invalid compound URI");
                None
            }
        }
    }

    /// Dereference a parsed URI. Failures are logged and yield `None`.
    pub fn dereference_uri(&self, uri: &CompoundUri) -> Option<Value> {
        match self.try_dereference(uri) {
            Ok(value) => value,
            Err(err) => {
                warn!(uri = %uri, error = %err, "dereference failed");
                None
            }
        }
    }

    /// Dereference a parsed URI, surfacing failures.
    pub fn try_dereference(&self, uri: &CompoundUri) -> Result<Option<Value>, Error> {
        self.dereference_depth(uri, 0)
    }

    /// Dereference, counting alias hops.
    fn dereference_depth(&self, uri: &CompoundUri, depth: usize) -> Result<Option<Value>, Error> {
        if uri.is_alias() {
            return self.dereference_alias(uri, depth);
        }
        let resolver = self
            .schemes
            .get(uri.scheme())
            .ok_or_else(|| Error::SchemeNotFound {
                scheme: uri.scheme().to_string(),
            })?;
        let params = self.resolve_parameters(uri, depth)?;

        let mut target = uri.clone();
        if resolver.supports_relative()
            && let Some(base) = self.contexts.get(uri.scheme())
        {
            target = uri.resolve_against(base);
        }
        debug!(uri = %target, "dereference");

        let value = match resolver.dereference(&target, &params)? {
            Some(value) => value,
            None => return Ok(None),
        };
        let value = if resolver.supports_relative() {
            let derived =
                self.with_reference_context(target.scheme(), target.without_parameters());
            match value {
                Value::Resource(res) => Value::Resource(res.with_handler(derived)),
                Value::Configuration(cfg) => Value::Configuration(cfg.with_uri_handler(derived)),
                other => other,
            }
        } else {
            match value {
                Value::Resource(res) if res.handler().is_none() => {
                    Value::Resource(res.with_handler(self.clone()))
                }
                other => other,
            }
        };
        self.apply_format(value, &target)
    }

    /// Look up an alias and dereference its target, then apply the alias URI's
    /// own format, if any.
    fn dereference_alias(&self, uri: &CompoundUri, depth: usize) -> Result<Option<Value>, Error> {
        let unknown = || Error::UnknownAlias {
            alias: uri.name().to_string(),
        };
        if depth >= MAX_ALIAS_DEPTH {
            return Err(unknown());
        }
        let text = self.aliases.get(uri.name()).ok_or_else(unknown)?;
        let target = CompoundUri::parse(text)?;
        match self.dereference_depth(&target, depth + 1)? {
            Some(value) => self.apply_format(value, uri),
            None => Ok(None),
        }
    }

    /// Dereference every parameter. Literals short-circuit to their text;
    /// parameters that fail to resolve are logged and left out.
    fn resolve_parameters(&self, uri: &CompoundUri, depth: usize) -> Result<Params, Error> {
        let mut params = Params::new();
        for (name, value) in uri.parameters() {
            if let Some(text) = value.literal_value()
                && value.parameters().is_empty()
                && value.format().is_none()
            {
                params.insert(name.clone(), Value::String(text.to_string()));
                continue;
            }
            match self.dereference_depth(value, depth) {
                Ok(Some(v)) => {
                    params.insert(name.clone(), v);
                }
                Ok(None) => debug!(uri = %uri, param = %name, "parameter resolved to nothing"),
                Err(err) => warn!(uri = %uri, param = %name, error = %err, "parameter failed"),
            }
        }
        Ok(params)
    }

    /// Apply the URI's `|format`, if it has one.
    fn apply_format(&self, value: Value, uri: &CompoundUri) -> Result<Option<Value>, Error> {
        let Some(name) = uri.format() else {
            return Ok(Some(value));
        };
        let formatter = self
            .formatters
            .get(name)
            .ok_or_else(|| Error::UnknownFormat {
                format: name.to_string(),
            })?;
        Ok(formatter.format(value, uri, self))
    }
}

impl Default for UriHandler {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for UriHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<&String> = self.formatters.keys().collect();
        formats.sort_unstable();
        f.debug_struct("UriHandler")
            .field("schemes", &self.scheme_names())
            .field("formats", &formats)
            .field("contexts", &self.contexts)
            .finish()
    }
}
