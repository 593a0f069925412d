//! Configuration nodes: key-path access, prefix-coded value resolution and
//! the merge/inheritance algebra.
//!
//! String values may carry a single-character prefix that changes how they
//! are read:
//!
//! | prefix | meaning                                                    |
//! |--------|------------------------------------------------------------|
//! | `$`    | context parameter; a string result is resolved again        |
//! | `?`    | template expanded against the context, then resolved again |
//! | `@`    | compound URI, dereferenced through the [`UriHandler`]      |
//! | `#`    | key path resolved against the root configuration           |
//! | `` ` ``| escape: the rest of the string, verbatim                   |

use std::{cell::Cell, collections::HashMap, fmt, rc::Rc};

use chrono::{DateTime, Utc};
use compound_uri::CompoundUri;
use serde_json::Map;
use tracing::{debug, warn};

use crate::{
    Json, Representation, Value,
    merge::{self, CONFIG_KEY, EXTENDS_KEY, MIXIN_KEY, MIXINS_KEY},
    scheme::{Params, UriHandler},
    schemes::json_at_path,
    template,
};

/// Longest chain of prefix rewrites and root back-references followed while
/// resolving a single value.
pub const MAX_RESOLUTION_DEPTH: usize = 32;

/// Context parameters, keyed with their `$` prefix.
type Context = HashMap<String, Value>;

thread_local! {
    /// Root back-references currently being followed on this thread.
    static ROOT_HOPS: Cell<usize> = const { Cell::new(0) };
}

/// One level of `#` back-reference; released on drop.
struct RootHop;

impl RootHop {
    /// Enter a back-reference, or `None` when the chain is already too deep.
    fn enter() -> Option<Self> {
        ROOT_HOPS.with(|hops| {
            if hops.get() >= MAX_RESOLUTION_DEPTH {
                return None;
            }
            hops.set(hops.get() + 1);
            Some(Self)
        })
    }
}

impl Drop for RootHop {
    fn drop(&mut self) {
        ROOT_HOPS.with(|hops| hops.set(hops.get().saturating_sub(1)));
    }
}

/// A node in a configuration tree.
///
/// Configurations are immutable: merging, extending and normalizing return
/// new instances. Clones share their data.
#[derive(Clone)]
pub struct Configuration {
    /// Own keys, without `$` parameters.
    data: Rc<Json>,
    /// Data as supplied, before parameter extraction and merging.
    source: Rc<Json>,
    /// Parameters shared with configurations derived from this one.
    context: Rc<Context>,
    /// Anchor for `#` paths; `None` when this node is the root.
    root: Option<Rc<Self>>,
    /// Dereferences `@` values.
    handler: UriHandler,
    /// When set, a `#` path that resolves to nothing yields nothing instead
    /// of its own text.
    strict_paths: bool,
}

impl Configuration {
    /// A root configuration. Top-level `$` keys move into the context.
    pub fn new(data: Json, handler: UriHandler) -> Self {
        let source = Rc::new(data.clone());
        let (data, params) = split_parameters(data);
        Self {
            data: Rc::new(data),
            source,
            context: Rc::new(params.into_iter().collect()),
            root: None,
            handler,
            strict_paths: false,
        }
    }

    /// An empty root configuration.
    pub fn empty(handler: UriHandler) -> Self {
        Self::new(Json::Object(Map::new()), handler)
    }

    /// A child node that inherits this node's context, root and handler.
    /// `$` keys in `data` extend the inherited context.
    pub fn child(&self, data: Json) -> Self {
        let source = Rc::new(data.clone());
        let (data, params) = split_parameters(data);
        let context = if params.is_empty() {
            self.context.clone()
        } else {
            let mut context = (*self.context).clone();
            context.extend(params);
            Rc::new(context)
        };
        Self {
            data: Rc::new(data),
            source,
            context,
            root: Some(self.root_rc()),
            handler: self.handler.clone(),
            strict_paths: self.strict_paths,
        }
    }

    /// Copy using a different URI handler.
    pub fn with_uri_handler(&self, handler: UriHandler) -> Self {
        Self {
            handler,
            ..self.clone()
        }
    }

    /// Copy in which unresolvable `#` paths yield nothing rather than their
    /// literal text.
    pub fn with_strict_paths(&self, strict: bool) -> Self {
        Self {
            strict_paths: strict,
            ..self.clone()
        }
    }

    /// Copy with different data and context, keeping root, handler and source.
    fn derive(&self, data: Json, context: Rc<Context>) -> Self {
        Self {
            data: Rc::new(data),
            context,
            ..self.clone()
        }
    }

    /// Shared handle to the root.
    fn root_rc(&self) -> Rc<Self> {
        match &self.root {
            Some(root) => root.clone(),
            None => Rc::new(self.clone()),
        }
    }

    /// The configuration `#` paths resolve against.
    pub fn root(&self) -> &Self {
        self.root.as_deref().unwrap_or(self)
    }

    /// True when this node is its own root.
    pub fn is_root(&self) -> bool {
        self.root.is_none()
    }

    /// Own data, without context parameters.
    pub fn data(&self) -> &Json {
        &self.data
    }

    /// Data as originally supplied.
    pub fn source_data(&self) -> &Json {
        &self.source
    }

    /// The handler `@` values dereference through.
    pub fn uri_handler(&self) -> &UriHandler {
        &self.handler
    }

    /// True when unresolvable `#` paths yield nothing.
    pub fn strict_paths(&self) -> bool {
        self.strict_paths
    }

    /// A context parameter, named with or without its `$`.
    pub fn context_value(&self, name: &str) -> Option<&Value> {
        if name.starts_with('$') {
            self.context.get(name)
        } else {
            self.context.get(&format!("${}", name))
        }
    }

    /// Names of all context parameters, sorted, with their `$`.
    pub fn context_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.context.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// True when both configurations see the same context instance.
    pub fn shares_context_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.context, &other.context)
    }

    /// Own keys in declaration order; indices for sequences.
    pub fn keys(&self) -> Vec<String> {
        match &*self.data {
            Json::Object(map) => map.keys().cloned().collect(),
            Json::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    /// True when the data is a sequence.
    pub fn is_list(&self) -> bool {
        self.data.is_array()
    }

    /// Raw, unresolved data at a key path.
    pub fn raw(&self, key_path: &str) -> Option<&Json> {
        json_at_path(&self.data, key_path)
    }

    /// True when the key path exists in the raw data.
    pub fn has_value(&self, key_path: &str) -> bool {
        self.raw(key_path).is_some()
    }

    /// The resolved value at a key path.
    pub fn get_value(&self, key_path: &str) -> Option<Value> {
        self.get_value_as(key_path, Representation::Default)
    }

    /// The resolved value at a key path, converted to `repr`.
    ///
    /// Nested maps and sequences resolve to child configurations. A string
    /// met part way along the path is resolved and the rest of the path is
    /// followed into its value.
    pub fn get_value_as(&self, key_path: &str, repr: Representation) -> Option<Value> {
        let value = self.value_at(key_path)?;
        self.represent(value, repr)
    }

    /// Text at a key path.
    pub fn get_string(&self, key_path: &str) -> Option<String> {
        match self.get_value_as(key_path, Representation::String)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Number at a key path.
    pub fn get_number(&self, key_path: &str) -> Option<f64> {
        self.get_value_as(key_path, Representation::Number)?.as_f64()
    }

    /// Boolean at a key path.
    pub fn get_bool(&self, key_path: &str) -> Option<bool> {
        self.get_value_as(key_path, Representation::Boolean)?.as_bool()
    }

    /// Date at a key path.
    pub fn get_date(&self, key_path: &str) -> Option<DateTime<Utc>> {
        match self.get_value_as(key_path, Representation::Date)? {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Compound URI at a key path.
    pub fn get_uri(&self, key_path: &str) -> Option<CompoundUri> {
        match self.get_value_as(key_path, Representation::Url)? {
            Value::Uri(u) => Some(u),
            _ => None,
        }
    }

    /// Child configuration at a key path.
    pub fn get_configuration(&self, key_path: &str) -> Option<Self> {
        match self.get_value_as(key_path, Representation::Configuration)? {
            Value::Configuration(c) => Some(c),
            _ => None,
        }
    }

    /// Configurations listed at a key path. A single configuration yields a
    /// one-element list; entries that are not configurations are skipped.
    pub fn get_configuration_list(&self, key_path: &str) -> Vec<Self> {
        let Some(cfg) = self.get_configuration(key_path) else {
            return Vec::new();
        };
        if !cfg.is_list() {
            return vec![cfg];
        }
        cfg.keys()
            .iter()
            .filter_map(|index| cfg.get_configuration(index))
            .collect()
    }

    /// Resolve a key path without conversion.
    fn value_at(&self, key_path: &str) -> Option<Value> {
        if key_path.is_empty() {
            return Some(Value::Configuration(self.clone()));
        }
        let segments: Vec<&str> = key_path.split('.').collect();
        let mut node: &Json = &self.data;
        for (i, segment) in segments.iter().enumerate() {
            node = json_child(node, segment)?;
            if let Json::String(s) = node
                && i + 1 < segments.len()
            {
                let resolved = self.resolve_string(s)?;
                return resolved.value_at_path(&segments[i + 1..].join("."));
            }
        }
        self.resolve_json(node)
    }

    /// Resolve one raw value.
    fn resolve_json(&self, node: &Json) -> Option<Value> {
        match node {
            Json::String(s) => self.resolve_string(s),
            Json::Object(_) | Json::Array(_) => Some(Value::Configuration(self.child(node.clone()))),
            other => Some(Value::from_json(other)),
        }
    }

    /// Apply the prefix rules to a string value.
    fn resolve_string(&self, text: &str) -> Option<Value> {
        let mut current = text.to_string();
        for _ in 0..MAX_RESOLUTION_DEPTH {
            let mut chars = current.chars();
            let Some(prefix) = chars.next() else {
                return Some(Value::String(current));
            };
            let rest = chars.as_str();
            match prefix {
                '$' => match self.context.get(&current) {
                    Some(Value::String(next)) => current = next.clone(),
                    Some(value) => return Some(value.clone()),
                    None => {
                        debug!(parameter = %current, "context parameter not bound");
                        return None;
                    }
                },
                '?' => current = template::expand(rest, &self.context),
                '@' => return self.handler.dereference(rest),
                '#' => return self.resolve_root_path(rest, &current),
                '`' => return Some(Value::String(rest.to_string())),
                _ => return Some(Value::String(current)),
            }
        }
        warn!(value = text, "prefix resolution did not settle; treating as absent");
        None
    }

    /// Resolve `path` against the root. A miss falls back to `literal`
    /// unless strict paths are enabled.
    fn resolve_root_path(&self, path: &str, literal: &str) -> Option<Value> {
        let Some(_hop) = RootHop::enter() else {
            warn!(path, "reference chain too deep; treating as absent");
            return None;
        };
        match self.root().value_at(path) {
            Some(value) => Some(value),
            None if self.strict_paths => {
                warn!(path, "root path did not resolve");
                None
            }
            None => {
                debug!(path, "root path did not resolve; using literal text");
                Some(Value::String(literal.to_string()))
            }
        }
    }

    /// Convert a resolved value to the requested representation.
    fn represent(&self, value: Value, repr: Representation) -> Option<Value> {
        match repr {
            Representation::Default => Some(value),
            Representation::Configuration => self.promote(value).map(Value::Configuration),
            other => self.handler.converter().convert(&value, other),
        }
    }

    /// Promote structured values to a configuration. Maps and lists become
    /// children of this node; a structured resource becomes its own root.
    fn promote(&self, value: Value) -> Option<Self> {
        match value {
            Value::Configuration(cfg) => Some(cfg),
            Value::Resource(res) => {
                let mut doc = res.to_configuration()?;
                if res.handler().is_none() {
                    doc = doc.with_uri_handler(self.handler.clone());
                }
                Some(doc.with_strict_paths(self.strict_paths))
            }
            Value::Map(_) | Value::List(_) => Some(self.child(value.to_json())),
            _ => None,
        }
    }

    /// This configuration with `mixin`'s top-level keys written over its own.
    /// Nested values are replaced, not merged.
    pub fn mixin_configuration(&self, mixin: &Self) -> Self {
        match (&*self.data, &*mixin.data) {
            (Json::Object(base), Json::Object(over)) => self.derive(
                Json::Object(merge::overlay(base, over)),
                merge::union_context(&self.context, &mixin.context),
            ),
            _ => self.clone(),
        }
    }

    /// This configuration layered over `parent`: keys of both, own values winning.
    pub fn extend_with_configuration(&self, parent: &Self) -> Self {
        match (&*parent.data, &*self.data) {
            (Json::Object(base), Json::Object(own)) => self.derive(
                Json::Object(merge::overlay(base, own)),
                merge::union_context(&self.context, &parent.context),
            ),
            _ => self.clone(),
        }
    }

    /// Apply `*config`, then `*mixin`, then each entry of `*mixins` in order.
    pub fn flatten(&self) -> Self {
        let mut result = self.clone();
        for key in [CONFIG_KEY, MIXIN_KEY] {
            if !self.has_value(key) {
                continue;
            }
            match self.get_configuration(key) {
                Some(mixin) => result = result.mixin_configuration(&mixin),
                None => warn!(key, "mixin did not resolve to a configuration"),
            }
        }
        if self.has_value(MIXINS_KEY) {
            for mixin in self.get_configuration_list(MIXINS_KEY) {
                result = result.mixin_configuration(&mixin);
            }
        }
        result
    }

    /// Flatten, follow the `*extends` chain and merge it from the most distant
    /// ancestor down to this node. A node that reappears ends the chain. The
    /// result carries no merge directives.
    pub fn normalize(&self) -> Self {
        if !self.data.is_object() {
            return self.flatten();
        }
        let mut chain: Vec<Self> = Vec::new();
        let mut next = Some(self.flatten());
        while let Some(node) = next {
            if chain.iter().any(|seen| seen.data == node.data) {
                debug!("inheritance cycle; chain ends at the repeated node");
                break;
            }
            next = if node.has_value(EXTENDS_KEY) {
                let parent = node.get_configuration(EXTENDS_KEY);
                if parent.is_none() {
                    warn!("*extends did not resolve to a configuration");
                }
                parent.map(|p| p.flatten())
            } else {
                None
            };
            chain.push(node);
        }

        let mut data = Map::new();
        let mut context = self.context.clone();
        for node in chain.iter().rev() {
            if let Json::Object(map) = &*node.data {
                data = merge::overlay(&data, map);
                context = merge::union_context(&context, &node.context);
            }
        }
        self.derive(Json::Object(merge::strip_directives(data)), context)
    }

    /// A copy whose context also binds each parameter as `$name`.
    pub fn extend_with_parameters(&self, params: &Params) -> Self {
        if params.is_empty() {
            return self.clone();
        }
        let mut context = (*self.context).clone();
        for (name, value) in params {
            let key = if name.starts_with('$') {
                name.clone()
            } else {
                format!("${}", name)
            };
            context.insert(key, value.clone());
        }
        Self {
            context: Rc::new(context),
            ..self.clone()
        }
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration({})", self.data)
    }
}

/// Move top-level `$` keys of an object out of the data.
fn split_parameters(data: Json) -> (Json, Vec<(String, Value)>) {
    let map = match data {
        Json::Object(map) => map,
        other => return (other, Vec::new()),
    };
    let mut params = Vec::new();
    let mut rest = Map::new();
    for (k, v) in map {
        if k.starts_with('$') {
            params.push((k, Value::from_json(&v)));
        } else {
            rest.insert(k, v);
        }
    }
    (Json::Object(rest), params)
}

/// One step of key-path navigation through raw data.
fn json_child<'a>(node: &'a Json, segment: &str) -> Option<&'a Json> {
    match node {
        Json::Object(map) => map.get(segment),
        Json::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
