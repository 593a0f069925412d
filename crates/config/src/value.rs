//! The dynamic value model produced by configuration resolution.

use std::{collections::BTreeMap, fmt};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, SecondsFormat, Utc};
use compound_uri::CompoundUri;
use serde_json::Number;

use crate::{Configuration, Json, ObjectRef, Resource};

/// A resolved configuration value.
///
/// Raw configuration data only ever yields the JSON-shaped variants. The others
/// appear once a value has passed through a scheme resolver, a converter or the
/// object graph builder.
#[derive(Clone, Default)]
pub enum Value {
    /// Explicit null.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer or floating point number.
    Number(Number),
    /// Text.
    String(String),
    /// A point in time.
    Date(DateTime<Utc>),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// A compound URI.
    Uri(CompoundUri),
    /// Ordered sequence.
    List(Vec<Self>),
    /// Key/value mapping.
    Map(BTreeMap<String, Self>),
    /// A nested configuration node.
    Configuration(Configuration),
    /// Data fetched by a scheme resolver.
    Resource(Resource),
    /// A live component instance.
    Object(ObjectRef),
    /// Placeholder for a named value that is still under construction.
    Pending(Pending),
}

/// A named value that cannot be produced yet because its construction is in
/// progress further up the call stack.
///
/// Pending values are transient: the builder substitutes the real value before
/// a build pass completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    /// The name under construction.
    pub name: String,
    /// Key path to apply to the named value once it exists.
    pub path: Option<String>,
}

impl Pending {
    /// A placeholder for `name`, optionally projected through `path`.
    pub fn new(name: impl Into<String>, path: Option<&str>) -> Self {
        Self {
            name: name.into(),
            path: path.filter(|p| !p.is_empty()).map(str::to_string),
        }
    }

    /// Extend the projection with a further key path.
    pub fn project(&self, path: &str) -> Self {
        let path = match &self.path {
            Some(existing) if !path.is_empty() => format!("{}.{}", existing, path),
            Some(existing) => existing.clone(),
            None => path.to_string(),
        };
        Self::new(self.name.clone(), Some(&path))
    }
}

impl Value {
    /// Convert raw JSON data, preserving key order where the source has one.
    pub fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => Self::Number(n.clone()),
            Json::String(s) => Self::String(s.clone()),
            Json::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Json::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render as JSON. Objects render their properties; an object reachable
    /// from itself renders as its type name on the second visit.
    pub fn to_json(&self) -> Json {
        self.to_json_guarded(&mut Vec::new())
    }

    /// [`Value::to_json`], tracking the objects currently being rendered.
    fn to_json_guarded(&self, visiting: &mut Vec<usize>) -> Json {
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => Json::Number(n.clone()),
            Self::String(s) => Json::String(s.clone()),
            Self::Date(d) => Json::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Binary(bytes) => Json::String(STANDARD.encode(bytes)),
            Self::Uri(uri) => Json::String(uri.canonical().to_string()),
            Self::List(items) => {
                Json::Array(items.iter().map(|v| v.to_json_guarded(visiting)).collect())
            }
            Self::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_guarded(visiting)))
                    .collect(),
            ),
            Self::Configuration(cfg) => cfg.data().clone(),
            Self::Resource(res) => res
                .structured_data()
                .or_else(|| res.text().map(|t| Json::String(t.into_owned())))
                .unwrap_or(Json::Null),
            Self::Object(obj) => {
                let addr = obj.addr();
                if visiting.contains(&addr) {
                    return Json::String(format!("<{}>", obj.type_name()));
                }
                visiting.push(addr);
                let mut out = serde_json::Map::new();
                out.insert("-type".into(), Json::String(obj.type_name().to_string()));
                let props = obj.borrow().properties();
                for prop in props {
                    if let Some(v) = obj.get(&prop.name) {
                        out.insert(prop.name.to_string(), v.to_json_guarded(visiting));
                    }
                }
                visiting.pop();
                Json::Object(out)
            }
            Self::Pending(p) => Json::String(match &p.path {
                Some(path) => format!("<pending {}#{}>", p.name, path),
                None => format!("<pending {}>", p.name),
            }),
        }
    }

    /// Short label for the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Binary(_) => "binary",
            Self::Uri(_) => "uri",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Configuration(_) => "configuration",
            Self::Resource(_) => "resource",
            Self::Object(_) => "object",
            Self::Pending(_) => "pending",
        }
    }

    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the text of a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Numeric value as `i64`, accepting floats with no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        }
    }

    /// Boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the object handle of a [`Value::Object`].
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Text used when a value is spliced into a template or rendered for display.
    pub fn to_display_string(&self) -> Option<String> {
        match self {
            Self::Null | Self::Pending(_) => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(n.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Date(d) => Some(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Uri(uri) => Some(uri.canonical().to_string()),
            Self::Resource(res) => res.text().map(|t| t.into_owned()),
            other => Some(other.to_json().to_string()),
        }
    }

    /// True when this value, or anything nested in a list or map, is pending.
    pub fn contains_pending(&self) -> bool {
        match self {
            Self::Pending(_) => true,
            Self::List(items) => items.iter().any(Self::contains_pending),
            Self::Map(map) => map.values().any(Self::contains_pending),
            _ => false,
        }
    }

    /// Follow a dot-separated key path into this value.
    ///
    /// Lists take numeric segments; configurations resolve the path themselves;
    /// objects are read through their property descriptors. A pending value
    /// absorbs the path into its projection.
    pub fn value_at_path(&self, path: &str) -> Option<Self> {
        if path.is_empty() {
            return Some(self.clone());
        }
        match self {
            Self::Configuration(cfg) => return cfg.get_value(path),
            Self::Pending(p) => return Some(Self::Pending(p.project(path))),
            _ => {}
        }
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, rest),
            None => (path, ""),
        };
        let child = match self {
            Self::Map(map) => map.get(head).cloned(),
            Self::List(items) => head.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
            Self::Resource(res) => return res.to_configuration()?.get_value(path),
            Self::Object(obj) => obj.get(head),
            _ => None,
        }?;
        child.value_at_path(rest)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Date(d) => f.debug_tuple("Date").field(d).finish(),
            Self::Binary(b) => f.debug_tuple("Binary").field(&b.len()).finish(),
            Self::Uri(u) => f.debug_tuple("Uri").field(u).finish(),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Map(map) => f.debug_map().entries(map).finish(),
            Self::Configuration(c) => f.debug_tuple("Configuration").field(c).finish(),
            Self::Resource(r) => f.debug_tuple("Resource").field(r).finish(),
            Self::Object(o) => f.debug_tuple("Object").field(o).finish(),
            Self::Pending(p) => f.debug_tuple("Pending").field(p).finish(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Binary(a), Self::Binary(b)) => a == b,
            (Self::Uri(a), Self::Uri(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Configuration(a), Self::Configuration(b)) => a == b,
            (Self::Resource(a), Self::Resource(b)) => a.uri() == b.uri(),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Pending(a), Self::Pending(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<CompoundUri> for Value {
    fn from(uri: CompoundUri) -> Self {
        Self::Uri(uri)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Self::Object(obj)
    }
}

impl From<Configuration> for Value {
    fn from(cfg: Configuration) -> Self {
        Self::Configuration(cfg)
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn paths_walk_maps_and_lists() {
        let v = Value::from(json!({"a": {"b": [10, {"c": "deep"}]}}));
        assert_eq!(v.value_at_path("a.b.0"), Some(Value::from(10)));
        assert_eq!(v.value_at_path("a.b.1.c"), Some(Value::from("deep")));
        assert_eq!(v.value_at_path("a.x"), None);
        assert_eq!(v.value_at_path("a.b.7"), None);
        assert_eq!(v.value_at_path(""), Some(v.clone()));
    }

    #[test]
    fn pending_absorbs_paths() {
        let p = Value::Pending(Pending::new("db", Some("pool")));
        match p.value_at_path("size") {
            Some(Value::Pending(p)) => {
                assert_eq!(p.name, "db");
                assert_eq!(p.path.as_deref(), Some("pool.size"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Value::List(vec![Value::Null, p]).contains_pending());
    }

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(Value::from(2), Value::from(2.0));
        assert_ne!(Value::from(2), Value::from("2"));
        assert_eq!(Value::from(3.0).as_i64(), Some(3));
        assert_eq!(Value::from(3.5).as_i64(), None);
    }

    #[test]
    fn display_strings() {
        assert_eq!(Value::from(5).to_display_string().as_deref(), Some("5"));
        assert_eq!(Value::from(true).to_display_string().as_deref(), Some("true"));
        assert_eq!(Value::Null.to_display_string(), None);
    }
}
