use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::OnceLock,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{ALIAS_SCHEME, Error, LITERAL_SCHEME, parse, relative};

/// An immutable compound URI.
///
/// Instances are created by [`CompoundUri::parse`] or by copy-with-modification
/// (`with_name`, `with_fragment`, ...). The canonical form is computed on first use
/// and cached; since every modification produces a new value the cache never goes
/// stale.
#[derive(Clone)]
pub struct CompoundUri {
    /// Addressing namespace, e.g. `file`, `named` or `s`.
    scheme: String,
    /// Scheme-specific path or identifier (decoded).
    name: String,
    /// Optional fragment (decoded).
    fragment: Option<String>,
    /// Optional name of a formatter applied after dereferencing.
    format: Option<String>,
    /// Named parameters, kept sorted so iteration order is canonical.
    parameters: BTreeMap<String, CompoundUri>,
    /// Lazily computed canonical serialization.
    canonical: OnceLock<String>,
}

impl CompoundUri {
    /// Construct a URI from a scheme and a name.
    pub fn new(scheme: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_parts(
            scheme.into(),
            name.into(),
            None,
            BTreeMap::new(),
            None,
        )
    }

    /// Construct a literal-scheme URI whose name is `value`.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::new(LITERAL_SCHEME, value)
    }

    /// Construct an alias URI (`~name`).
    pub fn alias(name: impl Into<String>) -> Self {
        Self::new(ALIAS_SCHEME, name)
    }

    /// Assemble a URI from already-decoded parts.
    pub(crate) fn from_parts(
        scheme: String,
        name: String,
        fragment: Option<String>,
        parameters: BTreeMap<String, Self>,
        format: Option<String>,
    ) -> Self {
        Self {
            scheme,
            name,
            fragment,
            format,
            parameters,
            canonical: OnceLock::new(),
        }
    }

    /// Parse a compound URI, failing with [`Error::Syntax`] on malformed input.
    pub fn parse(s: &str) -> Result<Self, Error> {
        parse::parse(s)
    }

    /// Parse a compound URI, returning `None` on malformed input.
    pub fn try_parse(s: &str) -> Option<Self> {
        parse::parse(s).ok()
    }

    /// The URI scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The decoded scheme-specific name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The decoded fragment, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// The post-resolution format name, if any.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// All parameters, in canonical (name) order.
    pub fn parameters(&self) -> &BTreeMap<String, Self> {
        &self.parameters
    }

    /// A single parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Self> {
        self.parameters.get(name)
    }

    /// True when this URI uses the literal scheme.
    pub fn is_literal(&self) -> bool {
        self.scheme == LITERAL_SCHEME
    }

    /// True when this URI uses the alias pseudo-scheme.
    pub fn is_alias(&self) -> bool {
        self.scheme == ALIAS_SCHEME
    }

    /// The literal text when this is a literal-scheme URI.
    pub fn literal_value(&self) -> Option<&str> {
        self.is_literal().then_some(self.name.as_str())
    }

    /// Copy with a different name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self::from_parts(
            self.scheme.clone(),
            name.into(),
            self.fragment.clone(),
            self.parameters.clone(),
            self.format.clone(),
        )
    }

    /// Copy with a different fragment (`None` removes it).
    pub fn with_fragment(&self, fragment: Option<&str>) -> Self {
        Self::from_parts(
            self.scheme.clone(),
            self.name.clone(),
            fragment.map(str::to_string),
            self.parameters.clone(),
            self.format.clone(),
        )
    }

    /// Copy with a different format (`None` removes it).
    pub fn with_format(&self, format: Option<&str>) -> Self {
        Self::from_parts(
            self.scheme.clone(),
            self.name.clone(),
            self.fragment.clone(),
            self.parameters.clone(),
            format.map(str::to_string),
        )
    }

    /// Copy with an added or replaced parameter.
    pub fn with_parameter(&self, name: impl Into<String>, value: Self) -> Self {
        let mut parameters = self.parameters.clone();
        parameters.insert(name.into(), value);
        Self::from_parts(
            self.scheme.clone(),
            self.name.clone(),
            self.fragment.clone(),
            parameters,
            self.format.clone(),
        )
    }

    /// Copy with every parameter removed.
    pub fn without_parameters(&self) -> Self {
        Self::from_parts(
            self.scheme.clone(),
            self.name.clone(),
            self.fragment.clone(),
            BTreeMap::new(),
            self.format.clone(),
        )
    }

    /// True when the name is a relative path (does not start with `/`).
    pub fn is_relative(&self) -> bool {
        !self.name.starts_with('/')
    }

    /// Resolve this URI against `base`, the URI of the resource it was found in.
    ///
    /// - URIs of a different scheme, or with an absolute name, are returned unchanged.
    /// - An empty name refers to the base resource itself (`file:#section`).
    /// - Otherwise the name is joined to the base name's directory and `.`/`..`
    ///   segments are collapsed.
    pub fn resolve_against(&self, base: &Self) -> Self {
        relative::resolve(self, base)
    }

    /// The canonical serialization: `scheme:name#fragment+p@[...]|format`.
    pub fn canonical(&self) -> &str {
        self.canonical.get_or_init(|| {
            let mut out = format!("{}:{}", encode_path(&self.scheme), encode_path(&self.name));
            if let Some(fragment) = &self.fragment {
                out.push('#');
                out.push_str(&encode_path(fragment));
            }
            for (name, value) in &self.parameters {
                out.push('+');
                out.push_str(name);
                out.push_str("@[");
                out.push_str(value.canonical());
                out.push(']');
            }
            if let Some(format) = &self.format {
                out.push('|');
                out.push_str(format);
            }
            out
        })
    }
}

/// Percent-encode each `/`-separated segment, leaving the separators in place.
fn encode_path(s: &str) -> String {
    s.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl PartialEq for CompoundUri {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for CompoundUri {}

impl Hash for CompoundUri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for CompoundUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

impl fmt::Debug for CompoundUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompoundUri").field(&self.canonical()).finish()
    }
}

impl FromStr for CompoundUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CompoundUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical())
    }
}

impl<'de> Deserialize<'de> for CompoundUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_round_trip() {
        let uri = CompoundUri::parse("s:hello+x=5").expect("parse");
        let x = uri.parameter("x").expect("param x");
        assert!(x.is_literal());
        assert_eq!(x.literal_value(), Some("5"));
        assert_eq!(uri.literal_value(), Some("hello"));
    }

    #[test]
    fn canonical_sorts_and_brackets_parameters() {
        let uri = CompoundUri::parse("make:Button+title=Go+color@named:red").expect("parse");
        assert_eq!(
            uri.canonical(),
            "make:Button+color@[named:red]+title@[s:Go]"
        );
    }

    #[test]
    fn parameter_order_does_not_affect_equality() {
        let a = CompoundUri::parse("x:y+a=1+b=2").expect("parse");
        let b = CompoundUri::parse("[ x:y +b@[s:2] +a=1 ]").expect("parse");
        assert_eq!(a, b);
    }

    #[test]
    fn alias_is_sugar() {
        let a = CompoundUri::parse("~theme|json").expect("parse");
        let b = CompoundUri::parse("a:theme|json").expect("parse");
        assert_eq!(a, b);
        assert!(a.is_alias());
        assert_eq!(a.format(), Some("json"));
    }

    #[test]
    fn copies_do_not_share_cache() {
        let uri = CompoundUri::parse("file:conf/app.json#db").expect("parse");
        assert_eq!(uri.canonical(), "file:conf/app.json#db");
        let other = uri.with_fragment(Some("cache"));
        assert_eq!(other.canonical(), "file:conf/app.json#cache");
        assert_eq!(uri.with_name("other.json").name(), "other.json");
        assert_eq!(uri.with_format(Some("json")).to_string(), "file:conf/app.json#db|json");
    }

    #[test]
    fn encoding_survives_reparse() {
        let uri = CompoundUri::new("s", "a b+c|d");
        let reparsed = CompoundUri::parse(uri.canonical()).expect("reparse");
        assert_eq!(reparsed.name(), "a b+c|d");
        assert_eq!(uri, reparsed);
    }

    #[test]
    fn serde_uses_canonical_string() {
        let uri = CompoundUri::parse("named:db+pool=4").expect("parse");
        let json = serde_json::to_string(&uri).expect("serialize");
        assert_eq!(json, "\"named:db+pool@[s:4]\"");
        let back: CompoundUri = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, uri);
    }
}
