//! Data fetched by scheme resolvers.

use std::{borrow::Cow, fmt, str::from_utf8};

use compound_uri::CompoundUri;

use crate::{Configuration, Json, UriHandler};

/// Payload of a [`Resource`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Already-parsed structured data.
    Json(Json),
}

/// A resource located by a URI, together with the handler that relative
/// references inside it resolve through.
#[derive(Clone)]
pub struct Resource {
    /// Where the data came from.
    uri: CompoundUri,
    /// The payload.
    data: ResourceData,
    /// Handler scoped to this resource's location, once dereferenced.
    handler: Option<UriHandler>,
}

impl Resource {
    /// A resource with no handler attached.
    pub fn new(uri: CompoundUri, data: ResourceData) -> Self {
        Self {
            uri,
            data,
            handler: None,
        }
    }

    /// Copy with a handler attached.
    pub fn with_handler(&self, handler: UriHandler) -> Self {
        Self {
            handler: Some(handler),
            ..self.clone()
        }
    }

    /// Source URI.
    pub fn uri(&self) -> &CompoundUri {
        &self.uri
    }

    /// Payload.
    pub fn data(&self) -> &ResourceData {
        &self.data
    }

    /// Attached handler, if any.
    pub fn handler(&self) -> Option<&UriHandler> {
        self.handler.as_ref()
    }

    /// The payload as text. Bytes must be valid UTF-8.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match &self.data {
            ResourceData::Text(t) => Some(Cow::Borrowed(t)),
            ResourceData::Bytes(b) => from_utf8(b).ok().map(Cow::Borrowed),
            ResourceData::Json(j) => Some(Cow::Owned(j.to_string())),
        }
    }

    /// True when the URI names a RON document.
    fn is_ron(&self) -> bool {
        self.uri.name().ends_with(".ron")
    }

    /// The payload parsed as structured data: JSON, or RON when the URI names
    /// a `.ron` file.
    pub fn structured_data(&self) -> Option<Json> {
        match &self.data {
            ResourceData::Json(j) => Some(j.clone()),
            ResourceData::Text(_) | ResourceData::Bytes(_) => {
                let text = self.text()?;
                if self.is_ron() {
                    ron::from_str::<Json>(&text).ok()
                } else {
                    serde_json::from_str::<Json>(&text).ok()
                }
            }
        }
    }

    /// Promote structured payloads to a root configuration that resolves
    /// references through this resource's handler.
    pub fn to_configuration(&self) -> Option<Configuration> {
        let data = self.structured_data()?;
        if !(data.is_object() || data.is_array()) {
            return None;
        }
        Some(Configuration::new(data, self.handler.clone().unwrap_or_default()))
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.data {
            ResourceData::Text(t) => format!("text, {} bytes", t.len()),
            ResourceData::Bytes(b) => format!("binary, {} bytes", b.len()),
            ResourceData::Json(_) => "json".to_string(),
        };
        write!(f, "Resource({}, {})", self.uri, kind)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn structured_by_extension() {
        let uri = CompoundUri::new("file", "conf/a.ron");
        let res = Resource::new(uri, ResourceData::Text(r#"{"size": 3, "tags": ["a"]}"#.into()));
        assert_eq!(res.structured_data(), Some(json!({"size": 3, "tags": ["a"]})));

        let uri = CompoundUri::new("file", "conf/a.json");
        let res = Resource::new(uri, ResourceData::Bytes(br#"{"size": 3}"#.to_vec()));
        let cfg = res.to_configuration().expect("config");
        assert_eq!(cfg.get_number("size"), Some(3.0));
    }

    #[test]
    fn plain_text_is_not_configuration() {
        let uri = CompoundUri::new("file", "notes.txt");
        let res = Resource::new(uri, ResourceData::Text("hello".into()));
        assert!(res.to_configuration().is_none());
        assert_eq!(res.text().as_deref(), Some("hello"));
    }
}
