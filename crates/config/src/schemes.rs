//! Built-in scheme resolvers and formatters.

use std::{
    fs,
    path::{Path, PathBuf},
};

use compound_uri::CompoundUri;

use crate::{
    Configuration, Error, Json, Representation, Resource, ResourceData, Value,
    scheme::{Formatter, Params, SchemeResolver, UriHandler},
};

/// `s:` resolves to its own name as text.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralScheme;

impl SchemeResolver for LiteralScheme {
    fn dereference(&self, uri: &CompoundUri, _params: &Params) -> Result<Option<Value>, Error> {
        Ok(Some(Value::String(uri.name().to_string())))
    }
}

/// `file:` reads files from disk.
///
/// Relative names resolve against the file the reference appears in, falling
/// back to `root`. A fragment selects a key path inside a structured file.
#[derive(Debug, Clone)]
pub struct FileScheme {
    /// Directory that names without a reference context are relative to.
    root: PathBuf,
}

impl FileScheme {
    /// Resolve relative names against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem path for a URI name.
    fn path_for(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl SchemeResolver for FileScheme {
    fn dereference(&self, uri: &CompoundUri, _params: &Params) -> Result<Option<Value>, Error> {
        let path = self.path_for(uri.name());
        let bytes = fs::read(&path).map_err(|e| Error::Read {
            path: Some(path.clone()),
            message: e.to_string(),
        })?;
        let data = match String::from_utf8(bytes) {
            Ok(text) => ResourceData::Text(text),
            Err(err) => ResourceData::Bytes(err.into_bytes()),
        };
        let resource = Resource::new(uri.with_fragment(None), data);
        let Some(fragment) = uri.fragment().filter(|f| !f.is_empty()) else {
            return Ok(Some(Value::Resource(resource)));
        };
        let structured = resource
            .structured_data()
            .ok_or_else(|| Error::Dereference {
                uri: uri.to_string(),
                message: "fragment requires structured data".to_string(),
            })?;
        Ok(json_at_path(&structured, fragment).map(|sub| match sub {
            Json::Object(_) | Json::Array(_) => {
                Value::Resource(Resource::new(uri.clone(), ResourceData::Json(sub.clone())))
            }
            scalar => Value::from_json(scalar),
        }))
    }

    fn supports_relative(&self) -> bool {
        true
    }
}

/// Navigate a dot-separated key path through raw JSON.
pub(crate) fn json_at_path<'a>(json: &'a Json, path: &str) -> Option<&'a Json> {
    path.split('.')
        .filter(|seg| !seg.is_empty())
        .try_fold(json, |node, seg| match node {
            Json::Object(map) => map.get(seg),
            Json::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// `|json` parses text and resources into structured data.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataFormatter;

impl Formatter for DataFormatter {
    fn format(&self, value: Value, _uri: &CompoundUri, handler: &UriHandler) -> Option<Value> {
        handler.converter().convert(&value, Representation::Data)
    }
}

/// `|<representation>` converts through the handler's converter.
#[derive(Debug, Clone, Copy)]
pub struct RepresentationFormatter(pub Representation);

impl Formatter for RepresentationFormatter {
    fn format(&self, value: Value, _uri: &CompoundUri, handler: &UriHandler) -> Option<Value> {
        match self.0 {
            Representation::Configuration => match value {
                Value::Configuration(_) => Some(value),
                Value::Resource(res) => res.to_configuration().map(Value::Configuration),
                Value::Map(_) | Value::List(_) => Some(Value::Configuration(Configuration::new(
                    value.to_json(),
                    handler.clone(),
                ))),
                _ => None,
            },
            repr => handler.converter().convert(&value, repr),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn files_resolve_relative_to_the_referencing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("conf/shared")).expect("mkdir");
        fs::write(
            dir.path().join("conf/shared/db.json"),
            r#"{"pool": {"size": 4}, "host": "localhost"}"#,
        )
        .expect("write");

        let handler = UriHandler::standard()
            .with_scheme("file", FileScheme::new(dir.path()))
            .with_reference_context("file", CompoundUri::new("file", "conf/app/main.json"));

        let Some(Value::Resource(res)) = handler.dereference("file:../shared/db.json") else {
            panic!("expected resource");
        };
        assert_eq!(res.uri().name(), "conf/shared/db.json");
        assert_eq!(
            res.structured_data().and_then(|j| j.get("host").cloned()),
            Some(json!("localhost"))
        );

        let size = handler
            .dereference("file:../shared/db.json#pool.size|number")
            .expect("size");
        assert_eq!(size, Value::from(4));

        let pool = handler
            .dereference("file:../shared/db.json#pool|configuration")
            .expect("pool");
        match pool {
            Value::Configuration(cfg) => assert_eq!(cfg.get_number("size"), Some(4.0)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_files_are_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handler = UriHandler::standard().with_scheme("file", FileScheme::new(dir.path()));
        let err = handler
            .try_dereference(&CompoundUri::new("file", "absent.json"))
            .expect_err("missing");
        assert!(matches!(err, Error::Read { .. }));
        assert!(handler.dereference("file:absent.json").is_none());
    }

    #[test]
    fn json_paths() {
        let doc = json!({"a": [{"b": 1}]});
        assert_eq!(json_at_path(&doc, "a.0.b"), Some(&json!(1)));
        assert_eq!(json_at_path(&doc, ""), Some(&doc));
        assert_eq!(json_at_path(&doc, "a.1"), None);
    }
}
