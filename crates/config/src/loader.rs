//! Parse and load configuration documents.

use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use compound_uri::CompoundUri;
use tracing::debug;

use crate::{Configuration, Error, Json, UriHandler, error::excerpt_at, schemes::FileScheme};

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON.
    Json,
    /// Rusty Object Notation.
    Ron,
}

impl Format {
    /// Format implied by a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(OsStr::to_str) {
            Some("json") => Some(Self::Json),
            Some("ron") => Some(Self::Ron),
            _ => None,
        }
    }
}

/// Load a root configuration from a `.json` or `.ron` file.
///
/// When `handler` has no `file` scheme one is added, rooted at the current
/// directory. Relative `file:` references inside the document resolve
/// against the document's own path.
pub fn load_from_path(path: &Path, handler: &UriHandler) -> Result<Configuration, Error> {
    let format = Format::from_path(path).ok_or_else(|| Error::Read {
        path: Some(path.to_path_buf()),
        message: "Unsupported config format (expected a .json or .ron file)".to_string(),
    })?;
    let source = fs::read_to_string(path).map_err(|e| Error::Read {
        path: Some(path.to_path_buf()),
        message: e.to_string(),
    })?;

    let mut handler = handler.clone();
    if !handler.has_scheme("file") {
        handler = handler.with_scheme("file", FileScheme::new(PathBuf::from(".")));
    }
    let base = CompoundUri::new("file", path.to_string_lossy().into_owned());
    handler = handler.with_reference_context("file", base);

    debug!(path = %path.display(), ?format, "loading configuration");
    load_from_str(&source, format, Some(path), &handler)
}

/// Parse a root configuration from text.
pub fn load_from_str(
    source: &str,
    format: Format,
    path: Option<&Path>,
    handler: &UriHandler,
) -> Result<Configuration, Error> {
    let data: Json = match format {
        Format::Json => serde_json::from_str(source).map_err(|e| {
            let (line, col) = (e.line(), e.column());
            Error::Parse {
                path: path.map(Path::to_path_buf),
                line,
                col,
                message: e.to_string(),
                excerpt: excerpt_at(source, line, col),
            }
        })?,
        Format::Ron => ron::from_str(source).map_err(|e| Error::Validation {
            path: path.map(Path::to_path_buf),
            line: None,
            col: None,
            message: format!("RON parse error: {}", e),
            excerpt: None,
        })?,
    };
    if !data.is_object() {
        return Err(Error::Validation {
            path: path.map(Path::to_path_buf),
            line: None,
            col: None,
            message: "top-level configuration must be a map".to_string(),
            excerpt: None,
        });
    }
    Ok(Configuration::new(data, handler.clone()))
}
