//! Read-only commands: `uri`, `get` and `normalize`.

use std::path::Path;

use compound_uri::CompoundUri;
use config::{Configuration, UriHandler, Value};

use crate::{
    cli::{GetArgs, NormalizeArgs, UriArgs},
    error::{Error, Result},
};

/// Print the parts of each URI argument.
pub fn run_uri(args: &UriArgs) -> Result<()> {
    for text in &args.uris {
        println!("{}", describe_uri(text)?);
    }
    Ok(())
}

/// Print one resolved value.
pub fn run_get(args: &GetArgs) -> Result<()> {
    println!("{}", get(args)?);
    Ok(())
}

/// Print a normalized configuration.
pub fn run_normalize(args: &NormalizeArgs) -> Result<()> {
    println!("{}", normalize(args)?);
    Ok(())
}

/// Load a configuration file with the standard schemes.
pub fn load(path: &Path) -> Result<Configuration> {
    Ok(config::load_from_path(path, &UriHandler::standard())?)
}

/// Parse `text` and describe it, one component per line.
fn describe_uri(text: &str) -> Result<String> {
    let uri = CompoundUri::parse(text)?;
    let mut lines = Vec::new();
    describe_into(&uri, 0, &mut lines);
    Ok(lines.join("\n"))
}

/// Append the description of `uri`, nesting parameters one level deeper.
fn describe_into(uri: &CompoundUri, depth: usize, lines: &mut Vec<String>) {
    let pad = "  ".repeat(depth);
    lines.push(format!("{pad}canonical: {}", uri.canonical()));
    if let Some(value) = uri.literal_value() {
        lines.push(format!("{pad}literal: {value}"));
        return;
    }
    if uri.is_alias() {
        lines.push(format!("{pad}alias: {}", uri.name()));
        return;
    }
    lines.push(format!("{pad}scheme: {}", uri.scheme()));
    lines.push(format!("{pad}name: {}", uri.name()));
    if let Some(fragment) = uri.fragment() {
        lines.push(format!("{pad}fragment: {fragment}"));
    }
    if let Some(format) = uri.format() {
        lines.push(format!("{pad}format: {format}"));
    }
    for (name, param) in uri.parameters() {
        lines.push(format!("{pad}param {name}:"));
        describe_into(param, depth + 1, lines);
    }
}

/// Resolve the requested key path and render it.
fn get(args: &GetArgs) -> Result<String> {
    let config = load(&args.file)?.with_strict_paths(args.strict);
    let value = match args.repr {
        Some(repr) => config.get_value_as(&args.key_path, repr),
        None => config.get_value(&args.key_path),
    };
    let value = value.ok_or_else(|| Error::NotFound(args.key_path.clone()))?;
    render(&value)
}

/// Normalize the whole file, or the configuration at a key path.
fn normalize(args: &NormalizeArgs) -> Result<String> {
    let config = load(&args.file)?;
    let target = match &args.key_path {
        Some(path) => config
            .get_configuration(path)
            .ok_or_else(|| Error::NotFound(path.clone()))?,
        None => config,
    };
    Ok(serde_json::to_string_pretty(target.normalize().data())?)
}

/// Strings print bare, everything else as pretty JSON.
fn render(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string_pretty(&other.to_json())?),
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use config::Representation;
    use tempfile::TempDir;

    use super::*;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn get_args(file: PathBuf, key_path: &str) -> GetArgs {
        GetArgs {
            file,
            key_path: key_path.to_string(),
            repr: None,
            strict: false,
        }
    }

    #[test]
    fn describes_nested_parameters() {
        let text = describe_uri("file:a.json#items+depth=2|data").unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.contains(&"scheme: file"));
        assert!(lines.contains(&"name: a.json"));
        assert!(lines.contains(&"fragment: items"));
        assert!(lines.contains(&"format: data"));
        assert!(lines.contains(&"param depth:"));
        assert!(lines.contains(&"  literal: 2"));
    }

    #[test]
    fn reports_syntax_errors() {
        let err = describe_uri("no scheme here").unwrap_err();
        assert!(matches!(err, Error::Syntax(_)));
        assert!(err.pretty().contains('^'));
    }

    #[test]
    fn gets_values_with_conversion() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "app.json",
            r##"{"server": {"port": "8080", "host": "#server.name", "name": "example"}}"##,
        );

        assert_eq!(get(&get_args(path.clone(), "server.host")).unwrap(), "example");

        let mut args = get_args(path.clone(), "server.port");
        args.repr = Some(Representation::Number);
        assert_eq!(get(&args).unwrap(), "8080");

        let err = get(&get_args(path, "server.missing")).unwrap_err();
        assert!(matches!(err, Error::NotFound(p) if p == "server.missing"));
    }

    #[test]
    fn normalizes_inheritance() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "app.json",
            r##"{
                "base": {"color": "red", "size": 1},
                "child": {"*extends": "#base", "size": 2}
            }"##,
        );
        let args = NormalizeArgs {
            file: path,
            key_path: Some("child".to_string()),
        };
        let json: serde_json::Value = serde_json::from_str(&normalize(&args).unwrap()).unwrap();
        assert_eq!(json["color"], "red");
        assert_eq!(json["size"], 2);
        assert!(json.get("*extends").is_none());
    }
}
