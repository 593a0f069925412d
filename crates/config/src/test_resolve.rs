use std::fs;

use serde_json::json;

use crate::{
    CompoundUri, Configuration, Error, FileScheme, Json, Params, Representation, SchemeResolver,
    UriHandler, Value, load_from_path,
};

fn root(data: Json) -> Configuration {
    Configuration::new(data, UriHandler::standard())
}

#[test]
fn context_reference_to_root_path_reads_as_number() {
    let cfg = root(json!({
        "$x": "#y",
        "y": 42,
        "node": {"value": "$x"},
    }));
    let node = cfg.get_configuration("node").unwrap();
    assert_eq!(
        node.get_value_as("value", Representation::Number),
        Some(Value::from(42))
    );
    assert_eq!(node.get_number("value"), Some(42.0));
}

#[test]
fn escape_is_never_dereferenced() {
    let cfg = root(json!({"a": "`@notaref", "b": "``#double"}));
    assert_eq!(cfg.get_value("a"), Some(Value::from("@notaref")));
    assert_eq!(cfg.get_value("b"), Some(Value::from("`#double")));
}

#[test]
fn plain_values_pass_through() {
    let cfg = root(json!({"n": 1.5, "s": "hello", "b": false, "z": null, "e": ""}));
    assert_eq!(cfg.get_value("n"), Some(Value::from(1.5)));
    assert_eq!(cfg.get_value("s"), Some(Value::from("hello")));
    assert_eq!(cfg.get_value("b"), Some(Value::Bool(false)));
    assert_eq!(cfg.get_value("z"), Some(Value::Null));
    assert_eq!(cfg.get_value("e"), Some(Value::from("")));
    assert_eq!(cfg.get_value("missing"), None);
}

#[test]
fn root_paths_resolve_from_any_depth() {
    let cfg = root(json!({
        "db": {"host": "localhost", "port": 5432},
        "app": {"service": {"host": "#db.host", "db": "#db"}},
    }));
    let service = cfg.get_configuration("app.service").unwrap();
    assert_eq!(service.get_string("host").as_deref(), Some("localhost"));
    let db = service.get_configuration("db").unwrap();
    assert_eq!(db.get_number("port"), Some(5432.0));
    // A string part way along a key path is resolved and the path continues.
    assert_eq!(cfg.get_number("app.service.db.port"), Some(5432.0));
}

#[test]
fn missing_root_path_falls_back_to_literal() {
    let cfg = root(json!({"color": "#ff0000", "ref": "#nope.deeper"}));
    assert_eq!(cfg.get_string("color").as_deref(), Some("#ff0000"));
    assert_eq!(cfg.get_string("ref").as_deref(), Some("#nope.deeper"));

    let strict = cfg.with_strict_paths(true);
    assert_eq!(strict.get_value("color"), None);
    assert_eq!(strict.get_value("ref"), None);
}

#[test]
fn strict_mode_is_inherited_by_children() {
    let cfg = root(json!({"node": {"ref": "#typo"}})).with_strict_paths(true);
    let node = cfg.get_configuration("node").unwrap();
    assert!(node.strict_paths());
    assert_eq!(node.get_value("ref"), None);
}

#[test]
fn templates_resolve_their_expansion() {
    let cfg = root(json!({
        "$env": "prod",
        "$target": "?#hosts.{env}",
        "hosts": {"prod": "db.example.com", "dev": "localhost"},
        "host": "$target",
        "url": "?postgres://{env}",
    }));
    assert_eq!(cfg.get_string("host").as_deref(), Some("db.example.com"));
    assert_eq!(cfg.get_string("url").as_deref(), Some("postgres://prod"));
}

#[test]
fn unbound_parameter_is_absent() {
    let cfg = root(json!({"a": "$missing"}));
    assert_eq!(cfg.get_value("a"), None);
}

#[test]
fn self_referencing_chains_end() {
    let cfg = root(json!({
        "$loop": "$loop",
        "a": "$loop",
        "b": "#b",
        "c": "#d.x",
        "d": "#c",
    }));
    assert_eq!(cfg.get_value("a"), None);
    // A root path that never settles is a miss, so its text is kept.
    assert_eq!(cfg.get_value("b"), Some(Value::from("#b")));
    assert!(matches!(cfg.get_value("c"), None | Some(Value::String(_))));
    assert_eq!(cfg.with_strict_paths(true).get_value("b"), None);
}

#[test]
fn uri_references_dereference_with_format() {
    let cfg = root(json!({
        "greeting": "@s:hello%20there",
        "count": "@s:12|number",
        "bad": "@nowhere:x",
    }));
    assert_eq!(cfg.get_string("greeting").as_deref(), Some("hello there"));
    assert_eq!(cfg.get_value("count"), Some(Value::from(12)));
    assert_eq!(cfg.get_value("bad"), None);
}

#[test]
fn representations() {
    let cfg = root(json!({
        "flag": "yes",
        "when": "2024-01-02",
        "link": "named:db+pool=4",
        "blob": "aGVsbG8=",
        "doc": "{\"k\": [1, 2]}",
        "list": [1, 2, 3],
    }));
    assert_eq!(cfg.get_bool("flag"), Some(true));
    assert!(cfg.get_date("when").is_some());
    let link = cfg.get_uri("link").unwrap();
    assert_eq!(link.parameter("pool").and_then(CompoundUri::literal_value), Some("4"));
    assert_eq!(
        cfg.get_value_as("blob", Representation::Binary),
        Some(Value::Binary(b"hello".to_vec()))
    );
    assert_eq!(
        cfg.get_value_as("doc", Representation::Data)
            .and_then(|v| v.value_at_path("k.1")),
        Some(Value::from(2))
    );
    let list = cfg.get_configuration("list").unwrap();
    assert!(list.is_list());
    assert_eq!(list.keys(), ["0", "1", "2"]);
    assert_eq!(cfg.get_value_as("flag", Representation::Image), None);
}

/// Resolves `env:NAME` from a fixed table, echoing the `suffix` parameter.
struct Table;

impl SchemeResolver for Table {
    fn dereference(&self, uri: &CompoundUri, params: &Params) -> Result<Option<Value>, Error> {
        let base = match uri.name() {
            "home" => "/home/ada",
            _ => return Ok(None),
        };
        let suffix = params
            .get("suffix")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(Some(Value::from(format!("{}{}", base, suffix))))
    }
}

#[test]
fn custom_schemes_receive_resolved_parameters() {
    let handler = UriHandler::standard().with_scheme("env", Table);
    let cfg = Configuration::new(
        json!({
            "$dir": "/src",
            "home": "@env:home",
            "src": "@env:home+suffix@[s:/src]",
            "other": "@env:other",
        }),
        handler,
    );
    assert_eq!(cfg.get_string("home").as_deref(), Some("/home/ada"));
    assert_eq!(cfg.get_string("src").as_deref(), Some("/home/ada/src"));
    assert_eq!(cfg.get_value("other"), None);
}

#[test]
fn file_references_resolve_relative_to_their_document() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("conf/parts")).unwrap();
    fs::write(
        dir.path().join("conf/app.json"),
        r#"{"db": "@file:parts/db.json", "theme": {"*mixin": "@file:parts/theme.ron", "fg": "white"}}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("conf/parts/db.json"),
        r#"{"host": "localhost", "schema": "@file:schema.json#tables"}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("conf/parts/schema.json"),
        r#"{"tables": ["users", "posts"]}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("conf/parts/theme.ron"),
        r#"{"fg": "black", "bg": "grey"}"#,
    )
    .unwrap();

    let handler = UriHandler::standard().with_scheme("file", FileScheme::new("/"));
    let cfg = load_from_path(&dir.path().join("conf/app.json"), &handler).unwrap();

    let db = cfg.get_configuration("db").unwrap();
    assert_eq!(db.get_string("host").as_deref(), Some("localhost"));
    let schema = db.get_configuration("schema").unwrap();
    assert_eq!(schema.get_string("1").as_deref(), Some("posts"));
    assert_eq!(cfg.get_string("db.schema.0").as_deref(), Some("users"));

    let theme = cfg.get_configuration("theme").unwrap().flatten();
    assert_eq!(theme.get_string("fg").as_deref(), Some("black"));
    assert_eq!(theme.get_string("bg").as_deref(), Some("grey"));
}

#[test]
fn referenced_documents_anchor_root_paths_at_themselves() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("app.json"),
        r#"{"host": "app-host", "db": "@file:db.json"}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("db.json"),
        r##"{"host": "db-host", "alias": "#host", "missing": "#nowhere"}"##,
    )
    .unwrap();

    let handler = UriHandler::standard().with_scheme("file", FileScheme::new("/"));
    let cfg = load_from_path(&dir.path().join("app.json"), &handler).unwrap();

    let db = cfg.get_configuration("db").unwrap();
    assert!(db.is_root());
    assert_eq!(db.get_string("alias").as_deref(), Some("db-host"));
    assert_eq!(cfg.get_string("db.alias").as_deref(), Some("db-host"));

    let strict = cfg.with_strict_paths(true).get_configuration("db").unwrap();
    assert!(strict.strict_paths());
    assert_eq!(strict.get_value("missing"), None);
}
