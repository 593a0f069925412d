use std::{fs, path::Path};

use crate::{Error, Format, UriHandler, load_from_path, load_from_str};

#[test]
fn json_and_ron_documents_load() {
    let handler = UriHandler::standard();
    let json = load_from_str(
        r#"{"$size": 3, "name": "grid", "size": "$size"}"#,
        Format::Json,
        None,
        &handler,
    )
    .unwrap();
    assert_eq!(json.get_number("size"), Some(3.0));
    assert_eq!(json.keys(), ["name", "size"]);
    assert_eq!(json.context_names(), ["$size"]);
    assert!(json.source_data().get("$size").is_some());

    let ron = load_from_str(
        r#"{"name": "grid", "cells": [1, 2, 3]}"#,
        Format::Ron,
        None,
        &handler,
    )
    .unwrap();
    assert_eq!(ron.get_number("cells.2"), Some(3.0));
}

#[test]
fn json_errors_carry_location() {
    let err = load_from_str(
        "{\n  \"a\": 1,\n  \"b\": ,\n}",
        Format::Json,
        Some(Path::new("broken.json")),
        &UriHandler::standard(),
    )
    .unwrap_err();
    match &err {
        Error::Parse {
            line, excerpt, ..
        } => {
            assert_eq!(*line, 3);
            assert!(excerpt.contains('^'));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.pretty().contains("broken.json:3:"));
    assert_eq!(err.path(), Some(Path::new("broken.json")));
}

#[test]
fn top_level_must_be_a_map() {
    let err = load_from_str("[1, 2]", Format::Json, None, &UriHandler::standard()).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(err.pretty().contains("must be a map"));
}

#[test]
fn ron_errors_are_reported() {
    let err = load_from_str("{\"a\": }", Format::Ron, None, &UriHandler::standard()).unwrap_err();
    assert!(err.to_string().contains("RON parse error"));
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.yaml");
    fs::write(&path, "a: 1").unwrap();
    let err = load_from_path(&path, &UriHandler::standard()).unwrap_err();
    assert!(matches!(err, Error::Read { .. }));
    assert!(err.pretty().contains("Unsupported config format"));

    let missing = load_from_path(&dir.path().join("absent.json"), &UriHandler::standard());
    assert!(matches!(missing, Err(Error::Read { .. })));
}

#[test]
fn loading_a_file_installs_the_file_scheme() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.json");
    fs::write(&path, r#"{"a": 1}"#).unwrap();
    let cfg = load_from_path(&path, &UriHandler::standard()).unwrap();
    assert!(cfg.uri_handler().has_scheme("file"));
    assert!(cfg.uri_handler().reference_context("file").is_some());
}
