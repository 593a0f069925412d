use serde_json::json;

use crate::{Configuration, Json, Params, UriHandler, Value};

fn root(data: Json) -> Configuration {
    Configuration::new(data, UriHandler::standard())
}

#[test]
fn mixin_overwrites_shared_keys() {
    let base = root(json!({"a": 1, "b": 2}));
    let mixin = root(json!({"b": 3, "c": 4}));
    let merged = base.mixin_configuration(&mixin);
    assert_eq!(merged.data(), &json!({"a": 1, "b": 3, "c": 4}));
    assert_eq!(merged.keys(), ["a", "b", "c"]);
}

#[test]
fn mixin_is_shallow() {
    let base = root(json!({"style": {"fg": "red", "bg": "black"}}));
    let mixin = root(json!({"style": {"fg": "blue"}}));
    let merged = base.mixin_configuration(&mixin);
    assert_eq!(merged.data(), &json!({"style": {"fg": "blue"}}));
}

#[test]
fn flatten_applies_mixins_in_order() {
    let cfg = root(json!({
        "shared": {"a": "shared", "b": "shared"},
        "widget": {
            "*mixin": "#shared",
            "*mixins": [{"b": "first", "c": "first"}, {"c": "second"}],
            "a": "own",
        },
    }));
    let widget = cfg.get_configuration("widget").unwrap().flatten();
    assert_eq!(widget.get_string("a").as_deref(), Some("shared"));
    assert_eq!(widget.get_string("b").as_deref(), Some("first"));
    assert_eq!(widget.get_string("c").as_deref(), Some("second"));
}

#[test]
fn config_directive_applies_before_mixin() {
    let cfg = root(json!({
        "node": {
            "*config": {"x": "config", "y": "config"},
            "*mixin": {"y": "mixin"},
        },
    }));
    let node = cfg.get_configuration("node").unwrap().flatten();
    assert_eq!(node.get_string("x").as_deref(), Some("config"));
    assert_eq!(node.get_string("y").as_deref(), Some("mixin"));
}

#[test]
fn normalize_follows_extends_chain() {
    let cfg = root(json!({
        "base": {"color": "grey", "size": 1, "border": true},
        "middle": {"*extends": "#base", "size": 2},
        "leaf": {"*extends": "#middle", "color": "red"},
    }));
    let leaf = cfg.get_configuration("leaf").unwrap().normalize();
    assert_eq!(leaf.get_string("color").as_deref(), Some("red"));
    assert_eq!(leaf.get_number("size"), Some(2.0));
    assert_eq!(leaf.get_bool("border"), Some(true));
    assert!(!leaf.has_value("*extends"));
    // Ancestor keys come first.
    assert_eq!(leaf.keys(), ["color", "size", "border"]);
}

#[test]
fn normalize_applies_mixins_of_ancestors() {
    let cfg = root(json!({
        "theme": {"fg": "white"},
        "base": {"*mixin": "#theme", "bg": "black"},
        "leaf": {"*extends": "#base", "bg": "navy"},
    }));
    let leaf = cfg.get_configuration("leaf").unwrap().normalize();
    assert_eq!(leaf.get_string("fg").as_deref(), Some("white"));
    assert_eq!(leaf.get_string("bg").as_deref(), Some("navy"));
    assert!(!leaf.has_value("*mixin"));
}

#[test]
fn extends_cycle_terminates() {
    let cfg = root(json!({
        "a": {"*extends": "#b", "from_a": 1, "shared": "a"},
        "b": {"*extends": "#a", "from_b": 2, "shared": "b"},
        "self": {"*extends": "#self", "x": 1},
    }));

    let a = cfg.get_configuration("a").unwrap().normalize();
    let b = cfg.get_configuration("b").unwrap();
    let expected = cfg
        .get_configuration("a")
        .unwrap()
        .flatten()
        .extend_with_configuration(&b.flatten());
    assert_eq!(a.get_number("from_a"), Some(1.0));
    assert_eq!(a.get_number("from_b"), Some(2.0));
    assert_eq!(a.get_string("shared").as_deref(), Some("a"));
    assert_eq!(a.get_number("from_a"), expected.get_number("from_a"));
    assert_eq!(a.get_number("from_b"), expected.get_number("from_b"));

    let selfish = cfg.get_configuration("self").unwrap().normalize();
    assert_eq!(selfish.data(), &json!({"x": 1}));
}

#[test]
fn context_is_shared_through_merges() {
    let cfg = root(json!({
        "$accent": "orange",
        "base": {"color": "$accent"},
        "leaf": {"*extends": "#base", "size": 3},
    }));
    let leaf = cfg.get_configuration("leaf").unwrap();
    let normalized = leaf.normalize();
    assert!(normalized.shares_context_with(&leaf));
    assert!(normalized.shares_context_with(&cfg));
    assert_eq!(normalized.get_string("color").as_deref(), Some("orange"));
}

#[test]
fn mixin_parameters_stay_visible() {
    let cfg = root(json!({
        "node": {"*mixin": {"$shade": "dark", "bg": "$shade"}},
    }));
    let node = cfg.get_configuration("node").unwrap().flatten();
    assert_eq!(node.get_string("bg").as_deref(), Some("dark"));
}

#[test]
fn parameters_extend_context() {
    let cfg = root(json!({
        "label": "?{greeting}, {$who}!",
        "who": "$who",
    }));
    let mut params = Params::new();
    params.insert("greeting".into(), Value::from("Hello"));
    params.insert("$who".into(), Value::from("world"));
    let bound = cfg.extend_with_parameters(&params);
    assert_eq!(bound.get_string("label").as_deref(), Some("Hello, world!"));
    assert_eq!(bound.get_string("who").as_deref(), Some("world"));
    assert!(cfg.get_value("who").is_none());
}
