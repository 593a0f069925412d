//! Shallow merge helpers behind mixins and inheritance.

use std::{collections::HashMap, rc::Rc};

use serde_json::Map;

use crate::{Json, Value};

/// Inherit from the configuration named by this key.
pub const EXTENDS_KEY: &str = "*extends";
/// Apply the configuration named by this key as a mixin.
pub const CONFIG_KEY: &str = "*config";
/// Apply the configuration named by this key as a mixin.
pub const MIXIN_KEY: &str = "*mixin";
/// Apply each configuration in this list as a mixin, in order.
pub const MIXINS_KEY: &str = "*mixins";

/// Keys that direct merging and never survive normalization.
pub const DIRECTIVE_KEYS: [&str; 4] = [EXTENDS_KEY, CONFIG_KEY, MIXIN_KEY, MIXINS_KEY];

/// `base` with every key of `over` written on top. Existing keys keep their
/// position; new keys are appended.
pub(crate) fn overlay(base: &Map<String, Json>, over: &Map<String, Json>) -> Map<String, Json> {
    let mut out = base.clone();
    for (k, v) in over {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// `map` without the merge directive keys.
pub(crate) fn strip_directives(map: Map<String, Json>) -> Map<String, Json> {
    map.into_iter()
        .filter(|(k, _)| !DIRECTIVE_KEYS.contains(&k.as_str()))
        .collect()
}

/// Context for a merge result. The receiver's context is kept, and shared,
/// unless `other` binds names the receiver does not; then a new context holds
/// both, with the receiver's bindings winning.
pub(crate) fn union_context(
    own: &Rc<HashMap<String, Value>>,
    other: &Rc<HashMap<String, Value>>,
) -> Rc<HashMap<String, Value>> {
    if Rc::ptr_eq(own, other) || other.keys().all(|k| own.contains_key(k)) {
        return own.clone();
    }
    let mut merged = (**other).clone();
    merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
    Rc::new(merged)
}
