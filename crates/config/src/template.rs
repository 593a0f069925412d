//! `{name}` substitution for `?`-prefixed template values.

use std::{borrow::Cow, collections::HashMap};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::Value;

/// A `{name}` placeholder; names may not contain braces.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern"));

/// Replace each `{name}` with the display form of the context parameter
/// `$name`. Names may be written with or without the `$`. Unbound names
/// expand to the empty string.
pub(crate) fn expand(template: &str, context: &HashMap<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = caps[1].trim();
            let key: Cow<'_, str> = if name.starts_with('$') {
                Cow::Borrowed(name)
            } else {
                Cow::Owned(format!("${}", name))
            };
            match context.get(key.as_ref()).and_then(Value::to_display_string) {
                Some(text) => text,
                None => {
                    debug!(name, "template variable not bound");
                    String::new()
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn substitutes_with_and_without_sigil() {
        let c = ctx(&[("$host", Value::from("db")), ("$port", Value::from(5432))]);
        assert_eq!(expand("{host}:{$port}", &c), "db:5432");
        assert_eq!(expand("{ host }", &c), "db");
    }

    #[test]
    fn unbound_and_malformed() {
        let c = ctx(&[]);
        assert_eq!(expand("a{missing}b", &c), "ab");
        assert_eq!(expand("{}{", &c), "{}{");
    }
}
