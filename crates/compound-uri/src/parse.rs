//! Recursive-descent parser for the compound URI grammar.
//!
//! ```text
//! COMPOUND_URI  ::= '[' ALIAS_OR_URI ']' | ALIAS_OR_URI
//! ALIAS_OR_URI  ::= '~' NAME ('|' FORMAT)?  |  URI
//! URI           ::= SCHEME ':' NAME? ('#' FRAGMENT)? PARAM* ('|' FORMAT)?
//! PARAM         ::= '+' PARAM_NAME ( '@' COMPOUND_URI | '=' LITERAL )
//! ```
//!
//! Each production consumes a prefix of its input and returns the remainder. A
//! failing production records the furthest failure seen and returns `None`, which
//! lets alternatives backtrack; only the entry point turns the recorded failure into
//! an [`Error`].

use std::{borrow::Cow, collections::BTreeMap};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{ALIAS_SCHEME, CompoundUri, Error, LITERAL_SCHEME};

static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]*").expect("scheme pattern"));
static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^#+|\[\]\s]*").expect("name pattern"));
static FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^+|\[\]\s]*").expect("fragment pattern"));
static PARAM_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-*$]+").expect("param name pattern"));
static LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^+|\[\]\s]*").expect("literal pattern"));
static FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+").expect("format pattern"));

/// Parse a complete compound URI; trailing input is an error.
pub(crate) fn parse(input: &str) -> Result<CompoundUri, Error> {
    let mut parser = Parser {
        input,
        failure: None,
    };
    match parser.compound(input) {
        Some((uri, rest)) => {
            let rest = rest.trim_start();
            if rest.is_empty() {
                Ok(uri)
            } else {
                Err(Error::syntax(
                    input,
                    parser.offset(rest),
                    "unexpected trailing characters",
                ))
            }
        }
        None => {
            let (offset, message) = parser
                .failure
                .unwrap_or((0, "invalid compound URI".to_string()));
            Err(Error::syntax(input, offset, message))
        }
    }
}

/// Parser state: the full input plus the furthest recorded failure.
struct Parser<'a> {
    /// Complete input, used to turn remainders into offsets.
    input: &'a str,
    /// Furthest failure seen so far as (offset, message).
    failure: Option<(usize, String)>,
}

impl<'a> Parser<'a> {
    /// Byte offset of `rest` within the input.
    fn offset(&self, rest: &str) -> usize {
        self.input.len() - rest.len()
    }

    /// Record a failure at `rest`, keeping whichever failure got furthest.
    fn fail<T>(&mut self, rest: &str, message: &str) -> Option<T> {
        let offset = self.offset(rest);
        match &self.failure {
            Some((seen, _)) if *seen > offset => {}
            _ => self.failure = Some((offset, message.to_string())),
        }
        None
    }

    /// `COMPOUND_URI ::= '[' ALIAS_OR_URI ']' | ALIAS_OR_URI`
    fn compound(&mut self, rest: &'a str) -> Option<(CompoundUri, &'a str)> {
        let rest = rest.trim_start();
        if let Some(inner) = rest.strip_prefix('[') {
            if let Some((uri, after)) = self.alias_or_uri(inner) {
                let after = after.trim_start();
                if let Some(after) = after.strip_prefix(']') {
                    return Some((uri, after));
                }
                self.fail::<()>(after, "expected ']'");
            }
        }
        self.alias_or_uri(rest)
    }

    /// `ALIAS_OR_URI ::= '~' NAME ('|' FORMAT)? | URI`
    fn alias_or_uri(&mut self, rest: &'a str) -> Option<(CompoundUri, &'a str)> {
        let rest = rest.trim_start();
        let Some(after_tilde) = rest.strip_prefix('~') else {
            return self.uri(rest);
        };
        let (raw, after) = token(&NAME, after_tilde);
        if raw.is_empty() {
            return self.fail(after_tilde, "expected alias name after '~'");
        }
        let name = self.decode(raw, after_tilde)?;
        let (format, after) = self.format(after)?;
        Some((
            CompoundUri::from_parts(
                ALIAS_SCHEME.to_string(),
                name.into_owned(),
                None,
                BTreeMap::new(),
                format,
            ),
            after,
        ))
    }

    /// `URI ::= SCHEME ':' NAME? ('#' FRAGMENT)? PARAM* ('|' FORMAT)?`
    fn uri(&mut self, rest: &'a str) -> Option<(CompoundUri, &'a str)> {
        let (scheme, after) = token(&SCHEME, rest);
        if scheme.is_empty() {
            return self.fail(rest, "expected scheme");
        }
        let Some(after) = after.strip_prefix(':') else {
            return self.fail(after, "expected ':' after scheme");
        };

        let (raw_name, mut rest) = token(&NAME, after);
        let name = self.decode(raw_name, after)?;

        let mut fragment = None;
        if let Some(after_hash) = rest.strip_prefix('#') {
            let (raw, after) = token(&FRAGMENT, after_hash);
            fragment = Some(self.decode(raw, after_hash)?.into_owned());
            rest = after;
        }

        let mut parameters = BTreeMap::new();
        loop {
            let trimmed = rest.trim_start();
            let Some(after_plus) = trimmed.strip_prefix('+') else {
                break;
            };
            let (name, value, after) = self.param(after_plus)?;
            parameters.insert(name, value);
            rest = after;
        }

        let (format, rest) = self.format(rest)?;
        Some((
            CompoundUri::from_parts(
                scheme.to_string(),
                name.into_owned(),
                fragment,
                parameters,
                format,
            ),
            rest,
        ))
    }

    /// `PARAM ::= '+' PARAM_NAME ( '@' COMPOUND_URI | '=' LITERAL )`, after the `+`.
    fn param(&mut self, rest: &'a str) -> Option<(String, CompoundUri, &'a str)> {
        let (name, after) = token(&PARAM_NAME, rest);
        if name.is_empty() {
            return self.fail(rest, "expected parameter name after '+'");
        }
        if let Some(nested) = after.strip_prefix('@') {
            let (value, after) = self.compound(nested)?;
            return Some((name.to_string(), value, after));
        }
        if let Some(literal) = after.strip_prefix('=') {
            let (raw, after) = token(&LITERAL, literal);
            let text = self.decode(raw, literal)?;
            let value = CompoundUri::new(LITERAL_SCHEME, text.into_owned());
            return Some((name.to_string(), value, after));
        }
        self.fail(after, "expected '@' or '=' after parameter name")
    }

    /// Optional `'|' FORMAT` suffix.
    fn format(&mut self, rest: &'a str) -> Option<(Option<String>, &'a str)> {
        let trimmed = rest.trim_start();
        let Some(after_bar) = trimmed.strip_prefix('|') else {
            return Some((None, rest));
        };
        let (format, after) = token(&FORMAT, after_bar.trim_start());
        if format.is_empty() {
            return self.fail(after_bar, "expected format name after '|'");
        }
        Some((Some(format.to_string()), after))
    }

    /// Percent-decode a matched token, failing at `at` on invalid escapes.
    fn decode(&mut self, raw: &'a str, at: &'a str) -> Option<Cow<'a, str>> {
        match urlencoding::decode(raw) {
            Ok(decoded) => Some(decoded),
            Err(_) => self.fail(at, "invalid percent-encoding"),
        }
    }
}

/// Split `rest` into the prefix matched by `re` and the remainder.
fn token<'a>(re: &Regex, rest: &'a str) -> (&'a str, &'a str) {
    match re.find(rest) {
        Some(m) => rest.split_at(m.end()),
        None => ("", rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_components() {
        let uri = parse("file:conf/app.json#db.primary+env=prod+base@[file:base.json]|json")
            .expect("parse");
        assert_eq!(uri.scheme(), "file");
        assert_eq!(uri.name(), "conf/app.json");
        assert_eq!(uri.fragment(), Some("db.primary"));
        assert_eq!(uri.format(), Some("json"));
        assert_eq!(uri.parameter("env").and_then(|p| p.literal_value()), Some("prod"));
        assert_eq!(
            uri.parameter("base").map(|p| p.name()),
            Some("base.json")
        );
    }

    #[test]
    fn empty_name_is_allowed() {
        let uri = parse("file:#section").expect("parse");
        assert_eq!(uri.name(), "");
        assert_eq!(uri.fragment(), Some("section"));
    }

    #[test]
    fn unbracketed_nested_uri_takes_following_params() {
        let uri = parse("make:Row+item@named:cell+width=3").expect("parse");
        assert!(uri.parameter("width").is_none());
        let item = uri.parameter("item").expect("item");
        assert_eq!(item.parameter("width").and_then(|p| p.literal_value()), Some("3"));

        let uri = parse("make:Row+item@[named:cell]+width=3").expect("parse");
        assert_eq!(uri.parameter("width").and_then(|p| p.literal_value()), Some("3"));
    }

    #[test]
    fn percent_escapes_are_decoded() {
        let uri = parse("s:hello%20world+x=a%2Bb").expect("parse");
        assert_eq!(uri.name(), "hello world");
        assert_eq!(uri.parameter("x").and_then(|p| p.literal_value()), Some("a+b"));
    }

    #[test]
    fn missing_scheme_separator_reports_offset() {
        let err = parse("named").expect_err("should fail");
        assert_eq!(err.offset(), 5);
        assert!(err.to_string().contains("expected ':'"), "{}", err);
    }

    #[test]
    fn trailing_characters_are_rejected() {
        let err = parse("[s:x] junk").expect_err("should fail");
        assert_eq!(err.offset(), 6);
        assert!(err.to_string().contains("trailing"), "{}", err);
    }

    #[test]
    fn unclosed_bracket_fails() {
        let err = parse("[s:x+y=1").expect_err("should fail");
        assert!(err.to_string().contains("']'"), "{}", err);
        assert!(err.pretty().contains('^'));
    }

    #[test]
    fn dangling_parameter_fails() {
        assert!(parse("s:x+").is_err());
        assert!(parse("s:x+y").is_err());
        assert!(parse("s:x|").is_err());
        assert!(parse("~").is_err());
        assert!(parse("").is_err());
    }
}
