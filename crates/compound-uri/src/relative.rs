//! Relative reference resolution for path-like schemes.

use crate::CompoundUri;

/// Resolve `uri` against `base`, the URI of the resource it was found in.
pub(crate) fn resolve(uri: &CompoundUri, base: &CompoundUri) -> CompoundUri {
    if uri.scheme() != base.scheme() || !uri.is_relative() {
        return uri.clone();
    }
    if uri.name().is_empty() {
        return uri.with_name(base.name());
    }
    let dir = match base.name().rfind('/') {
        Some(i) => &base.name()[..=i],
        None => "",
    };
    uri.with_name(normalize_path(&format!("{}{}", dir, uri.name())))
}

/// Collapse `.` and `..` segments. Leading `..` segments of a relative path are kept.
fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                }
                _ if absolute => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    let joined = out.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> CompoundUri {
        CompoundUri::parse(s).expect("parse")
    }

    #[test]
    fn joins_to_base_directory() {
        let base = uri("file:conf/app/main.json");
        assert_eq!(
            uri("file:widgets.json").resolve_against(&base).name(),
            "conf/app/widgets.json"
        );
        assert_eq!(
            uri("file:../shared/base.json").resolve_against(&base).name(),
            "conf/shared/base.json"
        );
        assert_eq!(
            uri("file:./x.json#k").resolve_against(&base),
            uri("file:conf/app/x.json#k")
        );
    }

    #[test]
    fn absolute_and_foreign_are_untouched() {
        let base = uri("file:conf/main.json");
        assert_eq!(uri("file:/etc/x.json").resolve_against(&base).name(), "/etc/x.json");
        assert_eq!(uri("named:db").resolve_against(&base).name(), "db");
    }

    #[test]
    fn fragment_only_refers_to_base() {
        let base = uri("file:conf/main.json");
        let resolved = uri("file:#cache").resolve_against(&base);
        assert_eq!(resolved.name(), "conf/main.json");
        assert_eq!(resolved.fragment(), Some("cache"));
    }

    #[test]
    fn normalize_keeps_leading_parent_segments() {
        assert_eq!(normalize_path("../a/./b/../c"), "../a/c");
        assert_eq!(normalize_path("/../a"), "/a");
        assert_eq!(normalize_path("a/b/../../.."), "..");
    }
}
