//! Logical to physical URI rewriting and path normalisation.

use std::collections::BTreeMap;

use tracing::warn;

/// Default bound on rewrite steps, so a cyclic table cannot loop forever.
pub const DEFAULT_MAX_REWRITES: usize = 100;

/// Apply rewrite rules until the URI is stable or `max_steps` is reached.
///
/// Each step uses an exact-match rule if one exists, otherwise the rule
/// with the longest matching prefix. When the cap is hit the last computed
/// value is returned.
pub fn convert_uri(uri: &str, rewrites: &BTreeMap<String, String>, max_steps: usize) -> String {
    let mut current = uri.to_string();
    for _ in 0..max_steps {
        let next = match rewrites.get(&current) {
            Some(exact) => exact.clone(),
            None => match longest_prefix(&current, rewrites) {
                Some((prefix, replacement)) => {
                    format!("{replacement}{}", &current[prefix.len()..])
                }
                None => return current,
            },
        };
        if next == current {
            return current;
        }
        current = next;
    }
    warn!(uri, steps = max_steps, "URI rewrite cap reached");
    current
}

fn longest_prefix<'a>(
    uri: &str,
    rewrites: &'a BTreeMap<String, String>,
) -> Option<(&'a str, &'a str)> {
    rewrites
        .iter()
        .filter(|(prefix, _)| !prefix.is_empty() && uri.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(k, v)| (k.as_str(), v.as_str()))
}

/// Collapse `.`, `..`, and duplicate slashes in the path part of a URI.
///
/// The scheme, an authority (`scheme://host`), the `scheme:///` triple-slash
/// form, and any `#fragment` are kept as they are. Empty strings and bare
/// schemes come back unchanged.
pub fn normalise_path(uri: &str) -> String {
    if uri.is_empty() {
        return String::new();
    }
    let (body, fragment) = match uri.split_once('#') {
        Some((body, fragment)) => (body, Some(fragment)),
        None => (uri, None),
    };

    let (scheme, rest) = split_scheme(body);
    if scheme.is_some() && rest.is_empty() {
        return uri.to_string();
    }

    let (lead, path) = if let Some(path) = rest.strip_prefix("///") {
        ("///".to_string(), path)
    } else if let Some(after) = rest.strip_prefix("//") {
        match after.find('/') {
            Some(slash) => (format!("//{}", &after[..slash]), &after[slash..]),
            None => (format!("//{after}"), ""),
        }
    } else {
        (String::new(), rest)
    };

    let mut out = String::with_capacity(uri.len());
    if let Some(scheme) = scheme {
        out.push_str(scheme);
        out.push(':');
    }
    out.push_str(&lead);
    out.push_str(&collapse(path));
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn split_scheme(uri: &str) -> (Option<&str>, &str) {
    if let Some(colon) = uri.find(':') {
        let candidate = &uri[..colon];
        let valid = candidate
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        // Single letters are drive prefixes, not schemes.
        if valid && candidate.len() > 1 {
            return (Some(candidate), &uri[colon + 1..]);
        }
    }
    (None, uri)
}

fn collapse(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let absolute = path.starts_with('/');
    let trailing = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match stack.last() {
                Some(&last) if last != ".." => {
                    stack.pop();
                }
                _ if absolute => {}
                _ => stack.push(".."),
            },
            other => stack.push(other),
        }
    }
    let mut out = String::new();
    if absolute {
        out.push('/');
    }
    out.push_str(&stack.join("/"));
    if trailing && !stack.is_empty() {
        out.push('/');
    }
    out
}

/// Resolve `reference` against the document URI `base`.
///
/// References with a scheme or a leading `/` are absolute and only
/// normalised; others replace the last path segment of `base`.
pub fn resolve_against(base: &str, reference: &str) -> String {
    if reference.is_empty() {
        return normalise_path(base);
    }
    if split_scheme(reference).0.is_some() || reference.starts_with('/') {
        return normalise_path(reference);
    }
    let base = base.split('#').next().unwrap_or_default();
    match base.rfind('/') {
        Some(slash) => normalise_path(&format!("{}{reference}", &base[..=slash])),
        None => normalise_path(reference),
    }
}
