//! URL template expansion
//!
//! Templates use `{key}` placeholders. Older templates spell the tile indices
//! as bare `tileX`, `tileY` and `tileZ` tokens; [`rewrite_legacy`] converts
//! those to the braced form.

use regex::{Captures, Regex};
use std::sync::OnceLock;

const LEGACY_TOKENS: [(&str, &str); 3] = [("tileX", "{x}"), ("tileY", "{y}"), ("tileZ", "{z}")];

/// Matches `{name}` where the name contains no braces.
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern is valid"))
}

/// Substitutes every placeholder in `template` using `lookup`.
///
/// Returns the name of the first placeholder `lookup` cannot resolve.
pub fn expand<F>(template: &str, lookup: F) -> Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing: Option<String> = None;
    let expanded = placeholder_pattern().replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match lookup(key) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(key) => Err(key),
        None => Ok(expanded.into_owned()),
    }
}

/// Rewrites legacy `tileX`/`tileY`/`tileZ` tokens, if any are present.
pub fn rewrite_legacy(template: &str) -> Option<String> {
    if !LEGACY_TOKENS.iter().any(|(old, _)| template.contains(old)) {
        return None;
    }
    let rewritten = LEGACY_TOKENS
        .iter()
        .fold(template.to_string(), |url, (old, new)| url.replace(old, new));
    Some(rewritten)
}
