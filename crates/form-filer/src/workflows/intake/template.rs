//! `{Placeholder}` substitution for naming and subject templates.
//!
//! Placeholders are matched left to right and looked up by their exact inner
//! text. Overrides win over the base lookup; anything unresolved becomes
//! [`UNRESOLVED`] so misconfigured templates show up in generated names.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Substituted for placeholders with no matching key.
pub const UNRESOLVED: &str = "N/A";

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([^}]+)\}").expect("valid placeholder regex"))
}

/// Resolves every placeholder in `template`. Substituted values are not re-scanned.
pub fn resolve(
    template: &str,
    base: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            overrides
                .get(key)
                .or_else(|| base.get(key))
                .map(String::as_str)
                .unwrap_or(UNRESOLVED)
                .to_string()
        })
        .into_owned()
}

/// Token names referenced by `template`, deduplicated.
pub fn placeholders(template: &str) -> BTreeSet<String> {
    placeholder_regex()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
