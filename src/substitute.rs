use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::resolver::Resolver;
use crate::store::StoreError;

// `{{Name}}` with Name = one or more ASCII word characters. No whitespace,
// no nesting, no escaping. This syntax is authored into stored content and
// must not change.
static MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("marker regex is valid"));

/// Outcome of one substitution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    /// Distinct marker names that resolved, in first-occurrence order.
    pub resolved: Vec<String>,
    /// Distinct marker names left in place because nothing matched.
    pub unresolved: Vec<String>,
}

/// Distinct marker names in `text`, in first-occurrence order.
pub fn marker_names(text: &str) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for caps in MARKER_REGEX.captures_iter(text) {
        let name = &caps[1];
        if !seen.iter().any(|s| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}

/// Replace every marker whose name has an entry in `values`; leave the
/// rest verbatim. Single left-to-right pass, output is never rescanned.
pub fn replace_markers(text: &str, values: &HashMap<String, String>) -> String {
    MARKER_REGEX
        .replace_all(text, |caps: &Captures| match values.get(&caps[1]) {
            Some(v) => v.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Resolve every distinct marker once against `resolver`, then rewrite.
///
/// Store failures propagate; a marker that simply has no token is data
/// and stays in the output so editors can see the gap.
pub async fn substitute(
    resolver: &Resolver,
    text: &str,
    language: Option<&str>,
) -> Result<Substitution, StoreError> {
    if text.is_empty() {
        return Ok(Substitution::default());
    }

    let names = marker_names(text);
    if names.is_empty() {
        return Ok(Substitution {
            text: text.to_string(),
            ..Default::default()
        });
    }

    let mut values = HashMap::with_capacity(names.len());
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    for name in names {
        match resolver.resolve(&name, language).await? {
            Some(record) => {
                values.insert(name.clone(), record.value);
                resolved.push(name);
            }
            None => unresolved.push(name),
        }
    }

    if !unresolved.is_empty() {
        tracing::debug!(
            unresolved = ?unresolved,
            language = language.unwrap_or(""),
            "substitute: markers left unresolved"
        );
    }

    Ok(Substitution {
        text: replace_markers(text, &values),
        resolved,
        unresolved,
    })
}
