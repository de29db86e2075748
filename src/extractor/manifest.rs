//! Display names from a quick app's `manifest.json`.

use crate::error::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    name: Option<serde_json::Value>,
}

/// The top-level `name` of a manifest document, verbatim, if it is a non-blank string.
///
/// Malformed JSON is an error; a missing, non-string or blank name is `None`.
pub fn parse_manifest_name(text: &str) -> Result<Option<String>> {
    let manifest: Manifest = serde_json::from_str(text)?;

    Ok(manifest
        .name
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string))
}

/// Makes a display name safe to use as a local directory name.
///
/// Falls back to `fallback` when nothing usable is left.
pub fn sanitize_display_name(name: &str, fallback: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());

    for ch in name.chars() {
        match ch {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '/' | '\\' => sanitized.push('_'),
            c if c.is_control() => sanitized.push('_'),
            c => sanitized.push(c),
        }
    }

    let sanitized = sanitized
        .trim_end_matches(&['.', ' '][..])
        .trim_start()
        .to_string();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.' || c == '_') {
        fallback.to_string()
    } else {
        sanitized
    }
}
