use std::sync::LazyLock;

use axum::http::{HeaderMap, header::AUTHORIZATION};
use regex::Regex;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_\s]+").unwrap());
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9- ]").unwrap());
static COLLAPSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ -]+").unwrap());

/// URL slug for a product, category or content key: lowercase ASCII words
/// joined by single dashes.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    let spaced = SEPARATORS.replace_all(&lowered, " ");
    let cleaned = DISALLOWED.replace_all(&spaced, "");

    COLLAPSE
        .replace_all(cleaned.trim(), "-")
        .trim_matches('-')
        .to_string()
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Trimmed text whose length in chars falls within `min..=max`.
pub fn bounded_text(value: &str, min: usize, max: usize) -> Option<String> {
    let trimmed = value.trim();
    let length = trimmed.chars().count();

    (min..=max).contains(&length).then(|| trimmed.to_string())
}
