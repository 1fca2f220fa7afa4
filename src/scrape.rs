//! Identity derivation and field normalization for scraped assignments.
//!
//! Everything here is pure and infallible: unusable input degrades to a
//! sentinel (`None` / empty string) instead of failing the batch.

use std::sync::LazyLock;

use regex::Regex;

static RESOURCE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"id=(\d+)").expect("valid resource id regex")
});

// Ordered course-code rules. First match wins.
static CODE_PARENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([A-Z]{2,10}\d{2,4})\)").expect("valid regex")
});
static CODE_AFTER_COLON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":\s*([A-Z]{2,10}\d{2,4})").expect("valid regex")
});
static CODE_AT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]{2,10}\d{2,4})").expect("valid regex")
});
static CODE_AT_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z]{2,10}\d{2,4})$").expect("valid regex")
});
static CODE_GENERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Z]{2,4}\s?-?\d{3,4}").expect("valid regex")
});

/// Derive the stable assignment id from the origin URL.
///
/// Prefers the numeric resource id carried in the URL's query string
/// (`...view.php?id=42` -> `"42"`); falls back to the URL itself so two
/// distinct resources can never collapse onto one id. Only an empty URL
/// yields `None`, and such an observation is dropped by the merge.
pub fn derive_task_id(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if let Some(caps) = RESOURCE_ID.captures(url) {
        return Some(caps[1].to_string());
    }
    Some(url.to_string())
}

/// Extract a course code like "CSDC111" from free-form course text.
///
/// Heuristic by nature; when no rule matches it degrades to a truncated
/// first token rather than failing.
pub fn extract_course_code(course: &str) -> String {
    if course.is_empty() {
        return String::new();
    }
    if let Some(caps) = CODE_PARENS.captures(course) {
        return caps[1].to_string();
    }
    if let Some(caps) = CODE_AFTER_COLON.captures(course) {
        return caps[1].to_string();
    }
    if let Some(caps) = CODE_AT_START.captures(course) {
        return caps[1].to_string();
    }
    if let Some(caps) = CODE_AT_END.captures(course) {
        return caps[1].to_string();
    }
    if let Some(m) = CODE_GENERIC.find(course) {
        return m.as_str().split_whitespace().collect();
    }
    course
        .split(|c: char| c.is_whitespace() || c == ':')
        .next()
        .unwrap_or("")
        .chars()
        .take(12)
        .collect()
}

/// Lowercased, whitespace-collapsed title for comparisons. Never displayed.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Map the scraper's "nothing found" spellings to an explicit absence.
pub fn sanitize_date(raw: Option<&str>) -> Option<String> {
    let s = raw?.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("no due date") || s.eq_ignore_ascii_case("no opening date") {
        return None;
    }
    Some(s.to_string())
}
