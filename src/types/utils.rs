//! Shared utility functions for paths, durations and text.

use std::fmt::Display;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::types::{Result, WikiError};

// =============================================================================
// Path Utilities
// =============================================================================

/// Make a configured or model-supplied path relative to a checkout root.
///
/// `"/wikis"`, `"./wikis"` and `"wikis"` all resolve to `"wikis"`; dot
/// directories such as `".github"` are kept.
#[inline]
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches("./").trim_start_matches('/')
}

// =============================================================================
// Duration Parsing
// =============================================================================

static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*([wdhms])").expect("duration pattern is valid")
});

/// Parse a compact duration string such as `7d`, `1w2d3h` or `1.5h`.
///
/// Units: `w` weeks, `d` days, `h` hours, `m` minutes, `s` seconds.
/// Matching is case-insensitive; a string with no recognized part is an error.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let lower = input.trim().to_lowercase();
    let mut total = 0f64;
    let mut matched = false;

    for caps in DURATION_PART.captures_iter(&lower) {
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| WikiError::Config(format!("Invalid duration number in '{input}'")))?;
        let unit = match &caps[2] {
            "w" => 7.0 * 24.0 * 3600.0,
            "d" => 24.0 * 3600.0,
            "h" => 3600.0,
            "m" => 60.0,
            _ => 1.0,
        };
        total += value * unit;
        matched = true;
    }

    if !matched {
        return Err(WikiError::Config(format!(
            "Invalid duration '{input}', expected e.g. 7d or 1w2d3h"
        )));
    }

    Ok(Duration::from_secs_f64(total))
}

/// Render a duration back into the compact `1w2d3h4m5s` form
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (unit, size) in [("w", 604_800), ("d", 86_400), ("h", 3600), ("m", 60), ("s", 1)] {
        let n = secs / size;
        if n > 0 {
            out.push_str(&format!("{n}{unit}"));
            secs %= size;
        }
    }
    out
}

// =============================================================================
// String Utilities
// =============================================================================

/// Truncate to at most `max_chars` characters, appending `suffix` when cut.
pub fn truncate_chars(text: &str, max_chars: usize, suffix: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], suffix),
        None => text.to_string(),
    }
}

/// Extension of a path without the dot, lowercase; empty when absent.
pub fn extension_of(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Log and discard an error, keeping the success value.
pub fn log_filter_warn<T, E: Display>(result: std::result::Result<T, E>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{}: {}", context, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/wikis"), "wikis");
        assert_eq!(normalize_path("wikis"), "wikis");
        assert_eq!(normalize_path("./wikis"), "wikis");
        assert_eq!(normalize_path(".github"), ".github");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(7 * 86_400));
        assert_eq!(
            parse_duration("1w2d3h4m5s").unwrap(),
            Duration::from_secs(604_800 + 2 * 86_400 + 3 * 3600 + 4 * 60 + 5)
        );
        assert_eq!(parse_duration("1.5H").unwrap(), Duration::from_secs(5400));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(7 * 86_400)), "1w");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10, "..."), "hello");
        assert_eq!(truncate_chars("hello world", 5, "..."), "hello...");
        assert_eq!(truncate_chars("한국어텍스트", 3, "…"), "한국어…");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("src/main.RS"), "rs");
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of("a/b.test.ts"), "ts");
    }
}
