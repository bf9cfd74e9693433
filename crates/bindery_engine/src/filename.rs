use chrono::{DateTime, TimeZone};
use sha2::{Digest, Sha256};

pub const ARCHIVE_EXTENSION: &str = "epub";
pub const DEFAULT_STEM: &str = "golem";

/// Filesystem-safe default archive name: `{stem}_{YYYYmmdd_HHMMSS}.epub`.
pub fn default_archive_filename<Tz: TimeZone>(stem: Option<&str>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let stem = sanitize_stem(stem.unwrap_or(DEFAULT_STEM));
    format!("{stem}_{}.{ARCHIVE_EXTENSION}", now.format("%Y%m%d_%H%M%S"))
}

/// Sanitize a user-supplied archive name, appending `.epub` when missing.
pub fn archive_filename(name: &str) -> String {
    let trimmed = name.trim();
    let stem = trimmed
        .strip_suffix(".epub")
        .or_else(|| trimmed.strip_suffix(".EPUB"))
        .unwrap_or(trimmed);
    format!("{}.{ARCHIVE_EXTENSION}", sanitize_stem(stem))
}

/// Per-article image name: `{prefix}_{seq:03}.{ext}`, e.g. `a002_001.png`.
pub fn image_filename(prefix: &str, seq: usize, extension: &str) -> String {
    format!("{prefix}_{seq:03}.{extension}")
}

/// Stable book identifier derived from the creation time and the article URLs.
pub fn book_identifier<Tz: TimeZone>(urls: &[String], created: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "bindery-{}-{}",
        created.format("%Y%m%d%H%M%S"),
        short_hash(&urls.join("\n"))
    )
}

fn sanitize_stem(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = DEFAULT_STEM.to_string();
    }
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    let mut final_name: String = compacted.chars().take(80).collect();
    if is_reserved_windows_name(&final_name) {
        final_name.push('_');
    }
    final_name
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
