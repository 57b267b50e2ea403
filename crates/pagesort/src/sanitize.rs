//! Helpers for sanitizing data before it enters tracing span attributes or
//! the filesystem.
//!
//! Traces are safe to share for debugging: span fields carry file names,
//! never full paths. Generated file names are stripped of anything a
//! filesystem would reject.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::paths::basename;

/// Longest file name stem we will produce, in characters.
pub const MAX_FILE_NAME_CHARS: usize = 180;

static RESERVED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"));
static REPEATED_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_]*_[\s_]*|\s+").expect("valid regex"));

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    match path.to_str() {
        Some(s) => redact_str(s),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<unknown>")
            .to_string(),
    }
}

/// Same as [`redact_path`] for string paths, splitting on both separators.
pub fn redact_str(path: &str) -> String {
    let name = basename(path);
    if name.is_empty() {
        "<unknown>".to_string()
    } else {
        name.to_string()
    }
}

/// Turns free text into a file name stem that every common filesystem accepts.
///
/// Reserved characters become `_`, runs of whitespace and underscores collapse
/// to a single `_`, leading/trailing dots and separators are trimmed, and the
/// result is capped at [`MAX_FILE_NAME_CHARS`].
pub fn sanitize_file_name(raw: &str) -> String {
    let replaced = RESERVED_CHARS.replace_all(raw.trim(), "_");
    let collapsed = REPEATED_SEPARATORS.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == '_' || c == '-' || c == ' ');

    let capped: String = trimmed.chars().take(MAX_FILE_NAME_CHARS).collect();
    capped
        .trim_end_matches(|c: char| c == '.' || c == '_' || c == ' ')
        .to_string()
}
