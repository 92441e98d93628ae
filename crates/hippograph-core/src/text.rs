//! Text normalization shared by extraction, hashing and retrieval.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

/// Lowercase, replace every non-alphanumeric run with one space, trim.
pub fn normalize_text(text: &str) -> String {
    NON_ALNUM
        .replace_all(&text.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Number of alphanumeric characters in `text`.
pub fn alnum_len(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphanumeric()).count()
}
