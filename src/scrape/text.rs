//! Text normalization used for label matching

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Collapses every run of whitespace into a single space and trims the ends
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes diacritics (NFKD decomposition without combining marks)
pub fn strip_accents(s: &str) -> String {
    s.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Full normalization for comparisons: collapsed whitespace, no diacritics, lowercase
pub fn normalize_text(s: &str) -> String {
    strip_accents(&clean_text(s)).to_lowercase()
}
