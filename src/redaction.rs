//! PII obfuscation and display formatting
//!
//! Masking here is length-preserving and purely cosmetic; it is not a
//! cryptographic redaction and the full text stays in the store.

use chrono::{DateTime, Utc};

/// Texts at or below this many characters are replaced wholesale
const SHORT_TEXT_LIMIT: usize = 20;

/// Characters kept visible at each end of longer texts
const VISIBLE_EDGE: usize = 10;

/// Replacement for short texts
pub const SHORT_TEXT_MASK: &str = "***";

/// Mask the middle of `text`, keeping the first and last 10 characters
///
/// Texts of 20 characters or fewer become `"***"`. Longer texts keep their
/// length: `first 10 + '*' x (len - 20) + last 10`. Lengths are counted in
/// `char`s so multi-byte input is never split.
pub fn obfuscate(text: &str) -> String {
    let len = text.chars().count();
    if len <= SHORT_TEXT_LIMIT {
        return SHORT_TEXT_MASK.to_string();
    }

    let mut out = String::with_capacity(text.len());
    out.extend(text.chars().take(VISIBLE_EDGE));
    out.extend(std::iter::repeat('*').take(len - 2 * VISIBLE_EDGE));
    out.extend(text.chars().skip(len - VISIBLE_EDGE));
    out
}

/// Apply `obfuscate` only when the owner's policy asks for it
pub fn obfuscate_if(enabled: bool, text: &str) -> String {
    if enabled {
        obfuscate(text)
    } else {
        text.to_string()
    }
}

/// Human-readable timestamp for listings and CLI output
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
