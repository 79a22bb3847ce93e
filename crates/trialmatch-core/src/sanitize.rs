//! Character-level sanitisation for record fields.
//!
//! Records arrive from an external registry and from user-entered profiles;
//! both end up inside classifier prompts and outbound emails. Every text
//! field is reduced to word characters, whitespace, and light punctuation
//! before it crosses either boundary.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum length of a short field (titles, names, list entries).
pub const SHORT_FIELD_MAX_CHARS: usize = 1_000;

/// Maximum length of a long free-text field (summaries, criteria).
pub const LONG_FIELD_MAX_CHARS: usize = 5_000;

static SHORT_DISALLOWED: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[^\w\s.,;:!?()-]").unwrap());
static LONG_DISALLOWED: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[^\w\s.,;:!?()/-]").unwrap());

fn filter(input: &str, disallowed: &Regex, max_chars: usize) -> String {
  disallowed.replace_all(input, "").chars().take(max_chars).collect()
}

/// Sanitise a short field: drops everything outside `[\w\s.,;:!?()-]` and
/// truncates to [`SHORT_FIELD_MAX_CHARS`].
pub fn sanitize_text(input: &str) -> String {
  filter(input, &SHORT_DISALLOWED, SHORT_FIELD_MAX_CHARS)
}

/// Sanitise a long free-text field: like [`sanitize_text`] but also keeps
/// `/` and allows up to [`LONG_FIELD_MAX_CHARS`].
pub fn sanitize_long_text(input: &str) -> String {
  filter(input, &LONG_DISALLOWED, LONG_FIELD_MAX_CHARS)
}
