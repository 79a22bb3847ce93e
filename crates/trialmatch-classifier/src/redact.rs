//! Scrubbing of text crossing the classifier boundary.
//!
//! Outbound free text loses SQL keywords and markup. Inbound model text has
//! contact details, SQL keywords and markup replaced with typed tokens
//! before anything parses it.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Longest free-text input forwarded to the model, in characters.
pub const MAX_INPUT_CHARS: usize = 100_000;

pub const EMAIL_TOKEN: &str = "[EMAIL REDACTED]";
pub const PHONE_TOKEN: &str = "[PHONE REDACTED]";
pub const SQL_TOKEN: &str = "[SQL REDACTED]";
pub const HTML_TOKEN: &str = "[HTML REDACTED]";

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});
static PHONE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\b[0-9]{3}[-.]?[0-9]{3}[-.]?[0-9]{4}\b").unwrap());
static SQL_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)\b(?:UNION|SELECT|FROM|WHERE|INSERT|DELETE|UPDATE|DROP)\b").unwrap()
});
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*?>").unwrap());

/// Replace contact details, SQL keywords and HTML tags in model output.
pub fn redact_output(raw: &str) -> String {
  let text = EMAIL.replace_all(raw, EMAIL_TOKEN);
  let text = PHONE.replace_all(&text, PHONE_TOKEN);
  let text = SQL_KEYWORD.replace_all(&text, SQL_TOKEN);
  HTML_TAG.replace_all(&text, HTML_TOKEN).into_owned()
}

/// Strip SQL keywords and HTML tags from text sent to the model and cap
/// its length at [`MAX_INPUT_CHARS`].
pub fn sanitize_input(raw: &str) -> String {
  let text = SQL_KEYWORD.replace_all(raw, "");
  let text = HTML_TAG.replace_all(&text, "");
  if text.chars().count() > MAX_INPUT_CHARS {
    warn!(max = MAX_INPUT_CHARS, "classifier input truncated");
    return text.chars().take(MAX_INPUT_CHARS).collect();
  }
  text.into_owned()
}
