//! Extraction of structured results from free-form model text.
//!
//! Models wrap their JSON in prose, and redaction may have introduced
//! bracketed tokens such as `[SQL REDACTED]` around it. Candidate regions are
//! therefore tried from the widest (first opener to last closer) inwards
//! until one decodes. When both an array and an object decode, the one that
//! encloses the other is the answer.

use serde_json::Value;
use tracing::warn;
use trialmatch_core::matching::{CompatibilityScore, ScoredMatch};

use crate::{Error, Result};

/// Every byte offset at which `c` occurs.
fn positions(text: &str, c: char) -> Vec<usize> {
  text.match_indices(c).map(|(i, _)| i).collect()
}

/// A decoded region and the byte span it was decoded from.
struct Region {
  value: Value,
  start: usize,
  end:   usize,
}

impl Region {
  fn encloses(&self, other: &Region) -> bool { self.start < other.start && other.end < self.end }
}

/// The widest `open … close` region of `text` that decodes as JSON.
fn decode_region(text: &str, open: char, close: char) -> Option<Region> {
  let closers = positions(text, close);
  for start in positions(text, open) {
    for &end in closers.iter().rev().take_while(|&&end| end > start) {
      if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
        return Some(Region { value, start, end });
      }
    }
  }
  None
}

/// The outermost JSON value in `text`, as a list of candidate elements.
///
/// A lone object is a one-element list. An array nested inside it, such as
/// its `reasons`, does not count.
fn candidate_elements(text: &str) -> Option<Vec<Value>> {
  let array = decode_region(text, '[', ']');
  let object = decode_region(text, '{', '}');

  let outer = match (array, object) {
    (Some(array), Some(object)) if object.encloses(&array) => object,
    (Some(array), _) => array,
    (None, Some(object)) => object,
    (None, None) => return None,
  };
  match outer.value {
    Value::Array(elements) => Some(elements),
    object @ Value::Object(_) => Some(vec![object]),
    _ => None,
  }
}

/// Validate one candidate element, or explain why it was rejected.
fn validate_element(element: &Value) -> std::result::Result<ScoredMatch, &'static str> {
  let object = element.as_object().ok_or("not an object")?;

  let nct_id = object
    .get("nct_id")
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|id| !id.is_empty())
    .ok_or("missing or non-string nct_id")?;

  let score = object
    .get("compatibility_score")
    .and_then(Value::as_f64)
    .ok_or("missing or non-numeric compatibility_score")?;
  let score = CompatibilityScore::new(score).map_err(|_| "compatibility_score outside 0..=100")?;

  let reasons = object
    .get("reasons")
    .and_then(Value::as_array)
    .ok_or("missing or non-array reasons")?
    .iter()
    .map(|reason| match reason {
      Value::String(s) => s.clone(),
      other => other.to_string(),
    })
    .collect();

  Ok(ScoredMatch { nct_id: nct_id.to_owned(), compatibility_score: score, reasons })
}

/// Parse redacted matching output into validated proposals.
///
/// Never fails: undecodable output yields an empty list and invalid
/// elements are dropped, both with a warning.
pub fn parse_matches(text: &str) -> Vec<ScoredMatch> {
  let Some(elements) = candidate_elements(text) else {
    warn!(error = %Error::ParseFailure("no JSON array in output".into()), "no matches parsed");
    return Vec::new();
  };

  let total = elements.len();
  let valid: Vec<ScoredMatch> = elements
    .iter()
    .filter_map(|element| match validate_element(element) {
      Ok(scored) => Some(scored),
      Err(reason) => {
        warn!(reason, %element, "dropping invalid match element");
        None
      }
    })
    .collect();

  if valid.len() < total {
    warn!(valid = valid.len(), total, "some match elements failed validation");
  }
  valid
}

/// Parse redacted analysis output into a JSON object.
pub fn parse_object(text: &str) -> Result<Value> {
  if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text.trim()) {
    return Ok(value);
  }
  match decode_region(text, '{', '}') {
    Some(Region { value: value @ Value::Object(_), .. }) => Ok(value),
    _ => Err(Error::ParseFailure("no JSON object in output".into())),
  }
}
