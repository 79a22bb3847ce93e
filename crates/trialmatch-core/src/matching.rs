//! Scored matches between a patient and a trial.
//!
//! A [`ScoredMatch`] is what the classifier proposes; a [`MatchRecord`] is
//! what the engine persists. Records are identified by `(user_id, nct_id)`
//! and are never overwritten once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Minimum score (inclusive) for a proposal to become a [`MatchRecord`].
pub const MATCH_THRESHOLD: f64 = 70.0;

// ─── Score ───────────────────────────────────────────────────────────────────

/// A compatibility score in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CompatibilityScore(f64);

impl CompatibilityScore {
  pub fn new(value: f64) -> Result<Self> {
    if !value.is_finite() {
      return Err(Error::ScoreNotFinite);
    }
    if !(0.0..=100.0).contains(&value) {
      return Err(Error::ScoreOutOfRange(value));
    }
    Ok(Self(value))
  }

  pub fn value(self) -> f64 { self.0 }

  /// Whether the score clears [`MATCH_THRESHOLD`].
  pub fn is_match(self) -> bool { self.0 >= MATCH_THRESHOLD }
}

impl TryFrom<f64> for CompatibilityScore {
  type Error = Error;

  fn try_from(value: f64) -> Result<Self> { Self::new(value) }
}

impl From<CompatibilityScore> for f64 {
  fn from(score: CompatibilityScore) -> Self { score.0 }
}

impl std::fmt::Display for CompatibilityScore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

// ─── Proposal ────────────────────────────────────────────────────────────────

/// A validated proposal returned by the classifier for one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
  pub nct_id:              String,
  pub compatibility_score: CompatibilityScore,
  pub reasons:             Vec<String>,
}

// ─── Persisted record ────────────────────────────────────────────────────────

/// A persisted association between one patient and one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
  pub user_id:             String,
  pub nct_id:              String,
  pub compatibility_score: CompatibilityScore,
  pub reasons:             Vec<String>,
  /// Creation time; never changes.
  pub timestamp:           DateTime<Utc>,
}

impl MatchRecord {
  /// Stamp a classifier proposal with its owner and creation time.
  pub fn from_scored(
    user_id: impl Into<String>,
    scored: ScoredMatch,
    timestamp: DateTime<Utc>,
  ) -> Self {
    Self {
      user_id: user_id.into(),
      nct_id: scored.nct_id,
      compatibility_score: scored.compatibility_score,
      reasons: scored.reasons,
      timestamp,
    }
  }
}
