//! Trial records: the catalog entries the engine matches patients against.
//!
//! Trials are created and refreshed by ingestion from the external registry.
//! The matching engine only ever reads them, except for attaching the
//! `analyzed_criteria` enrichment during a proactive run.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  sanitize::{sanitize_long_text, sanitize_text},
};

// ─── Record ──────────────────────────────────────────────────────────────────

/// A single clinical trial, keyed by its registry id (`NCT…`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
  pub nct_id:               String,
  #[serde(default)]
  pub brief_title:          String,
  #[serde(default)]
  pub official_title:       String,
  #[serde(default)]
  pub brief_summary:        String,
  #[serde(default)]
  pub detailed_description: String,
  /// Overall recruitment status, e.g. `RECRUITING`.
  #[serde(default)]
  pub status:               String,
  #[serde(default)]
  pub phase:                Vec<String>,
  #[serde(default)]
  pub conditions:           Vec<String>,
  #[serde(default)]
  pub eligibility_criteria: String,
  /// Registry-side last update; the proactive search cursor is compared
  /// against this date.
  pub last_update_posted:   NaiveDate,
  /// Structured criteria produced by the classifier; absent until a
  /// proactive run has analysed the trial.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub analyzed_criteria:    Option<serde_json::Value>,
}

impl TrialRecord {
  /// Reject records that cannot be keyed.
  pub fn validate(&self) -> Result<()> {
    if self.nct_id.trim().is_empty() {
      return Err(Error::MissingField("nct_id"));
    }
    Ok(())
  }

  /// Copy of the record with every text field sanitised. The update date and
  /// any existing enrichment pass through untouched.
  pub fn sanitized(&self) -> Self {
    Self {
      nct_id:               sanitize_text(&self.nct_id),
      brief_title:          sanitize_text(&self.brief_title),
      official_title:       sanitize_text(&self.official_title),
      brief_summary:        sanitize_long_text(&self.brief_summary),
      detailed_description: sanitize_long_text(&self.detailed_description),
      status:               sanitize_text(&self.status),
      phase:                self.phase.iter().map(|p| sanitize_text(p)).collect(),
      conditions:           self.conditions.iter().map(|c| sanitize_text(c)).collect(),
      eligibility_criteria: sanitize_long_text(&self.eligibility_criteria),
      last_update_posted:   self.last_update_posted,
      analyzed_criteria:    self.analyzed_criteria.clone(),
    }
  }
}

/// Public ClinicalTrials.gov page for `nct_id`.
pub fn study_url(nct_id: &str) -> String {
  format!("https://clinicaltrials.gov/study/{nct_id}")
}

// ─── Upsert outcome ──────────────────────────────────────────────────────────

/// What an upsert did to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrialUpsert {
  /// The `nct_id` was not in the catalog.
  Inserted,
  /// The stored content differed, or the record gained its first
  /// `analyzed_criteria`.
  Updated,
  /// The stored record already carried identical content.
  Unchanged,
}

impl TrialUpsert {
  /// Whether the upsert wrote anything.
  pub fn is_write(self) -> bool { !matches!(self, Self::Unchanged) }
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Aggregate view of the local catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
  pub total_trials:  u64,
  pub earliest:      Option<NaiveDate>,
  pub latest:        Option<NaiveDate>,
  pub status_counts: BTreeMap<String, u64>,
  pub phase_counts:  BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn trial(nct_id: &str) -> TrialRecord {
    TrialRecord {
      nct_id:               nct_id.into(),
      brief_title:          "A <i>pilot</i> study".into(),
      official_title:       String::new(),
      brief_summary:        "Tests drug A/B in adults.".into(),
      detailed_description: String::new(),
      status:               "RECRUITING".into(),
      phase:                vec!["PHASE2".into()],
      conditions:           vec!["Asthma".into()],
      eligibility_criteria: "Inclusion: age >= 18".into(),
      last_update_posted:   NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
      analyzed_criteria:    None,
    }
  }

  #[test]
  fn validate_rejects_blank_id() {
    assert!(trial("NCT01").validate().is_ok());
    assert!(matches!(trial("  ").validate(), Err(Error::MissingField("nct_id"))));
  }

  #[test]
  fn sanitized_keeps_dates_and_slashes_in_long_fields() {
    let t = trial("NCT01").sanitized();
    assert_eq!(t.brief_title, "A ipiloti study");
    assert_eq!(t.brief_summary, "Tests drug A/B in adults.");
    assert_eq!(t.eligibility_criteria, "Inclusion: age  18");
    assert_eq!(t.last_update_posted, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
  }

  #[test]
  fn enrichment_is_omitted_when_absent() {
    let value = serde_json::to_value(trial("NCT01")).unwrap();
    assert!(value.get("analyzed_criteria").is_none());
  }

  #[test]
  fn unchanged_is_not_a_write() {
    assert!(TrialUpsert::Inserted.is_write());
    assert!(TrialUpsert::Updated.is_write());
    assert!(!TrialUpsert::Unchanged.is_write());
    assert_eq!(TrialUpsert::Unchanged.to_string(), "unchanged");
  }
}
