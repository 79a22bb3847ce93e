//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order is chronological. Dates are `YYYY-MM-DD`. Lists and
//! the criteria enrichment are stored as compact JSON.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use trialmatch_core::{
  matching::{CompatibilityScore, MatchRecord},
  patient::{Gender, PatientProfile},
  trial::TrialRecord,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Lists ───────────────────────────────────────────────────────────────────

pub fn encode_list(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_list(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Gender ──────────────────────────────────────────────────────────────────

pub fn decode_gender(s: &str) -> Result<Gender> {
  s.parse().map_err(|_| Error::UnknownGender(s.to_owned()))
}

// ─── Content hash ────────────────────────────────────────────────────────────

/// The registry-sourced part of a trial; enrichment is deliberately absent.
#[derive(Serialize)]
struct IngestFields<'a> {
  nct_id:               &'a str,
  brief_title:          &'a str,
  official_title:       &'a str,
  brief_summary:        &'a str,
  detailed_description: &'a str,
  status:               &'a str,
  phase:                &'a [String],
  conditions:           &'a [String],
  eligibility_criteria: &'a str,
  last_update_posted:   NaiveDate,
}

/// SHA-256 over the registry-sourced fields of `t`, hex-encoded. Two
/// records with the same hash are the same registry revision.
pub fn content_hash(t: &TrialRecord) -> Result<String> {
  let fields = IngestFields {
    nct_id:               &t.nct_id,
    brief_title:          &t.brief_title,
    official_title:       &t.official_title,
    brief_summary:        &t.brief_summary,
    detailed_description: &t.detailed_description,
    status:               &t.status,
    phase:                &t.phase,
    conditions:           &t.conditions,
    eligibility_criteria: &t.eligibility_criteria,
    last_update_posted:   t.last_update_posted,
  };
  let bytes = serde_json::to_vec(&fields)?;
  Ok(hex::encode(Sha256::digest(&bytes)))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching the field order of [`RawTrial`].
pub const TRIAL_COLUMNS: &str = "nct_id, brief_title, official_title, brief_summary,
  detailed_description, status, phase, conditions, eligibility_criteria,
  last_update_posted, analyzed_criteria";

/// Raw strings read directly from a `trials` row.
pub struct RawTrial {
  pub nct_id:               String,
  pub brief_title:          String,
  pub official_title:       String,
  pub brief_summary:        String,
  pub detailed_description: String,
  pub status:               String,
  pub phase:                String,
  pub conditions:           String,
  pub eligibility_criteria: String,
  pub last_update_posted:   String,
  pub analyzed_criteria:    Option<String>,
}

impl RawTrial {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      nct_id:               row.get(0)?,
      brief_title:          row.get(1)?,
      official_title:       row.get(2)?,
      brief_summary:        row.get(3)?,
      detailed_description: row.get(4)?,
      status:               row.get(5)?,
      phase:                row.get(6)?,
      conditions:           row.get(7)?,
      eligibility_criteria: row.get(8)?,
      last_update_posted:   row.get(9)?,
      analyzed_criteria:    row.get(10)?,
    })
  }

  pub fn into_trial(self) -> Result<TrialRecord> {
    Ok(TrialRecord {
      nct_id:               self.nct_id,
      brief_title:          self.brief_title,
      official_title:       self.official_title,
      brief_summary:        self.brief_summary,
      detailed_description: self.detailed_description,
      status:               self.status,
      phase:                decode_list(&self.phase)?,
      conditions:           decode_list(&self.conditions)?,
      eligibility_criteria: self.eligibility_criteria,
      last_update_posted:   decode_date(&self.last_update_posted)?,
      analyzed_criteria:    self
        .analyzed_criteria
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?,
    })
  }
}

/// Column list matching the field order of [`RawMatch`].
pub const MATCH_COLUMNS: &str = "user_id, nct_id, compatibility_score, reasons, timestamp";

/// Raw values read directly from a `matches` row.
pub struct RawMatch {
  pub user_id:             String,
  pub nct_id:              String,
  pub compatibility_score: f64,
  pub reasons:             String,
  pub timestamp:           String,
}

impl RawMatch {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:             row.get(0)?,
      nct_id:              row.get(1)?,
      compatibility_score: row.get(2)?,
      reasons:             row.get(3)?,
      timestamp:           row.get(4)?,
    })
  }

  pub fn into_match(self) -> Result<MatchRecord> {
    Ok(MatchRecord {
      user_id:             self.user_id,
      nct_id:              self.nct_id,
      compatibility_score: CompatibilityScore::new(self.compatibility_score)?,
      reasons:             decode_list(&self.reasons)?,
      timestamp:           decode_dt(&self.timestamp)?,
    })
  }
}

/// Column list matching the field order of [`RawPatient`].
pub const PATIENT_COLUMNS: &str = "user_id, first_name, last_name, email, date_of_birth,
  gender, medical_conditions, medications, ethnicity, family_medical_history,
  last_notified";

/// Raw strings read directly from a `patients` row.
pub struct RawPatient {
  pub user_id:                String,
  pub first_name:             String,
  pub last_name:              String,
  pub email:                  Option<String>,
  pub date_of_birth:          String,
  pub gender:                 String,
  pub medical_conditions:     String,
  pub medications:            String,
  pub ethnicity:              Option<String>,
  pub family_medical_history: Option<String>,
  pub last_notified:          Option<String>,
}

impl RawPatient {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:                row.get(0)?,
      first_name:             row.get(1)?,
      last_name:              row.get(2)?,
      email:                  row.get(3)?,
      date_of_birth:          row.get(4)?,
      gender:                 row.get(5)?,
      medical_conditions:     row.get(6)?,
      medications:            row.get(7)?,
      ethnicity:              row.get(8)?,
      family_medical_history: row.get(9)?,
      last_notified:          row.get(10)?,
    })
  }

  pub fn into_patient(self) -> Result<PatientProfile> {
    Ok(PatientProfile {
      user_id:                self.user_id,
      first_name:             self.first_name,
      last_name:              self.last_name,
      email:                  self.email,
      date_of_birth:          decode_date(&self.date_of_birth)?,
      gender:                 decode_gender(&self.gender)?,
      medical_conditions:     decode_list(&self.medical_conditions)?,
      medications:            decode_list(&self.medications)?,
      ethnicity:              self.ethnicity,
      family_medical_history: self.family_medical_history,
      last_notified:          self.last_notified.as_deref().map(decode_dt).transpose()?,
    })
  }
}
