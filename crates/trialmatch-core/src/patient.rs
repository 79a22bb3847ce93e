//! Patient profiles. Owned by the profile-management side; read-only here.
//!
//! The matching engine never mutates a profile apart from stamping
//! `last_notified` through [`crate::store::PatientDirectory::record_notified`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::sanitize::{sanitize_long_text, sanitize_text};

// ─── Gender ──────────────────────────────────────────────────────────────────

/// Self-reported gender. Anything unrecognised collapses to `Other`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Gender {
  Male,
  Female,
  #[default]
  Other,
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// A patient profile as stored by the profile-management subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
  pub user_id:                String,
  pub first_name:             String,
  pub last_name:              String,
  /// Required for proactive notifications; profiles without one are still
  /// matched but never emailed.
  pub email:                  Option<String>,
  pub date_of_birth:          NaiveDate,
  #[serde(default)]
  pub gender:                 Gender,
  #[serde(default)]
  pub medical_conditions:     Vec<String>,
  #[serde(default)]
  pub medications:            Vec<String>,
  #[serde(default)]
  pub ethnicity:              Option<String>,
  #[serde(default)]
  pub family_medical_history: Option<String>,
  #[serde(default)]
  pub last_notified:          Option<DateTime<Utc>>,
}

impl PatientProfile {
  /// `"First Last"`, used as the greeting in notifications.
  pub fn display_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name).trim().to_owned()
  }

  /// Copy of the profile with every free-text field passed through the
  /// record sanitiser.
  pub fn sanitized(&self) -> Self {
    Self {
      user_id:                self.user_id.clone(),
      first_name:             sanitize_text(&self.first_name),
      last_name:              sanitize_text(&self.last_name),
      email:                  self.email.clone(),
      date_of_birth:          self.date_of_birth,
      gender:                 self.gender,
      medical_conditions:     self.medical_conditions.iter().map(|c| sanitize_text(c)).collect(),
      medications:            self.medications.iter().map(|m| sanitize_text(m)).collect(),
      ethnicity:              self.ethnicity.as_deref().map(sanitize_text),
      family_medical_history: self.family_medical_history.as_deref().map(sanitize_long_text),
      last_notified:          self.last_notified,
    }
  }

  /// The subset of the profile the classifier is allowed to see. Contact
  /// details and identifiers are never part of a prompt.
  pub fn classifier_view(&self) -> ClassifierPatient<'_> {
    ClassifierPatient {
      first_name:             &self.first_name,
      last_name:              &self.last_name,
      date_of_birth:          self.date_of_birth,
      gender:                 self.gender,
      medical_conditions:     &self.medical_conditions,
      medications:            &self.medications,
      ethnicity:              self.ethnicity.as_deref(),
      family_medical_history: self.family_medical_history.as_deref(),
    }
  }
}

/// Borrowed, serialisable view of a profile without contact identifiers.
#[derive(Debug, Serialize)]
pub struct ClassifierPatient<'a> {
  pub first_name:             &'a str,
  pub last_name:              &'a str,
  pub date_of_birth:          NaiveDate,
  pub gender:                 Gender,
  pub medical_conditions:     &'a [String],
  pub medications:            &'a [String],
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ethnicity:              Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub family_medical_history: Option<&'a str>,
}
