//! Prompt text and the character budget that bounds it.

use serde::Serialize;
use tracing::debug;
use trialmatch_core::trial::TrialRecord;

use crate::{Error, Result};

pub const MATCHING_SYSTEM_PROMPT: &str = "You are an AI assistant tasked with matching \
  patients to clinical trials based on their profiles and trial eligibility criteria.";

pub const CRITERIA_SYSTEM_PROMPT: &str =
  "You are an AI assistant tasked with analyzing clinical trial eligibility criteria.";

/// Default budget for the serialised patient plus trial batch.
pub const DEFAULT_BUDGET_CHARS: usize = 10_000;

/// The trial fields the model sees. Enrichment and bookkeeping stay local.
#[derive(Debug, Serialize)]
pub struct ClassifierTrial<'a> {
  pub nct_id:               &'a str,
  pub brief_title:          &'a str,
  pub official_title:       &'a str,
  pub brief_summary:        &'a str,
  pub detailed_description: &'a str,
  pub status:               &'a str,
  pub phase:                &'a [String],
  pub conditions:           &'a [String],
  pub eligibility_criteria: &'a str,
}

impl<'a> From<&'a TrialRecord> for ClassifierTrial<'a> {
  fn from(t: &'a TrialRecord) -> Self {
    Self {
      nct_id:               &t.nct_id,
      brief_title:          &t.brief_title,
      official_title:       &t.official_title,
      brief_summary:        &t.brief_summary,
      detailed_description: &t.detailed_description,
      status:               &t.status,
      phase:                &t.phase,
      conditions:           &t.conditions,
      eligibility_criteria: &t.eligibility_criteria,
    }
  }
}

/// A serialised patient and trial batch that fits the budget.
#[derive(Debug)]
pub struct FittedBatch {
  pub patient_json: String,
  pub trials_json:  String,
  /// How many leading trials of the input survived.
  pub kept:         usize,
}

/// Serialise `patient` and `trials`, dropping trials from the tail one at a
/// time until the combined length is within `budget` characters.
///
/// Fails with [`Error::BudgetExceeded`] when a single trial still does not
/// fit.
pub fn fit_to_budget<P: Serialize>(
  patient: &P,
  trials: &[ClassifierTrial<'_>],
  budget: usize,
) -> Result<FittedBatch> {
  let patient_json = serde_json::to_string(patient)?;
  let patient_chars = patient_json.chars().count();

  let mut kept = trials.len();
  loop {
    let trials_json = serde_json::to_string(&trials[..kept])?;
    let chars = patient_chars + trials_json.chars().count();
    if chars <= budget {
      if kept < trials.len() {
        debug!(kept, dropped = trials.len() - kept, "trial batch trimmed to budget");
      }
      return Ok(FittedBatch { patient_json, trials_json, kept });
    }
    if kept <= 1 {
      return Err(Error::BudgetExceeded { chars, budget });
    }
    kept -= 1;
  }
}

/// The user turn for a matching request.
pub fn matching_prompt(patient_json: &str, trials_json: &str) -> String {
  format!(
    "Patient Profile:
{patient_json}

Clinical Trials:
{trials_json}

Based on the patient profile and clinical trial data provided, please match the patient to suitable trials.
For each suitable trial, provide a compatibility score between 0 and 100, where 100 is a perfect match.
Only include trials with a compatibility score of 70 or higher.

Please provide the output in the following JSON format:
[
    {{
        \"nct_id\": \"string\",
        \"compatibility_score\": number,
        \"reasons\": [\"string\"]
    }}
]

If no trials match with a score of 70 or higher, return an empty array: []"
  )
}

/// The user turn for an eligibility-criteria analysis.
pub fn criteria_prompt(criteria: &str) -> String {
  format!(
    "Analyze the following eligibility criteria and extract key information:

{criteria}

Provide a structured analysis including:
1. Inclusion criteria
2. Exclusion criteria
3. Age range
4. Required medical conditions
5. Prohibited medical conditions or treatments

Return the analysis as a JSON object."
  )
}
