//! [`ClassifierClient`]: one classification or analysis attempt against a
//! [`CompletionBackend`].
//!
//! The client performs exactly one outbound call per method invocation.
//! Retrying is the caller's decision; see
//! [`trialmatch_core::retry::RetryPolicy`] and [`Error::is_retryable`].

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use trialmatch_core::{matching::ScoredMatch, patient::PatientProfile, trial::TrialRecord};

use crate::{
  Error, Result,
  backend::{CompletionBackend, CompletionRequest},
  parse::{parse_matches, parse_object},
  prompt::{
    CRITERIA_SYSTEM_PROMPT, ClassifierTrial, DEFAULT_BUDGET_CHARS, MATCHING_SYSTEM_PROMPT,
    criteria_prompt, fit_to_budget, matching_prompt,
  },
  redact::{redact_output, sanitize_input},
};

/// Tunables for [`ClassifierClient`].
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
  /// Character budget for the serialised patient plus trial batch.
  pub budget_chars: usize,
  /// Ceiling on one raw backend call.
  pub raw_timeout:  Duration,
  /// Completion length requested from the model.
  pub max_tokens:   u32,
}

impl Default for ClassifierConfig {
  fn default() -> Self {
    Self {
      budget_chars: DEFAULT_BUDGET_CHARS,
      raw_timeout:  Duration::from_secs(30),
      max_tokens:   1000,
    }
  }
}

pub struct ClassifierClient<B> {
  backend: B,
  config:  ClassifierConfig,
}

impl<B: CompletionBackend> ClassifierClient<B> {
  pub fn new(backend: B, config: ClassifierConfig) -> Self { Self { backend, config } }

  pub fn config(&self) -> &ClassifierConfig { &self.config }

  /// One raw call under the configured timeout, with the output redacted.
  async fn invoke(&self, system: &str, user: String) -> Result<String> {
    let request = CompletionRequest {
      system:     system.to_owned(),
      user,
      max_tokens: self.config.max_tokens,
    };
    let raw = tokio::time::timeout(self.config.raw_timeout, self.backend.complete(&request))
      .await
      .map_err(|_| Error::Timeout(self.config.raw_timeout))??;
    Ok(redact_output(&raw))
  }

  /// Score `trials` against `patient`.
  ///
  /// The batch is trimmed from the tail to fit the budget; proposals for
  /// trials that were not submitted are discarded. Unparseable output is
  /// logged and yields an empty list.
  #[instrument(skip_all, fields(trials = trials.len()))]
  pub async fn classify(
    &self,
    patient: &PatientProfile,
    trials: &[TrialRecord],
  ) -> Result<Vec<ScoredMatch>> {
    if trials.is_empty() {
      return Ok(Vec::new());
    }

    let patient = patient.sanitized();
    let trials: Vec<TrialRecord> = trials.iter().map(TrialRecord::sanitized).collect();
    let views: Vec<ClassifierTrial<'_>> = trials.iter().map(ClassifierTrial::from).collect();

    let fitted = fit_to_budget(&patient.classifier_view(), &views, self.config.budget_chars)?;
    let submitted = &views[..fitted.kept];
    let prompt = matching_prompt(&fitted.patient_json, &fitted.trials_json);

    let output = self.invoke(MATCHING_SYSTEM_PROMPT, prompt).await?;
    debug!(output = %output, "classifier output");

    let proposals: Vec<ScoredMatch> = parse_matches(&output)
      .into_iter()
      .filter(|proposal| {
        let known = submitted.iter().any(|t| t.nct_id == proposal.nct_id);
        if !known {
          warn!(nct_id = %proposal.nct_id, "dropping proposal for a trial not in the batch");
        }
        known
      })
      .collect();

    info!(submitted = fitted.kept, proposals = proposals.len(), "batch classified");
    Ok(proposals)
  }

  /// Ask the model for a structured breakdown of free-text eligibility
  /// criteria. Unparseable output is returned as [`Error::ParseFailure`].
  #[instrument(skip_all, fields(chars = criteria.len()))]
  pub async fn analyze_criteria(&self, criteria: &str) -> Result<Value> {
    let prompt = criteria_prompt(&sanitize_input(criteria));
    let output = self.invoke(CRITERIA_SYSTEM_PROMPT, prompt).await?;
    parse_object(&output)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  };

  use chrono::NaiveDate;
  use trialmatch_core::patient::Gender;

  use super::*;

  /// Replies with canned text and records every request.
  struct Scripted {
    reply:    String,
    delay:    Duration,
    calls:    AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
  }

  impl Scripted {
    fn new(reply: &str) -> Self {
      Self {
        reply:    reply.to_owned(),
        delay:    Duration::ZERO,
        calls:    AtomicUsize::new(0),
        requests: Mutex::new(Vec::new()),
      }
    }
  }

  impl CompletionBackend for Scripted {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.requests.lock().unwrap().push(request.clone());
      if !self.delay.is_zero() {
        tokio::time::sleep(self.delay).await;
      }
      Ok(self.reply.clone())
    }
  }

  fn patient() -> PatientProfile {
    PatientProfile {
      user_id:                "u1".into(),
      first_name:             "Ada".into(),
      last_name:              "Lovelace".into(),
      email:                  Some("ada@example.com".into()),
      date_of_birth:          NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
      gender:                 Gender::Female,
      medical_conditions:     vec!["Asthma".into()],
      medications:            vec![],
      ethnicity:              None,
      family_medical_history: None,
      last_notified:          None,
    }
  }

  fn trial(nct_id: &str) -> TrialRecord {
    TrialRecord {
      nct_id:               nct_id.into(),
      brief_title:          "Asthma study".into(),
      official_title:       String::new(),
      brief_summary:        String::new(),
      detailed_description: String::new(),
      status:               "RECRUITING".into(),
      phase:                vec![],
      conditions:           vec!["Asthma".into()],
      eligibility_criteria: "Adults".into(),
      last_update_posted:   NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
      analyzed_criteria:    None,
    }
  }

  fn client(backend: Scripted) -> ClassifierClient<Scripted> {
    ClassifierClient::new(backend, ClassifierConfig::default())
  }

  #[tokio::test]
  async fn classify_returns_validated_proposals_for_submitted_trials() {
    let c = client(Scripted::new(
      r#"[{"nct_id": "NCT1", "compatibility_score": 95, "reasons": ["asthma"]},
          {"nct_id": "NCT9", "compatibility_score": 99, "reasons": []}]"#,
    ));
    let out = c.classify(&patient(), &[trial("NCT1"), trial("NCT2")]).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].nct_id, "NCT1");
  }

  #[tokio::test]
  async fn classify_never_sends_contact_identifiers() {
    let c = client(Scripted::new("[]"));
    c.classify(&patient(), &[trial("NCT1")]).await.unwrap();

    let requests = c.backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].system, MATCHING_SYSTEM_PROMPT);
    assert!(!requests[0].user.contains("ada@example.com"));
    assert!(!requests[0].user.contains("\"u1\""));
    assert!(requests[0].user.contains("NCT1"));
  }

  #[tokio::test]
  async fn malformed_output_is_an_empty_result() {
    let c = client(Scripted::new("Sorry, I can't do that."));
    let out = c.classify(&patient(), &[trial("NCT1")]).await.unwrap();
    assert!(out.is_empty());
  }

  #[tokio::test]
  async fn empty_batch_makes_no_call() {
    let c = client(Scripted::new("[]"));
    assert!(c.classify(&patient(), &[]).await.unwrap().is_empty());
    assert_eq!(c.backend.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn budget_overflow_makes_no_call() {
    let c = ClassifierClient::new(
      Scripted::new("[]"),
      ClassifierConfig { budget_chars: 50, ..ClassifierConfig::default() },
    );
    let err = c.classify(&patient(), &[trial("NCT1")]).await.unwrap_err();
    assert!(matches!(err, Error::BudgetExceeded { .. }));
    assert_eq!(c.backend.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn slow_backend_times_out() {
    let mut backend = Scripted::new("[]");
    backend.delay = Duration::from_secs(31);
    let c = client(backend);
    let err = c.classify(&patient(), &[trial("NCT1")]).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(30)));
    assert!(err.is_retryable());
  }

  #[tokio::test]
  async fn redacted_output_still_parses() {
    let c = client(Scripted::new(
      r#"Contact bob@example.com. [{"nct_id": "NCT1", "compatibility_score": 70,
         "reasons": ["<b>eligible</b> FROM age"]}]"#,
    ));
    let out = c.classify(&patient(), &[trial("NCT1")]).await.unwrap();
    assert_eq!(out[0].reasons, ["[HTML REDACTED]eligible[HTML REDACTED] [SQL REDACTED] age"]);
  }

  #[tokio::test]
  async fn analyze_criteria_returns_the_object() {
    let c = client(Scripted::new(r#"{"age_range": {"min": 18, "max": 65}}"#));
    let value = c.analyze_criteria("Inclusion: <i>adults</i> 18-65").await.unwrap();
    assert_eq!(value["age_range"]["max"], 65);

    let requests = c.backend.requests.lock().unwrap();
    assert_eq!(requests[0].system, CRITERIA_SYSTEM_PROMPT);
    assert!(requests[0].user.contains("Inclusion: adults 18-65"));
  }

  #[tokio::test]
  async fn analyze_criteria_surfaces_parse_failures() {
    let c = client(Scripted::new("I'm not sure."));
    let err = c.analyze_criteria("anything").await.unwrap_err();
    assert!(matches!(err, Error::ParseFailure(_)));
  }
}
