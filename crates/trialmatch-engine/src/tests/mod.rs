//! Engine tests against an in-memory `SqliteStore` and scripted
//! collaborators.


use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::NaiveDate;
use serde_json::{Value, json};
use tokio::sync::Notify;
use trialmatch_classifier::{
  ClassifierClient, ClassifierConfig, CompletionBackend, CompletionRequest,
  prompt::CRITERIA_SYSTEM_PROMPT,
};
use trialmatch_core::{
  patient::{Gender, PatientProfile},
  retry::RetryPolicy,
  store::TrialStore,
  trial::TrialRecord,
};
use trialmatch_store_sqlite::SqliteStore;

use crate::{JobRegistry, MatchingConfig, MatchingController};

// ─── Fixtures ────────────────────────────────────────────────────────────────

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn trial(nct_id: &str) -> TrialRecord {
  TrialRecord {
    nct_id:               nct_id.into(),
    brief_title:          format!("Study {nct_id}"),
    official_title:       String::new(),
    brief_summary:        "Summary".into(),
    detailed_description: String::new(),
    status:               "RECRUITING".into(),
    phase:                vec!["PHASE2".into()],
    conditions:           vec!["Asthma".into()],
    eligibility_criteria: "Adults with asthma".into(),
    last_update_posted:   date(2024, 3, 1),
    analyzed_criteria:    None,
  }
}

/// `count` trials named `NCT0001`, `NCT0002`, ...
pub(crate) fn numbered_trials(count: usize) -> Vec<TrialRecord> {
  (1..=count).map(|n| trial(&format!("NCT{n:04}"))).collect()
}

pub(crate) fn patient(user_id: &str) -> PatientProfile {
  PatientProfile {
    user_id:                user_id.into(),
    first_name:             "Ada".into(),
    last_name:              "Lovelace".into(),
    email:                  Some(format!("{user_id}@example.com")),
    date_of_birth:          date(1980, 12, 10),
    gender:                 Gender::Female,
    medical_conditions:     vec!["Asthma".into()],
    medications:            vec![],
    ethnicity:              None,
    family_medical_history: None,
    last_notified:          None,
  }
}

pub(crate) async fn seeded_store(trials: &[TrialRecord], users: &[&str]) -> Arc<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  for t in trials {
    store.upsert_trial(t).await.unwrap();
  }
  for user in users {
    store.save_patient(&patient(user)).await.unwrap();
  }
  Arc::new(store)
}

// ─── Scripted backend ────────────────────────────────────────────────────────

type Reply = Box<dyn Fn(&[String], usize) -> trialmatch_classifier::Result<String> + Send + Sync>;

/// Answers criteria-analysis requests with a fixed object and matching
/// requests through `reply`, which receives the submitted trial ids and the
/// 1-based matching call number.
pub(crate) struct FnBackend {
  reply:          Reply,
  gate:           Option<Arc<Notify>>,
  garbled:        Option<String>,
  matching_calls: AtomicUsize,
  criteria_calls: AtomicUsize,
  batches:        Mutex<Vec<Vec<String>>>,
}

impl FnBackend {
  pub(crate) fn new(
    reply: impl Fn(&[String], usize) -> trialmatch_classifier::Result<String> + Send + Sync + 'static,
  ) -> Self {
    Self {
      reply:          Box::new(reply),
      gate:           None,
      garbled:        None,
      matching_calls: AtomicUsize::new(0),
      criteria_calls: AtomicUsize::new(0),
      batches:        Mutex::new(Vec::new()),
    }
  }

  /// Hold every matching call until `gate` is notified.
  pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
    self.gate = Some(gate);
    self
  }

  /// Answer criteria requests mentioning `marker` with prose instead of JSON.
  pub(crate) fn garbling_criteria(mut self, marker: &str) -> Self {
    self.garbled = Some(marker.to_owned());
    self
  }

  pub(crate) fn matching_calls(&self) -> usize { self.matching_calls.load(Ordering::SeqCst) }

  pub(crate) fn criteria_calls(&self) -> usize { self.criteria_calls.load(Ordering::SeqCst) }

  pub(crate) fn batch_sizes(&self) -> Vec<usize> {
    self.batches.lock().unwrap().iter().map(Vec::len).collect()
  }
}

/// The trial ids in a matching prompt's trial list.
fn submitted_ids(request: &CompletionRequest) -> Vec<String> {
  let trials = request
    .user
    .split_once("Clinical Trials:\n")
    .and_then(|(_, rest)| rest.split_once("\n\nBased on"))
    .map(|(trials, _)| trials)
    .unwrap();
  let trials: Vec<Value> = serde_json::from_str(trials).unwrap();
  trials.iter().map(|t| t["nct_id"].as_str().unwrap().to_owned()).collect()
}

impl CompletionBackend for FnBackend {
  async fn complete(&self, request: &CompletionRequest) -> trialmatch_classifier::Result<String> {
    if request.system == CRITERIA_SYSTEM_PROMPT {
      self.criteria_calls.fetch_add(1, Ordering::SeqCst);
      if self.garbled.as_deref().is_some_and(|marker| request.user.contains(marker)) {
        return Ok("These criteria are too vague to analyse.".to_owned());
      }
      return Ok(r#"{"inclusion": ["adult"], "exclusion": []}"#.to_owned());
    }

    let call = self.matching_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let ids = submitted_ids(request);
    self.batches.lock().unwrap().push(ids.clone());
    if let Some(gate) = &self.gate {
      gate.notified().await;
    }
    (self.reply)(&ids, call)
  }
}

/// A reply scoring every submitted trial at `score`.
pub(crate) fn score_all(ids: &[String], score: f64) -> String {
  let matches: Vec<Value> = ids
    .iter()
    .map(|id| json!({ "nct_id": id, "compatibility_score": score, "reasons": ["fits"] }))
    .collect();
  Value::Array(matches).to_string()
}

// ─── Controller wiring ───────────────────────────────────────────────────────

pub(crate) fn classifier_config() -> ClassifierConfig {
  ClassifierConfig { budget_chars: 1_000_000, ..ClassifierConfig::default() }
}

pub(crate) fn matching_config() -> MatchingConfig {
  MatchingConfig {
    batch_size:      50,
    batch_interval:  Duration::ZERO,
    attempt_timeout: Duration::from_secs(5),
    retry:           RetryPolicy::immediate(3),
  }
}

pub(crate) type TestController = MatchingController<SqliteStore, Arc<FnBackend>>;

pub(crate) fn controller(
  store: Arc<SqliteStore>,
  backend: Arc<FnBackend>,
  jobs: JobRegistry,
) -> Arc<TestController> {
  let classifier = Arc::new(ClassifierClient::new(backend, classifier_config()));
  Arc::new(MatchingController::new(store, classifier, jobs, matching_config()))
}
