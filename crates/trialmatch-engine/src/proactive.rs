//! [`ProactiveSearch`]: pull newly updated trials from the registry, enrich
//! and store them, then re-match every patient and notify those with new
//! matches.

use std::{sync::Arc, time::Duration};

use chrono::{NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use trialmatch_classifier::CompletionBackend;
use trialmatch_core::{
  notify::Notifier,
  patient::PatientProfile,
  registry::TrialRegistry,
  store::CatalogStore,
  trial::{TrialRecord, TrialUpsert},
};

use crate::{Error, MatchingController, Result};

#[derive(Debug, Clone)]
pub struct ProactiveConfig {
  /// Trials requested per registry page.
  pub page_size: u32,
  /// How far back to look when no run has been recorded yet.
  pub lookback:  Duration,
}

impl Default for ProactiveConfig {
  fn default() -> Self { Self { page_size: 100, lookback: Duration::from_secs(24 * 60 * 60) } }
}

/// Summary of one proactive run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProactiveReport {
  /// Trials received from the registry.
  pub fetched:           u64,
  /// Trials inserted or changed in the catalog.
  pub processed:         u64,
  pub patients_scanned:  u64,
  pub patients_notified: u64,
}

pub struct ProactiveSearch<S, B, R, N> {
  controller: Arc<MatchingController<S, B>>,
  registry:   R,
  notifier:   N,
  config:     ProactiveConfig,
}

impl<S, B, R, N> ProactiveSearch<S, B, R, N>
where
  S: CatalogStore,
  B: CompletionBackend,
  R: TrialRegistry,
  N: Notifier,
{
  pub fn new(
    controller: Arc<MatchingController<S, B>>,
    registry: R,
    notifier: N,
    config: ProactiveConfig,
  ) -> Self {
    Self { controller, registry, notifier, config }
  }

  pub fn controller(&self) -> &Arc<MatchingController<S, B>> { &self.controller }

  pub fn registry(&self) -> &R { &self.registry }

  pub fn notifier(&self) -> &N { &self.notifier }

  /// Run one proactive pass.
  ///
  /// Registry, checkpoint and patient-listing failures abort the run and
  /// leave no checkpoint; everything else is logged per trial or patient.
  #[instrument(skip(self))]
  pub async fn run(&self) -> Result<ProactiveReport> {
    let store = self.controller.store();
    let mut report = ProactiveReport::default();

    let last_check = match store.latest_checkpoint().await.map_err(Error::store)? {
      Some(at) => at,
      None => Utc::now() - TimeDelta::from_std(self.config.lookback).unwrap_or(TimeDelta::days(1)),
    };
    info!(%last_check, "starting proactive search");

    let trials = self.fetch_updated(last_check.date_naive()).await?;
    report.fetched = trials.len() as u64;

    for trial in &trials {
      if self.ingest(trial).await {
        report.processed += 1;
      }
    }
    info!(fetched = report.fetched, processed = report.processed, "registry trials ingested");

    if report.processed == 0 {
      info!("no new or changed trials; skipping patient matching");
    } else {
      let patients = store.list_patients().await.map_err(Error::store)?;
      for patient in &patients {
        report.patients_scanned += 1;
        if self.rematch(patient).await {
          report.patients_notified += 1;
        }
      }
    }

    store.append_checkpoint(Utc::now()).await.map_err(Error::store)?;
    info!(?report, "proactive search finished");
    Ok(report)
  }

  async fn fetch_updated(&self, since: NaiveDate) -> Result<Vec<TrialRecord>> {
    let mut trials = Vec::new();
    let mut page_token = None;
    loop {
      let page = self
        .registry
        .fetch_updated_since(since, page_token, self.config.page_size)
        .await
        .map_err(Error::registry)?;
      if page.trials.is_empty() {
        break;
      }
      trials.extend(page.trials);
      match page.next_page_token {
        Some(token) => page_token = Some(token),
        None => break,
      }
    }
    Ok(trials)
  }

  /// Sanitise, enrich and upsert one trial. `true` if the catalog changed.
  async fn ingest(&self, trial: &TrialRecord) -> bool {
    let mut record = trial.sanitized();

    let analysis = self
      .controller
      .config()
      .retry
      .run(
        |_| self.controller.classifier().analyze_criteria(&record.eligibility_criteria),
        trialmatch_classifier::Error::is_retryable,
      )
      .await;
    match analysis {
      Ok(value) => record.analyzed_criteria = Some(value),
      Err(e) => {
        warn!(nct_id = %record.nct_id, error = %e, "criteria analysis failed; skipping trial");
        return false;
      }
    }

    match self.controller.store().upsert_trial(&record).await {
      Ok(outcome) => {
        if outcome == TrialUpsert::Unchanged {
          info!(nct_id = %record.nct_id, "trial unchanged");
        }
        outcome.is_write()
      }
      Err(e) => {
        error!(nct_id = %record.nct_id, error = %e, "failed to save trial");
        false
      }
    }
  }

  /// Re-run matching for one patient and notify on new matches. `true` if a
  /// notification was delivered.
  async fn rematch(&self, patient: &PatientProfile) -> bool {
    let user_id = patient.user_id.as_str();
    let Some(found) = self.controller.match_user(user_id).await else {
      info!(user_id, "matching already running for user; skipping");
      return false;
    };
    if found.is_empty() {
      return false;
    }
    let Some(email) = patient.email.as_deref() else {
      info!(user_id, matches = found.len(), "new matches but no email on file");
      return false;
    };

    match self
      .notifier
      .send_match_notification(email, &patient.display_name(), &found)
      .await
    {
      Ok(true) => {
        if let Err(e) = self.controller.store().record_notified(user_id, Utc::now()).await {
          error!(user_id, error = %e, "failed to record notification time");
        }
        info!(user_id, matches = found.len(), "patient notified");
        true
      }
      Ok(false) => {
        warn!(user_id, "notification was not accepted");
        false
      }
      Err(e) => {
        error!(user_id, error = %e, "failed to send notification");
        false
      }
    }
  }
}
