//! [`MatchingController`]: the per-user, cancellable batch-matching job.
//!
//! A job walks the whole trial catalog in fixed-size pages, asks the
//! classifier to score each page against the user's profile, and persists
//! every new match at or above the threshold. Jobs for different users run
//! independently; a user has at most one live job at a time.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{Instrument, debug, error, info, info_span, warn};
use trialmatch_classifier::{ClassifierClient, CompletionBackend};
use trialmatch_core::{
  matching::{MatchRecord, ScoredMatch},
  patient::PatientProfile,
  retry::RetryPolicy,
  store::CatalogStore,
  trial::TrialRecord,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  Error, Result,
  jobs::{JobGuard, JobRegistry, JobStatus},
};

const EVENT_CAPACITY: usize = 256;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MatchingConfig {
  /// Trials per classifier call.
  pub batch_size:      u64,
  /// Pause between batches; cut short by a stop request.
  pub batch_interval:  Duration,
  /// Ceiling on one classification attempt, retries excluded.
  pub attempt_timeout: Duration,
  pub retry:           RetryPolicy,
}

impl Default for MatchingConfig {
  fn default() -> Self {
    Self {
      batch_size:      50,
      batch_interval:  Duration::from_secs(1),
      attempt_timeout: Duration::from_secs(60),
      retry:           RetryPolicy::classifier(),
    }
  }
}

// ─── Outcomes and events ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
  /// A job for this user was already live; nothing was started.
  AlreadyRunning,
  /// The job ran to its end (exhausted, emptied or stopped).
  Completed { matches_found: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
  SignalSent,
  NoActiveProcess,
}

/// Live progress of matching jobs, for status channels.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
  /// New matches persisted by one batch.
  Found { job_id: Uuid, user_id: String, matches: Vec<MatchRecord> },
  /// A job ended.
  Finished { job_id: Uuid, user_id: String, matches_found: usize, stopped: bool },
}

// ─── Controller ──────────────────────────────────────────────────────────────

pub struct MatchingController<S, B> {
  store:      Arc<S>,
  classifier: Arc<ClassifierClient<B>>,
  jobs:       JobRegistry,
  config:     MatchingConfig,
  events:     broadcast::Sender<MatchEvent>,
}

impl<S, B> MatchingController<S, B>
where
  S: CatalogStore,
  B: CompletionBackend,
{
  pub fn new(
    store: Arc<S>,
    classifier: Arc<ClassifierClient<B>>,
    jobs: JobRegistry,
    config: MatchingConfig,
  ) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self { store, classifier, jobs, config, events }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn classifier(&self) -> &Arc<ClassifierClient<B>> { &self.classifier }

  pub fn jobs(&self) -> &JobRegistry { &self.jobs }

  pub fn config(&self) -> &MatchingConfig { &self.config }

  /// Receive [`MatchEvent`]s from every job started after this call.
  pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> { self.events.subscribe() }

  /// Run a full matching job for `user_id` and wait for it to end.
  pub async fn start(&self, user_id: &str) -> StartOutcome {
    match self.match_user(user_id).await {
      Some(found) => StartOutcome::Completed { matches_found: found.len() },
      None => {
        warn!(user_id, "matching process already running");
        StartOutcome::AlreadyRunning
      }
    }
  }

  /// Raise the stop flag of the user's live job, if any. The job notices
  /// at its next batch boundary.
  pub fn stop(&self, user_id: &str) -> StopOutcome {
    if self.jobs.request_stop(user_id) {
      info!(user_id, "stop signal sent");
      StopOutcome::SignalSent
    } else {
      StopOutcome::NoActiveProcess
    }
  }

  pub fn status(&self, user_id: &str) -> JobStatus { self.jobs.status(user_id) }

  /// Claim the user's job slot and run the batch loop. Returns the newly
  /// persisted matches, or `None` if a job was already live.
  pub async fn match_user(&self, user_id: &str) -> Option<Vec<MatchRecord>> {
    let guard = self.jobs.try_begin(user_id)?;
    let job_id = Uuid::new_v4();
    let span = info_span!("matching_job", %job_id, user_id);
    Some(self.run_job(guard, job_id).instrument(span).await)
  }

  async fn run_job(&self, guard: JobGuard, job_id: Uuid) -> Vec<MatchRecord> {
    let user_id = guard.user_id().to_owned();
    let token = guard.token().clone();

    let found = match self.run_batches(&user_id, job_id, &token).await {
      Ok(found) => found,
      Err(e) => {
        error!(error = %e, "matching job aborted");
        Vec::new()
      }
    };

    let stopped = token.is_cancelled();
    if found.is_empty() {
      info!(stopped, "no new matching trials found");
    } else {
      info!(matches_found = found.len(), stopped, "matching process completed");
    }
    let _ = self.events.send(MatchEvent::Finished {
      job_id,
      user_id,
      matches_found: found.len(),
      stopped,
    });

    drop(guard);
    found
  }

  async fn run_batches(
    &self,
    user_id: &str,
    job_id: Uuid,
    token: &CancellationToken,
  ) -> Result<Vec<MatchRecord>> {
    let Some(profile) = self.store.get_by_user_id(user_id).await.map_err(Error::store)? else {
      warn!("no patient profile found");
      return Ok(Vec::new());
    };
    let total = self.store.count_trials().await.map_err(Error::store)?;
    info!(total, "trials to process");

    let batch_size = self.config.batch_size.max(1);
    let mut offset = 0;
    let mut found = Vec::new();

    while offset < total && !token.is_cancelled() {
      let mut new = Vec::new();
      let outcome = self.run_batch(user_id, &profile, offset, batch_size, &mut new).await;
      if !new.is_empty() {
        let _ = self.events.send(MatchEvent::Found {
          job_id,
          user_id: user_id.to_owned(),
          matches: new.clone(),
        });
      }
      let persisted = new.len();
      found.extend(new);

      match outcome {
        Ok(false) => {
          info!(offset, "no more trials to process");
          break;
        }
        Ok(true) => debug!(offset, new = persisted, "batch processed"),
        Err(e) => error!(offset, persisted, error = %e, "batch failed; skipping"),
      }

      offset += batch_size;
      if offset < total {
        tokio::select! {
          _ = token.cancelled() => {}
          _ = tokio::time::sleep(self.config.batch_interval) => {}
        }
      }
    }

    Ok(found)
  }

  /// One page: classify, threshold, dedupe, persist. `false` when the page
  /// came back empty.
  ///
  /// Each persisted match lands in `new` as soon as it is written, so a
  /// store failure part way through still reports the earlier ones.
  async fn run_batch(
    &self,
    user_id: &str,
    profile: &PatientProfile,
    offset: u64,
    batch_size: u64,
    new: &mut Vec<MatchRecord>,
  ) -> Result<bool> {
    let trials = self.store.page_trials(offset, batch_size).await.map_err(Error::store)?;
    if trials.is_empty() {
      return Ok(false);
    }

    let proposals = self.classify_with_retry(profile, &trials).await?;

    for proposal in proposals.into_iter().filter(|p| p.compatibility_score.is_match()) {
      if self.store.match_exists(user_id, &proposal.nct_id).await.map_err(Error::store)? {
        debug!(nct_id = %proposal.nct_id, "trial already matched");
        continue;
      }
      let record = MatchRecord::from_scored(user_id, proposal, Utc::now());
      if self.store.insert_match(&record).await.map_err(Error::store)? {
        new.push(record);
      }
    }
    Ok(true)
  }

  async fn classify_with_retry(
    &self,
    profile: &PatientProfile,
    trials: &[TrialRecord],
  ) -> Result<Vec<ScoredMatch>> {
    let timeout = self.config.attempt_timeout;
    let proposals = self
      .config
      .retry
      .run(
        |_| async move {
          tokio::time::timeout(timeout, self.classifier.classify(profile, trials))
            .await
            .map_err(|_| trialmatch_classifier::Error::Timeout(timeout))?
        },
        trialmatch_classifier::Error::is_retryable,
      )
      .await?;
    Ok(proposals)
  }
}
