//! Process-local registry of live matching jobs, one per user.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Externally visible phase of a user's matching job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
  InProgress,
  Stopping,
  NotRunning,
}

/// Map of `user_id` to the cancellation token of that user's live job.
///
/// A token's cancelled state is the stop flag. Entries exist exactly as
/// long as the owning [`JobGuard`].
#[derive(Clone, Default)]
pub struct JobRegistry {
  inner: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl JobRegistry {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Claim the job slot for `user_id`. Returns `None` if a job is already
  /// live for that user.
  pub fn try_begin(&self, user_id: &str) -> Option<JobGuard> {
    let mut jobs = self.lock();
    if jobs.contains_key(user_id) {
      return None;
    }
    let token = CancellationToken::new();
    jobs.insert(user_id.to_owned(), token.clone());
    Some(JobGuard { registry: self.clone(), user_id: user_id.to_owned(), token })
  }

  /// Raise the stop flag for `user_id`. Returns `false` if no job is live.
  pub fn request_stop(&self, user_id: &str) -> bool {
    match self.lock().get(user_id) {
      Some(token) => {
        token.cancel();
        true
      }
      None => false,
    }
  }

  pub fn status(&self, user_id: &str) -> JobStatus {
    match self.lock().get(user_id) {
      Some(token) if token.is_cancelled() => JobStatus::Stopping,
      Some(_) => JobStatus::InProgress,
      None => JobStatus::NotRunning,
    }
  }

  /// Number of live jobs.
  pub fn active(&self) -> usize { self.lock().len() }
}

/// Ownership of one user's job slot. Dropping it frees the slot, whichever
/// way the job ends.
pub struct JobGuard {
  registry: JobRegistry,
  user_id:  String,
  token:    CancellationToken,
}

impl JobGuard {
  pub fn token(&self) -> &CancellationToken { &self.token }

  pub fn user_id(&self) -> &str { &self.user_id }
}

impl Drop for JobGuard {
  fn drop(&mut self) { self.registry.lock().remove(&self.user_id); }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn one_job_per_user() {
    let jobs = JobRegistry::new();
    let guard = jobs.try_begin("u1").unwrap();
    assert!(jobs.try_begin("u1").is_none());
    assert!(jobs.try_begin("u2").is_some());
    drop(guard);
    assert!(jobs.try_begin("u1").is_some());
  }

  #[test]
  fn status_follows_the_stop_flag() {
    let jobs = JobRegistry::new();
    assert_eq!(jobs.status("u1"), JobStatus::NotRunning);
    assert!(!jobs.request_stop("u1"));

    let guard = jobs.try_begin("u1").unwrap();
    assert_eq!(jobs.status("u1"), JobStatus::InProgress);
    assert!(jobs.request_stop("u1"));
    assert_eq!(jobs.status("u1"), JobStatus::Stopping);
    assert!(guard.token().is_cancelled());

    drop(guard);
    assert_eq!(jobs.status("u1"), JobStatus::NotRunning);
    assert_eq!(jobs.active(), 0);
  }

  #[test]
  fn slot_is_freed_on_panic() {
    let jobs = JobRegistry::new();
    let cloned = jobs.clone();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
      let _guard = cloned.try_begin("u1").unwrap();
      panic!("job blew up");
    }));
    assert!(result.is_err());
    assert_eq!(jobs.status("u1"), JobStatus::NotRunning);
  }

  #[test]
  fn status_strings() {
    assert_eq!(JobStatus::InProgress.to_string(), "in_progress");
    assert_eq!(JobStatus::Stopping.as_ref(), "stopping");
    assert_eq!(JobStatus::NotRunning.to_string(), "not_running");
  }
}
