//! Storage traits: the trial catalog, match records, patient directory, and
//! proactive-search checkpoint log.
//!
//! The traits are implemented by storage backends (e.g.
//! `trialmatch-store-sqlite`). The engine and API depend on these
//! abstractions, never on a concrete backend.
//!
//! All methods return `Send` futures so implementations can be shared across
//! tasks in a multi-threaded runtime.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  matching::MatchRecord,
  patient::PatientProfile,
  trial::{CatalogStats, TrialRecord, TrialUpsert},
};

// ─── Shared error type ───────────────────────────────────────────────────────

/// Common root of the storage traits so a backend implementing several of
/// them exposes a single error type.
pub trait Storage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Trial catalog and matches ───────────────────────────────────────────────

/// The trial catalog and the match records derived from it.
///
/// Upserts are idempotent per `nct_id`; match inserts are idempotent per
/// `(user_id, nct_id)` and never overwrite an existing record.
pub trait TrialStore: Storage {
  // ── Trials ────────────────────────────────────────────────────────────

  /// Number of trials in the catalog.
  fn count_trials(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send;

  /// One page of trials in a stable order (ascending `nct_id`).
  fn page_trials(
    &self,
    skip: u64,
    limit: u64,
  ) -> impl Future<Output = Result<Vec<TrialRecord>, Self::Error>> + Send;

  /// Retrieve a trial by registry id. Returns `None` if not found.
  fn get_trial(
    &self,
    nct_id: &str,
  ) -> impl Future<Output = Result<Option<TrialRecord>, Self::Error>> + Send;

  /// The newest `last_update_posted` in the catalog, if any.
  fn most_recent_update_date(
    &self,
  ) -> impl Future<Output = Result<Option<NaiveDate>, Self::Error>> + Send;

  /// Insert or refresh a trial, keyed by `nct_id`.
  fn upsert_trial(
    &self,
    record: &TrialRecord,
  ) -> impl Future<Output = Result<TrialUpsert, Self::Error>> + Send;

  /// Aggregate counts over the catalog.
  fn catalog_stats(&self) -> impl Future<Output = Result<CatalogStats, Self::Error>> + Send;

  // ── Matches ───────────────────────────────────────────────────────────

  /// Whether a match for `(user_id, nct_id)` already exists.
  fn match_exists(
    &self,
    user_id: &str,
    nct_id: &str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

  /// Persist a new match. Returns `false` without writing if the pair
  /// already exists.
  fn insert_match(
    &self,
    record: &MatchRecord,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

  /// A user's matches, newest first.
  fn list_matches(
    &self,
    user_id: &str,
    offset: u64,
    limit: u64,
  ) -> impl Future<Output = Result<Vec<MatchRecord>, Self::Error>> + Send;

  /// Number of matches recorded for a user.
  fn count_matches(
    &self,
    user_id: &str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send;
}

// ─── Patients ────────────────────────────────────────────────────────────────

/// Read access to patient profiles, plus the single write the engine makes.
pub trait PatientDirectory: Storage {
  /// Retrieve a profile by the owning user's id. Returns `None` if the user
  /// has not created one.
  fn get_by_user_id(
    &self,
    user_id: &str,
  ) -> impl Future<Output = Result<Option<PatientProfile>, Self::Error>> + Send;

  /// Every profile, in a stable order.
  fn list_patients(
    &self,
  ) -> impl Future<Output = Result<Vec<PatientProfile>, Self::Error>> + Send;

  /// Stamp the time a proactive notification was delivered.
  fn record_notified(
    &self,
    user_id: &str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

// ─── Checkpoints ─────────────────────────────────────────────────────────────

/// Append-only log of proactive-search runs.
pub trait CheckpointLog: Storage {
  /// The latest `check_date`, if any run has completed.
  fn latest_checkpoint(
    &self,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send;

  /// Append a new `check_date`.
  fn append_checkpoint(
    &self,
    check_date: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

// ─── Combined ────────────────────────────────────────────────────────────────

/// Everything the engine needs from one backing store.
pub trait CatalogStore: TrialStore + PatientDirectory + CheckpointLog + 'static {}

impl<T> CatalogStore for T where T: TrialStore + PatientDirectory + CheckpointLog + 'static {}
