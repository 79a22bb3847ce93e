//! Error type for `trialmatch-engine`.

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// The trial registry could not be read after its own retries.
  #[error("trial registry unavailable: {0}")]
  Registry(#[source] BoxError),

  #[error("storage error: {0}")]
  Store(#[source] BoxError),

  #[error("classifier error: {0}")]
  Classifier(#[from] trialmatch_classifier::Error),

  #[error("scheduler error: {0}")]
  Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub(crate) fn registry(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Registry(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
