//! Error type for `trialmatch-ctgov`.

use thiserror::Error;

/// HTTP statuses worth another attempt.
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum Error {
  #[error("registry returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("storage error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Rate limiting, gateway failures and timeouts are retried; everything
  /// else surfaces on the first attempt.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Status { status, .. } => RETRY_STATUSES.contains(status),
      Self::Http(e) => e.is_timeout(),
      Self::Store(_) => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
