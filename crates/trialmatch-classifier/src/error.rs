//! Error type for `trialmatch-classifier`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The raw invocation did not finish within the configured timeout.
  #[error("classifier call timed out after {0:?}")]
  Timeout(Duration),

  /// Even a single-trial prompt is larger than the prompt budget.
  #[error("prompt of {chars} characters exceeds the {budget}-character budget")]
  BudgetExceeded { chars: usize, budget: usize },

  /// The model answered, but not with decodable JSON of the expected shape.
  #[error("could not parse classifier output: {0}")]
  ParseFailure(String),

  /// The endpoint answered with a non-success status.
  #[error("classifier backend returned {status}: {body}")]
  Backend { status: u16, body: String },

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// Whether another attempt could plausibly succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Timeout(_) | Self::Backend { .. } | Self::Http(_) => true,
      Self::BudgetExceeded { .. } | Self::ParseFailure(_) | Self::Json(_) => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
