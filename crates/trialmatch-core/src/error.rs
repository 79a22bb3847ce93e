//! Error types for `trialmatch-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("compatibility score {0} is outside 0..=100")]
  ScoreOutOfRange(f64),

  #[error("compatibility score is not a finite number")]
  ScoreNotFinite,

  #[error("record is missing required field `{0}`")]
  MissingField(&'static str),

  #[error("invalid value for `{field}`: {value:?}")]
  InvalidField { field: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
