//! Explicit retry policies for outbound calls.
//!
//! A [`RetryPolicy`] is a plain value handed to the call site, so the number
//! of attempts and the delay schedule are visible where the call is made and
//! can be swapped out in tests.

use std::{fmt, future::Future, time::Duration};

use tracing::warn;

/// Delay schedule between failed attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
  /// The same delay after every failure.
  Fixed(Duration),
  /// `initial * factor^(n-1)` after the n-th failure, capped at `max`.
  Exponential {
    initial: Duration,
    factor:  f64,
    max:     Duration,
  },
}

impl Backoff {
  /// Delay to wait after the `attempt`-th failure (1-based).
  pub fn delay(&self, attempt: u32) -> Duration {
    match self {
      Self::Fixed(delay) => *delay,
      Self::Exponential { initial, factor, max } => {
        let exponent = attempt.saturating_sub(1).min(62) as i32;
        let secs = initial.as_secs_f64() * factor.powi(exponent);
        Duration::from_secs_f64(secs.min(max.as_secs_f64()))
      }
    }
  }
}

/// How many times to attempt an operation and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Zero is treated as one.
  pub max_attempts: u32,
  pub backoff:      Backoff,
}

impl RetryPolicy {
  /// Classifier invocations: 3 attempts, 4 s doubling, capped at 10 s.
  pub fn classifier() -> Self {
    Self {
      max_attempts: 3,
      backoff:      Backoff::Exponential {
        initial: Duration::from_secs(4),
        factor:  2.0,
        max:     Duration::from_secs(10),
      },
    }
  }

  /// Registry page fetches: 5 attempts, 0.5 s doubling.
  pub fn registry() -> Self {
    Self {
      max_attempts: 5,
      backoff:      Backoff::Exponential {
        initial: Duration::from_millis(500),
        factor:  2.0,
        max:     Duration::from_secs(8),
      },
    }
  }

  /// `max_attempts` attempts with no delay in between.
  pub fn immediate(max_attempts: u32) -> Self {
    Self { max_attempts, backoff: Backoff::Fixed(Duration::ZERO) }
  }

  /// Run `op` until it succeeds, fails with an error `is_retryable` rejects,
  /// or the attempts are used up. `op` receives the 1-based attempt number.
  pub async fn run<T, E, F, Fut, R>(&self, mut op: F, is_retryable: R) -> Result<T, E>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: fmt::Display,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut attempt = 1;
    loop {
      match op(attempt).await {
        Ok(value) => return Ok(value),
        Err(error) if attempt < max_attempts && is_retryable(&error) => {
          let delay = self.backoff.delay(attempt);
          warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            %error,
            "attempt failed; retrying"
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(error) => return Err(error),
      }
    }
  }
}
