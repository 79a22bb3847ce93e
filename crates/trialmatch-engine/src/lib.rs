//! Orchestration for trial matching: per-user cancellable matching jobs and
//! the scheduled proactive search that feeds them.
//!
//! The engine is generic over its collaborators. Storage, the completion
//! backend, the trial registry and the notifier are all traits from
//! `trialmatch-core` and `trialmatch-classifier`.

pub mod controller;
pub mod error;
pub mod jobs;
pub mod notify;
pub mod proactive;
pub mod schedule;

#[cfg(test)]
mod tests;

pub use controller::{MatchEvent, MatchingConfig, MatchingController, StartOutcome, StopOutcome};
pub use error::{Error, Result};
pub use jobs::{JobGuard, JobRegistry, JobStatus};
pub use notify::{MatchEmail, TracingNotifier, compose_match_email};
pub use proactive::{ProactiveConfig, ProactiveReport, ProactiveSearch};
pub use schedule::{DEFAULT_CRON, start_daily_schedule};
