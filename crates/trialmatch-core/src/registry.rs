//! The external trial registry the proactive search pulls new trials from.

use std::future::Future;

use chrono::NaiveDate;

use crate::trial::TrialRecord;

/// One page of registry results.
#[derive(Debug, Clone, Default)]
pub struct TrialPage {
  pub trials:          Vec<TrialRecord>,
  /// Opaque continuation token; `None` on the last page.
  pub next_page_token: Option<String>,
}

/// A paginated catalog of trials, typically a remote HTTP service.
///
/// Implementations are expected to retry transient failures themselves; an
/// error returned from here means the registry is unreachable for this run.
pub trait TrialRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Trials whose `last_update_posted` is on or after `since`.
  fn fetch_updated_since(
    &self,
    since: NaiveDate,
    page_token: Option<String>,
    limit: u32,
  ) -> impl Future<Output = Result<TrialPage, Self::Error>> + Send;
}
