//! Bulk seeding of the local catalog from the registry.

use std::time::Duration;

use tracing::{error, info, warn};
use trialmatch_core::{store::TrialStore, trial::TrialUpsert};

use crate::{CtGovClient, Error, Result};

#[derive(Debug, Clone)]
pub struct PopulateOptions {
  /// Stop once this many trials were inserted or updated; `0` means no
  /// limit.
  pub max_trials: u64,
  pub page_size:  u32,
  /// Pause between pages, to stay under the registry's rate limit.
  pub page_delay: Duration,
}

impl Default for PopulateOptions {
  fn default() -> Self {
    Self { max_trials: 300, page_size: 100, page_delay: Duration::from_secs(2) }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateReport {
  pub inserted:  u64,
  pub updated:   u64,
  pub unchanged: u64,
  pub pages:     u64,
}

impl PopulateReport {
  /// Trials inserted or updated.
  pub fn written(&self) -> u64 { self.inserted + self.updated }
}

/// Page through the registry from the newest update already in `store`,
/// upserting every sanitised trial.
///
/// A failed page ends the run early and is logged, not returned; only a
/// failure to read the starting date is an error.
pub async fn populate_catalog<S: TrialStore>(
  store: &S,
  client: &CtGovClient,
  options: &PopulateOptions,
) -> Result<PopulateReport> {
  let since = store
    .most_recent_update_date()
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;
  info!(?since, max_trials = options.max_trials, "populating trial catalog");

  let mut report = PopulateReport::default();
  let mut page_token: Option<String> = None;

  while options.max_trials == 0 || report.written() < options.max_trials {
    let page = match client.fetch_page(since, page_token.as_deref(), options.page_size).await {
      Ok(page) => page,
      Err(e) => {
        error!(error = %e, "registry page failed; stopping");
        break;
      }
    };
    report.pages += 1;

    if page.trials.is_empty() {
      info!("registry returned an empty page; stopping");
      break;
    }

    for trial in &page.trials {
      match store.upsert_trial(&trial.sanitized()).await {
        Ok(TrialUpsert::Inserted) => report.inserted += 1,
        Ok(TrialUpsert::Updated) => report.updated += 1,
        Ok(TrialUpsert::Unchanged) => report.unchanged += 1,
        Err(e) => warn!(nct_id = %trial.nct_id, error = %e, "failed to save trial"),
      }
    }
    info!(
      inserted = report.inserted,
      updated = report.updated,
      pages = report.pages,
      "page saved"
    );

    page_token = page.next_page_token;
    if page_token.is_none() {
      info!("no more registry pages");
      break;
    }
    if options.max_trials > 0 && report.written() >= options.max_trials {
      break;
    }
    tokio::time::sleep(options.page_delay).await;
  }

  info!(inserted = report.inserted, updated = report.updated, "catalog population finished");
  Ok(report)
}
