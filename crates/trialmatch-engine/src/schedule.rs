//! Cron wiring for the daily proactive search.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use trialmatch_classifier::CompletionBackend;
use trialmatch_core::{notify::Notifier, registry::TrialRegistry, store::CatalogStore};

use crate::{ProactiveSearch, Result};

/// Every day at 02:00 UTC (`sec min hour day month weekday`).
pub const DEFAULT_CRON: &str = "0 0 2 * * *";

/// Register `search` on `cron` and start the scheduler. The returned
/// scheduler keeps the job alive; shut it down to stop.
///
/// A failed run is logged and waits for the next tick.
pub async fn start_daily_schedule<S, B, R, N>(
  search: Arc<ProactiveSearch<S, B, R, N>>,
  cron: &str,
) -> Result<JobScheduler>
where
  S: CatalogStore,
  B: CompletionBackend + 'static,
  R: TrialRegistry + 'static,
  N: Notifier + 'static,
{
  let scheduler = JobScheduler::new().await?;

  let job = Job::new_async(cron, move |_id, _lock| {
    let search = search.clone();
    Box::pin(async move {
      info!("scheduled proactive search triggered");
      match search.run().await {
        Ok(report) => info!(?report, "scheduled proactive search finished"),
        Err(e) => error!(error = %e, "scheduled proactive search failed"),
      }
    })
  })?;
  let job_id = job.guid();
  scheduler.add(job).await?;
  scheduler.start().await?;

  info!(cron, %job_id, "proactive search scheduled");
  Ok(scheduler)
}
