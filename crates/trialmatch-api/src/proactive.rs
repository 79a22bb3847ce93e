//! Handler for `POST /proactive-search/run`.

use axum::{Json, extract::State};
use trialmatch_classifier::CompletionBackend;
use trialmatch_core::{notify::Notifier, registry::TrialRegistry, store::CatalogStore};
use trialmatch_engine::ProactiveReport;

use crate::{SharedSearch, error::ApiError};

/// Run one proactive pass and return its report. A fatal failure maps to
/// 500.
pub async fn run<S, B, R, N>(
  State(search): State<SharedSearch<S, B, R, N>>,
) -> Result<Json<ProactiveReport>, ApiError>
where
  S: CatalogStore,
  B: CompletionBackend + 'static,
  R: TrialRegistry + 'static,
  N: Notifier + 'static,
{
  Ok(Json(search.run().await?))
}
