//! Handlers for `/users/:user_id/matches` endpoints.
//!
//! Each match is joined with its trial's title, summary, phase and status.
//! Matches whose trial is no longer in the catalog are left out.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trialmatch_classifier::CompletionBackend;
use trialmatch_core::{
  matching::MatchRecord,
  notify::Notifier,
  registry::TrialRegistry,
  store::{CatalogStore, TrialStore},
};

use crate::{SharedSearch, error::ApiError};

pub const MAX_PER_PAGE: u64 = 100;
pub const RECENT_LIMIT: u64 = 5;

#[derive(Debug, Serialize)]
pub struct MatchView {
  pub nct_id:              String,
  pub compatibility_score: f64,
  pub reasons:             Vec<String>,
  pub timestamp:           DateTime<Utc>,
  pub title:               String,
  pub brief_summary:       String,
  pub phase:               Vec<String>,
  pub status:              String,
}

async fn with_trials<S: TrialStore>(
  store: &S,
  records: Vec<MatchRecord>,
) -> Result<Vec<MatchView>, ApiError> {
  let mut views = Vec::with_capacity(records.len());
  for record in records {
    let Some(trial) = store.get_trial(&record.nct_id).await.map_err(ApiError::store)? else {
      continue;
    };
    views.push(MatchView {
      nct_id:              record.nct_id,
      compatibility_score: record.compatibility_score.value(),
      reasons:             record.reasons,
      timestamp:           record.timestamp,
      title:               trial.brief_title,
      brief_summary:       trial.brief_summary,
      phase:               trial.phase,
      status:              trial.status,
    });
  }
  Ok(views)
}

// ─── Paginated ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PageParams {
  /// 1-based. Default 1.
  pub page:     Option<u64>,
  /// Default 10, capped at [`MAX_PER_PAGE`].
  pub per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MatchPage {
  pub matches:     Vec<MatchView>,
  pub total:       u64,
  pub page:        u64,
  pub per_page:    u64,
  pub total_pages: u64,
}

/// `GET /users/:user_id/matches[?page=..][&per_page=..]`, newest first.
pub async fn list<S, B, R, N>(
  State(search): State<SharedSearch<S, B, R, N>>,
  Path(user_id): Path<String>,
  Query(params): Query<PageParams>,
) -> Result<Json<MatchPage>, ApiError>
where
  S: CatalogStore,
  B: CompletionBackend + 'static,
  R: TrialRegistry + 'static,
  N: Notifier + 'static,
{
  let page = params.page.unwrap_or(1);
  let per_page = params.per_page.unwrap_or(10).min(MAX_PER_PAGE);
  if page == 0 || per_page == 0 {
    return Err(ApiError::BadRequest("page and per_page must be at least 1".into()));
  }

  let store = search.controller().store();
  let total = store.count_matches(&user_id).await.map_err(ApiError::store)?;
  let records = store
    .list_matches(&user_id, (page - 1).saturating_mul(per_page), per_page)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(MatchPage {
    matches: with_trials(store.as_ref(), records).await?,
    total,
    page,
    per_page,
    total_pages: total.div_ceil(per_page),
  }))
}

// ─── Recent ──────────────────────────────────────────────────────────────────

/// `GET /users/:user_id/matches/recent`
pub async fn recent<S, B, R, N>(
  State(search): State<SharedSearch<S, B, R, N>>,
  Path(user_id): Path<String>,
) -> Result<Json<Vec<MatchView>>, ApiError>
where
  S: CatalogStore,
  B: CompletionBackend + 'static,
  R: TrialRegistry + 'static,
  N: Notifier + 'static,
{
  let store = search.controller().store();
  let records = store
    .list_matches(&user_id, 0, RECENT_LIMIT)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(with_trials(store.as_ref(), records).await?))
}
