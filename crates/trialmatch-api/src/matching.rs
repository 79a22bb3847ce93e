//! Handlers for `/users/:user_id/matching` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users/:user_id/matching/start` | Runs the job to completion; 202 |
//! | `POST` | `/users/:user_id/matching/stop` | Raises the stop flag |
//! | `GET`  | `/users/:user_id/matching/status` | `in_progress`, `stopping` or `not_running` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Serialize;
use trialmatch_classifier::CompletionBackend;
use trialmatch_core::{notify::Notifier, registry::TrialRegistry, store::CatalogStore};
use trialmatch_engine::{JobStatus, StartOutcome, StopOutcome};

use crate::SharedSearch;

#[derive(Debug, Serialize)]
pub struct MessageBody {
  pub message: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub matches: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
  pub status: JobStatus,
}

// ─── Start ───────────────────────────────────────────────────────────────────

/// `POST /users/:user_id/matching/start`
pub async fn start<S, B, R, N>(
  State(search): State<SharedSearch<S, B, R, N>>,
  Path(user_id): Path<String>,
) -> impl IntoResponse
where
  S: CatalogStore,
  B: CompletionBackend + 'static,
  R: TrialRegistry + 'static,
  N: Notifier + 'static,
{
  let body = match search.controller().start(&user_id).await {
    StartOutcome::AlreadyRunning => {
      MessageBody { message: "Matching process already running", matches: None }
    }
    StartOutcome::Completed { matches_found } => {
      MessageBody { message: "Matching process completed", matches: Some(matches_found) }
    }
  };
  (StatusCode::ACCEPTED, Json(body))
}

// ─── Stop ────────────────────────────────────────────────────────────────────

/// `POST /users/:user_id/matching/stop`
pub async fn stop<S, B, R, N>(
  State(search): State<SharedSearch<S, B, R, N>>,
  Path(user_id): Path<String>,
) -> Json<MessageBody>
where
  S: CatalogStore,
  B: CompletionBackend + 'static,
  R: TrialRegistry + 'static,
  N: Notifier + 'static,
{
  let message = match search.controller().stop(&user_id) {
    StopOutcome::SignalSent => "Stop signal sent to matching process",
    StopOutcome::NoActiveProcess => "No active matching process found for this user",
  };
  Json(MessageBody { message, matches: None })
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// `GET /users/:user_id/matching/status`
pub async fn status<S, B, R, N>(
  State(search): State<SharedSearch<S, B, R, N>>,
  Path(user_id): Path<String>,
) -> Json<StatusBody>
where
  S: CatalogStore,
  B: CompletionBackend + 'static,
  R: TrialRegistry + 'static,
  N: Notifier + 'static,
{
  Json(StatusBody { status: search.controller().status(&user_id) })
}
