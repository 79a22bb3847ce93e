//! JSON REST API for the matching engine.
//!
//! Exposes an axum [`Router`] over a shared [`ProactiveSearch`], which in
//! turn owns the [`MatchingController`](trialmatch_engine::MatchingController).
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", trialmatch_api::api_router(search.clone()))
//! ```

pub mod error;
pub mod matches;
pub mod matching;
pub mod proactive;


use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use trialmatch_classifier::CompletionBackend;
use trialmatch_core::{notify::Notifier, registry::TrialRegistry, store::CatalogStore};
use trialmatch_engine::ProactiveSearch;

pub use error::ApiError;

/// Router state: the proactive search and, through it, the controller and
/// store.
pub type SharedSearch<S, B, R, N> = Arc<ProactiveSearch<S, B, R, N>>;

/// Build a fully-materialised API router for `search`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, B, R, N>(search: SharedSearch<S, B, R, N>) -> Router<()>
where
  S: CatalogStore,
  B: CompletionBackend + 'static,
  R: TrialRegistry + 'static,
  N: Notifier + 'static,
{
  Router::new()
    // Matching jobs
    .route("/users/{user_id}/matching/start", post(matching::start::<S, B, R, N>))
    .route("/users/{user_id}/matching/stop", post(matching::stop::<S, B, R, N>))
    .route("/users/{user_id}/matching/status", get(matching::status::<S, B, R, N>))
    // Matches
    .route("/users/{user_id}/matches", get(matches::list::<S, B, R, N>))
    .route("/users/{user_id}/matches/recent", get(matches::recent::<S, B, R, N>))
    // Proactive search
    .route("/proactive-search/run", post(proactive::run::<S, B, R, N>))
    .with_state(search)
}
