//! Wiring for the `trialmatch-server` binary: configuration and the
//! concrete service stack behind the HTTP API.

pub mod config;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use trialmatch_classifier::AnthropicBackend;
use trialmatch_ctgov::CtGovClient;
use trialmatch_engine::{ProactiveSearch, TracingNotifier};
use trialmatch_store_sqlite::SqliteStore;

pub type Search = ProactiveSearch<SqliteStore, AnthropicBackend, CtGovClient, TracingNotifier>;

/// The API under `/api`, with request tracing.
pub fn router(search: Arc<Search>) -> Router {
  Router::new()
    .nest("/api", trialmatch_api::api_router(search))
    .layer(TraceLayer::new_for_http())
}
