//! trialmatch server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) under the
//! `TRIALMATCH_*` environment, opens the SQLite store, and either serves the
//! HTTP API with the daily proactive search scheduled, or runs one
//! maintenance command and exits.
//!
//! ```text
//! trialmatch-server serve
//! trialmatch-server populate-trials --num-trials 500
//! trialmatch-server db-stats
//! trialmatch-server run-proactive
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use trialmatch_classifier::{AnthropicBackend, ClassifierClient};
use trialmatch_core::store::TrialStore;
use trialmatch_ctgov::{CtGovClient, populate_catalog};
use trialmatch_engine::{JobRegistry, MatchingController, ProactiveSearch, TracingNotifier};
use trialmatch_server::{Search, config::AppConfig};
use trialmatch_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Clinical trial matching server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API and run the scheduled proactive search (default).
  Serve,
  /// Seed the local catalog from ClinicalTrials.gov.
  PopulateTrials {
    /// Stop after this many trials were written; 0 for no limit.
    #[arg(long, default_value_t = 300)]
    num_trials: u64,
    /// Trials requested per registry page.
    #[arg(long, default_value_t = 100)]
    batch_size: u32,
  },
  /// Print catalog statistics.
  DbStats,
  /// Run one proactive search pass and print its report.
  RunProactive,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = AppConfig::load(cli.config).context("failed to load configuration")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&config.store_path);
  if let Some(parent) = store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(&config, store).await,
    Command::PopulateTrials { num_trials, batch_size } => {
      let registry = CtGovClient::new(config.registry.client())
        .context("failed to build registry client")?;
      let options = config.registry.populate(num_trials, batch_size);
      let report = populate_catalog(store.as_ref(), &registry, &options)
        .await
        .context("catalog population failed")?;
      println!(
        "Inserted {} and updated {} trials ({} unchanged, {} pages)",
        report.inserted, report.updated, report.unchanged, report.pages
      );
      Ok(())
    }
    Command::DbStats => {
      let stats = store.catalog_stats().await.context("failed to read catalog stats")?;
      println!("{}", serde_json::to_string_pretty(&stats)?);
      Ok(())
    }
    Command::RunProactive => {
      let search = build_search(&config, store)?;
      let report = search.run().await.context("proactive search failed")?;
      println!("{}", serde_json::to_string_pretty(&report)?);
      Ok(())
    }
  }
}

async fn serve(config: &AppConfig, store: Arc<SqliteStore>) -> anyhow::Result<()> {
  let search = Arc::new(build_search(config, store)?);

  let _scheduler = if config.schedule.enabled {
    let scheduler = trialmatch_engine::start_daily_schedule(search.clone(), &config.schedule.cron)
      .await
      .context("failed to schedule proactive search")?;
    Some(scheduler)
  } else {
    tracing::info!("proactive search schedule disabled");
    None
  };

  let app = trialmatch_server::router(search);
  let address = format!("{}:{}", config.server.host, config.server.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn build_search(config: &AppConfig, store: Arc<SqliteStore>) -> anyhow::Result<Search> {
  let backend = AnthropicBackend::new(config.classifier.backend())
    .context("failed to build classifier backend")?;
  let classifier = Arc::new(ClassifierClient::new(backend, config.classifier.client()));
  let controller = Arc::new(MatchingController::new(
    store,
    classifier,
    JobRegistry::new(),
    config.matching.matching(),
  ));
  let registry =
    CtGovClient::new(config.registry.client()).context("failed to build registry client")?;
  Ok(ProactiveSearch::new(controller, registry, TracingNotifier, config.proactive()))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
