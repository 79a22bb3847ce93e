//! Runtime configuration, layered from an optional TOML file and
//! `TRIALMATCH_*` environment variables.
//!
//! Nested keys use `__` in the environment, e.g.
//! `TRIALMATCH_CLASSIFIER__API_KEY` or `TRIALMATCH_SERVER__PORT`.

use std::{path::PathBuf, time::Duration};

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;
use trialmatch_classifier::{
  AnthropicConfig, ClassifierConfig, anthropic, prompt::DEFAULT_BUDGET_CHARS,
};
use trialmatch_core::retry::RetryPolicy;
use trialmatch_ctgov::{CtGovConfig, PopulateOptions};
use trialmatch_engine::{DEFAULT_CRON, MatchingConfig, ProactiveConfig};

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  #[serde(default)]
  pub server:     ServerSection,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  pub classifier: ClassifierSection,
  #[serde(default)]
  pub matching:   MatchingSection,
  #[serde(default)]
  pub registry:   RegistrySection,
  #[serde(default)]
  pub schedule:   ScheduleSection,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/trialmatch/trialmatch.db") }

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
  pub host: String,
  pub port: u16,
}

impl Default for ServerSection {
  fn default() -> Self { Self { host: "127.0.0.1".into(), port: 8080 } }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSection {
  pub api_key:          String,
  #[serde(default = "default_anthropic_url")]
  pub base_url:         String,
  #[serde(default = "default_model")]
  pub model:            String,
  #[serde(default = "default_budget")]
  pub budget_chars:     usize,
  #[serde(default = "default_raw_timeout")]
  pub raw_timeout_secs: u64,
  #[serde(default = "default_max_tokens")]
  pub max_tokens:       u32,
}

fn default_anthropic_url() -> String { anthropic::DEFAULT_BASE_URL.to_owned() }
fn default_model() -> String { anthropic::DEFAULT_MODEL.to_owned() }
fn default_budget() -> usize { DEFAULT_BUDGET_CHARS }
fn default_raw_timeout() -> u64 { 30 }
fn default_max_tokens() -> u32 { 1000 }

impl ClassifierSection {
  pub fn backend(&self) -> AnthropicConfig {
    AnthropicConfig {
      base_url: self.base_url.clone(),
      model: self.model.clone(),
      ..AnthropicConfig::new(self.api_key.clone())
    }
  }

  pub fn client(&self) -> ClassifierConfig {
    ClassifierConfig {
      budget_chars: self.budget_chars,
      raw_timeout:  Duration::from_secs(self.raw_timeout_secs),
      max_tokens:   self.max_tokens,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingSection {
  pub batch_size:           u64,
  pub batch_interval_ms:    u64,
  pub attempt_timeout_secs: u64,
  pub max_attempts:         u32,
}

impl Default for MatchingSection {
  fn default() -> Self {
    Self { batch_size: 50, batch_interval_ms: 1000, attempt_timeout_secs: 60, max_attempts: 3 }
  }
}

impl MatchingSection {
  pub fn matching(&self) -> MatchingConfig {
    MatchingConfig {
      batch_size:      self.batch_size,
      batch_interval:  Duration::from_millis(self.batch_interval_ms),
      attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
      retry:           RetryPolicy { max_attempts: self.max_attempts, ..RetryPolicy::classifier() },
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
  pub base_url:      String,
  pub timeout_secs:  u64,
  pub page_size:     u32,
  pub page_delay_ms: u64,
}

impl Default for RegistrySection {
  fn default() -> Self {
    Self {
      base_url:      trialmatch_ctgov::DEFAULT_BASE_URL.to_owned(),
      timeout_secs:  30,
      page_size:     100,
      page_delay_ms: 2000,
    }
  }
}

impl RegistrySection {
  pub fn client(&self) -> CtGovConfig {
    CtGovConfig {
      base_url: self.base_url.clone(),
      timeout:  Duration::from_secs(self.timeout_secs),
      retry:    RetryPolicy::registry(),
    }
  }

  pub fn populate(&self, max_trials: u64, page_size: u32) -> PopulateOptions {
    PopulateOptions { max_trials, page_size, page_delay: Duration::from_millis(self.page_delay_ms) }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
  pub enabled:        bool,
  pub cron:           String,
  /// Window searched on the very first run.
  pub lookback_hours: u64,
}

impl Default for ScheduleSection {
  fn default() -> Self { Self { enabled: true, cron: DEFAULT_CRON.to_owned(), lookback_hours: 24 } }
}

impl AppConfig {
  pub fn proactive(&self) -> ProactiveConfig {
    ProactiveConfig {
      page_size: self.registry.page_size,
      lookback:  Duration::from_secs(self.schedule.lookback_hours * 60 * 60),
    }
  }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl AppConfig {
  /// Read `path` (if it exists) under the `TRIALMATCH_*` environment.
  pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
    let builder = Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(
        Environment::with_prefix("TRIALMATCH")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      );
    Self::build(builder)
  }

  fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
    builder.build()?.try_deserialize()
  }
}
