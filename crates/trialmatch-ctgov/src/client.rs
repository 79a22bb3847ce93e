//! [`CtGovClient`]: paginated reads from the ClinicalTrials.gov v2 API.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use trialmatch_core::{
  registry::{TrialPage, TrialRegistry},
  retry::RetryPolicy,
};

use crate::{
  Error, Result,
  study::{STUDY_FIELDS, StudiesResponse},
};

pub const DEFAULT_BASE_URL: &str = "https://clinicaltrials.gov/api/v2";

#[derive(Debug, Clone)]
pub struct CtGovConfig {
  /// API root; `/studies` is appended.
  pub base_url: String,
  /// Per-request timeout.
  pub timeout:  Duration,
  pub retry:    RetryPolicy,
}

impl Default for CtGovConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_owned(),
      timeout:  Duration::from_secs(30),
      retry:    RetryPolicy::registry(),
    }
  }
}

pub struct CtGovClient {
  http:   Client,
  config: CtGovConfig,
}

impl CtGovClient {
  pub fn new(config: CtGovConfig) -> Result<Self> {
    let http = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { http, config })
  }

  /// Fetch one page of studies, optionally restricted to those updated on
  /// or after `updated_since`. Studies that cannot be keyed or dated are
  /// dropped with a warning.
  #[instrument(skip(self, page_token))]
  pub async fn fetch_page(
    &self,
    updated_since: Option<NaiveDate>,
    page_token: Option<&str>,
    page_size: u32,
  ) -> Result<TrialPage> {
    let response = self
      .config
      .retry
      .run(|_| self.request_page(updated_since, page_token, page_size), Error::is_retryable)
      .await?;

    let fetched = response.studies.len();
    let trials: Vec<_> = response
      .studies
      .into_iter()
      .filter_map(|study| match study.into_record() {
        Ok(record) => Some(record),
        Err(rejection) => {
          warn!(%rejection, "skipping registry study");
          None
        }
      })
      .collect();

    debug!(fetched, kept = trials.len(), has_next = response.next_page_token.is_some(), "page fetched");
    Ok(TrialPage { trials, next_page_token: response.next_page_token })
  }

  async fn request_page(
    &self,
    updated_since: Option<NaiveDate>,
    page_token: Option<&str>,
    page_size: u32,
  ) -> Result<StudiesResponse> {
    let url = format!("{}/studies", self.config.base_url.trim_end_matches('/'));

    let mut query: Vec<(&str, String)> = vec![
      ("format", "json".to_owned()),
      ("fields", STUDY_FIELDS.to_owned()),
      ("pageSize", page_size.to_string()),
    ];
    if let Some(token) = page_token {
      query.push(("pageToken", token.to_owned()));
    }
    if let Some(since) = updated_since {
      query.push((
        "filter.advanced",
        format!("AREA[LastUpdatePostDate]RANGE[{},MAX]", since.format("%Y-%m-%d")),
      ));
    }

    let response = self.http.get(&url).query(&query).send().await?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Status { status: status.as_u16(), body });
    }
    Ok(response.json().await?)
  }
}

impl TrialRegistry for CtGovClient {
  type Error = Error;

  async fn fetch_updated_since(
    &self,
    since: NaiveDate,
    page_token: Option<String>,
    limit: u32,
  ) -> Result<TrialPage> {
    self.fetch_page(Some(since), page_token.as_deref(), limit).await
  }
}
