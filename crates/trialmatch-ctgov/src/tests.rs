//! Registry client tests against a `wiremock` server.

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{Value, json};
use trialmatch_core::{
  registry::TrialRegistry,
  retry::RetryPolicy,
  store::TrialStore,
  trial::TrialRecord,
};
use trialmatch_store_sqlite::SqliteStore;
use wiremock::{
  Mock, MockServer, ResponseTemplate,
  matchers::{method, path, query_param, query_param_is_missing},
};

use crate::{CtGovClient, CtGovConfig, Error, PopulateOptions, populate_catalog};

fn client(server: &MockServer) -> CtGovClient {
  CtGovClient::new(CtGovConfig {
    base_url: server.uri(),
    timeout:  Duration::from_secs(5),
    retry:    RetryPolicy::immediate(5),
  })
  .unwrap()
}

fn study(nct_id: &str, date: &str) -> Value {
  json!({
    "protocolSection": {
      "identificationModule": { "nctId": nct_id, "briefTitle": format!("Study <b>{nct_id}</b>") },
      "statusModule": {
        "overallStatus": "RECRUITING",
        "lastUpdatePostDateStruct": { "date": date }
      },
      "conditionsModule": { "conditions": ["Asthma"] }
    }
  })
}

fn page(studies: Vec<Value>, next: Option<&str>) -> ResponseTemplate {
  let mut body = json!({ "studies": studies });
  if let Some(token) = next {
    body["nextPageToken"] = json!(token);
  }
  ResponseTemplate::new(200).set_body_json(body)
}

fn options(max_trials: u64) -> PopulateOptions {
  PopulateOptions { max_trials, page_size: 2, page_delay: Duration::ZERO }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

// ─── Paging ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_page_sends_filters_and_drops_unkeyed_studies() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .and(query_param("format", "json"))
    .and(query_param("pageSize", "10"))
    .and(query_param("filter.advanced", "AREA[LastUpdatePostDate]RANGE[2024-01-01,MAX]"))
    .respond_with(page(
      vec![study("NCT1", "2024-01-05"), json!({ "protocolSection": {} }), study("NCT2", "2024-02")],
      Some("next-token"),
    ))
    .expect(1)
    .mount(&server)
    .await;

  let page = client(&server)
    .fetch_updated_since(date(2024, 1, 1), None, 10)
    .await
    .unwrap();

  let ids: Vec<_> = page.trials.iter().map(|t| t.nct_id.as_str()).collect();
  assert_eq!(ids, ["NCT1", "NCT2"]);
  assert_eq!(page.trials[1].last_update_posted, date(2024, 2, 1));
  assert_eq!(page.next_page_token.as_deref(), Some("next-token"));
}

#[tokio::test]
async fn page_token_is_forwarded() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .and(query_param("pageToken", "abc"))
    .respond_with(page(vec![], None))
    .expect(1)
    .mount(&server)
    .await;

  let page = client(&server).fetch_page(None, Some("abc"), 10).await.unwrap();
  assert!(page.trials.is_empty());
  assert!(page.next_page_token.is_none());
}

// ─── Retries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_statuses_are_retried() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .respond_with(ResponseTemplate::new(503))
    .up_to_n_times(2)
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .respond_with(page(vec![study("NCT1", "2024-01-01")], None))
    .mount(&server)
    .await;

  let page = client(&server).fetch_page(None, None, 10).await.unwrap();
  assert_eq!(page.trials.len(), 1);
  assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn retries_stop_after_five_attempts() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .respond_with(ResponseTemplate::new(429))
    .mount(&server)
    .await;

  let err = client(&server).fetch_page(None, None, 10).await.unwrap_err();
  assert!(matches!(err, Error::Status { status: 429, .. }));
  assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
    .mount(&server)
    .await;

  let err = client(&server).fetch_page(None, None, 10).await.unwrap_err();
  assert!(matches!(err, Error::Status { status: 400, ref body } if body == "bad filter"));
  assert!(!err.is_retryable());
  assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

// ─── Population ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn populate_follows_page_tokens_until_exhausted() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .and(query_param_is_missing("pageToken"))
    .and(query_param_is_missing("filter.advanced"))
    .respond_with(page(
      vec![study("NCT1", "2024-01-01"), study("NCT2", "2024-01-02")],
      Some("p2"),
    ))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .and(query_param("pageToken", "p2"))
    .respond_with(page(vec![study("NCT3", "2024-01-03")], None))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  let report = populate_catalog(&store, &client(&server), &options(0)).await.unwrap();

  assert_eq!(report.inserted, 3);
  assert_eq!(report.pages, 2);
  assert_eq!(store.count_trials().await.unwrap(), 3);

  let saved = store.get_trial("NCT1").await.unwrap().unwrap();
  assert_eq!(saved.brief_title, "Study bNCT1b");
}

#[tokio::test]
async fn populate_stops_at_the_requested_count() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .respond_with(page(
      vec![study("NCT1", "2024-01-01"), study("NCT2", "2024-01-02")],
      Some("more"),
    ))
    .expect(1)
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  let report = populate_catalog(&store, &client(&server), &options(2)).await.unwrap();
  assert_eq!(report.inserted, 2);
  assert_eq!(report.pages, 1);
}

#[tokio::test]
async fn populate_resumes_from_newest_stored_update() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .and(query_param("filter.advanced", "AREA[LastUpdatePostDate]RANGE[2024-03-01,MAX]"))
    .respond_with(page(
      vec![study("NCT0", "2024-03-01"), study("NCT9", "2024-03-02")],
      None,
    ))
    .expect(1)
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  store
    .upsert_trial(&TrialRecord {
      nct_id:               "NCT0".into(),
      brief_title:          "Study NCT0".into(),
      official_title:       String::new(),
      brief_summary:        String::new(),
      detailed_description: String::new(),
      status:               "RECRUITING".into(),
      phase:                vec![],
      conditions:           vec!["Asthma".into()],
      eligibility_criteria: String::new(),
      last_update_posted:   date(2024, 3, 1),
      analyzed_criteria:    None,
    })
    .await
    .unwrap();

  let report = populate_catalog(&store, &client(&server), &options(0)).await.unwrap();
  assert_eq!(report.inserted, 1);
  assert_eq!(report.updated, 1);
  assert_eq!(store.count_trials().await.unwrap(), 2);
}

#[tokio::test]
async fn populate_ends_quietly_on_page_error() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/studies"))
    .respond_with(ResponseTemplate::new(400))
    .mount(&server)
    .await;

  let store = SqliteStore::open_in_memory().await.unwrap();
  let report = populate_catalog(&store, &client(&server), &options(0)).await.unwrap();
  assert_eq!(report.written(), 0);
  assert_eq!(report.pages, 0);
}
