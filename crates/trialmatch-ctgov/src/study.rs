//! The slice of the ClinicalTrials.gov v2 study document this crate reads,
//! and its conversion into a [`TrialRecord`].

use chrono::NaiveDate;
use serde::Deserialize;
use trialmatch_core::trial::TrialRecord;

/// Study fields requested from the registry; keeps responses small.
pub const STUDY_FIELDS: &str = "NCTId,BriefTitle,OfficialTitle,BriefSummary,\
  DetailedDescription,OverallStatus,Phase,Condition,EligibilityCriteria,LastUpdatePostDate";

/// One page of `GET /studies`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudiesResponse {
  #[serde(default)]
  pub studies:         Vec<RawStudy>,
  pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStudy {
  #[serde(default)]
  pub protocol_section: ProtocolSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolSection {
  pub identification_module: IdentificationModule,
  pub description_module:    DescriptionModule,
  pub status_module:         StatusModule,
  pub design_module:         DesignModule,
  pub conditions_module:     ConditionsModule,
  pub eligibility_module:    EligibilityModule,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentificationModule {
  pub nct_id:         Option<String>,
  pub brief_title:    Option<String>,
  pub official_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DescriptionModule {
  pub brief_summary:        Option<String>,
  pub detailed_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusModule {
  pub overall_status:               Option<String>,
  pub last_update_post_date_struct: Option<DateStruct>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateStruct {
  pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DesignModule {
  pub phases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConditionsModule {
  pub conditions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EligibilityModule {
  pub eligibility_criteria: Option<String>,
}

/// Why a study could not become a catalog record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
  #[error("study has no NCT id")]
  MissingNctId,
  #[error("{nct_id}: no last update date")]
  MissingUpdateDate { nct_id: String },
  #[error("{nct_id}: unparseable date {raw:?}")]
  BadUpdateDate { nct_id: String, raw: String },
}

/// Registry dates are `YYYY-MM-DD`, or `YYYY-MM` for month precision.
pub fn parse_registry_date(raw: &str) -> Option<NaiveDate> {
  let raw = raw.trim();
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
    .ok()
}

impl RawStudy {
  pub fn into_record(self) -> Result<TrialRecord, Rejection> {
    let ProtocolSection {
      identification_module: ident,
      description_module: desc,
      status_module: status,
      design_module: design,
      conditions_module: conditions,
      eligibility_module: eligibility,
    } = self.protocol_section;

    let nct_id = ident
      .nct_id
      .map(|id| id.trim().to_owned())
      .filter(|id| !id.is_empty())
      .ok_or(Rejection::MissingNctId)?;

    let raw_date = status
      .last_update_post_date_struct
      .and_then(|d| d.date)
      .ok_or_else(|| Rejection::MissingUpdateDate { nct_id: nct_id.clone() })?;
    let last_update_posted = parse_registry_date(&raw_date)
      .ok_or_else(|| Rejection::BadUpdateDate { nct_id: nct_id.clone(), raw: raw_date })?;

    Ok(TrialRecord {
      nct_id,
      brief_title: ident.brief_title.unwrap_or_default(),
      official_title: ident.official_title.unwrap_or_default(),
      brief_summary: desc.brief_summary.unwrap_or_default(),
      detailed_description: desc.detailed_description.unwrap_or_default(),
      status: status.overall_status.unwrap_or_default(),
      phase: design.phases,
      conditions: conditions.conditions,
      eligibility_criteria: eligibility.eligibility_criteria.unwrap_or_default(),
      last_update_posted,
      analyzed_criteria: None,
    })
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn study(value: serde_json::Value) -> RawStudy { serde_json::from_value(value).unwrap() }

  #[test]
  fn full_study_converts() {
    let record = study(json!({
      "protocolSection": {
        "identificationModule": {
          "nctId": "NCT04280705",
          "briefTitle": "Adaptive COVID-19 Treatment Trial",
          "officialTitle": "A Multicenter Trial"
        },
        "descriptionModule": { "briefSummary": "Summary", "detailedDescription": "Details" },
        "statusModule": {
          "overallStatus": "COMPLETED",
          "lastUpdatePostDateStruct": { "date": "2024-02-29", "type": "ACTUAL" }
        },
        "designModule": { "phases": ["PHASE3"] },
        "conditionsModule": { "conditions": ["COVID-19"] },
        "eligibilityModule": { "eligibilityCriteria": "Inclusion Criteria: ..." }
      }
    }))
    .into_record()
    .unwrap();

    assert_eq!(record.nct_id, "NCT04280705");
    assert_eq!(record.status, "COMPLETED");
    assert_eq!(record.phase, ["PHASE3"]);
    assert_eq!(record.conditions, ["COVID-19"]);
    assert_eq!(record.last_update_posted, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    assert!(record.analyzed_criteria.is_none());
  }

  #[test]
  fn sparse_study_fills_defaults() {
    let record = study(json!({
      "protocolSection": {
        "identificationModule": { "nctId": "NCT1" },
        "statusModule": { "lastUpdatePostDateStruct": { "date": "2023-07" } }
      }
    }))
    .into_record()
    .unwrap();

    assert_eq!(record.brief_title, "");
    assert!(record.phase.is_empty());
    assert_eq!(record.last_update_posted, NaiveDate::from_ymd_opt(2023, 7, 1).unwrap());
  }

  #[test]
  fn studies_without_key_or_date_are_rejected() {
    assert_eq!(study(json!({})).into_record().unwrap_err(), Rejection::MissingNctId);
    assert_eq!(
      study(json!({ "protocolSection": { "identificationModule": { "nctId": "NCT1" } } }))
        .into_record()
        .unwrap_err(),
      Rejection::MissingUpdateDate { nct_id: "NCT1".into() }
    );
    assert!(matches!(
      study(json!({
        "protocolSection": {
          "identificationModule": { "nctId": "NCT1" },
          "statusModule": { "lastUpdatePostDateStruct": { "date": "soon" } }
        }
      }))
      .into_record(),
      Err(Rejection::BadUpdateDate { .. })
    ));
  }

  #[test]
  fn rejections_are_errors_with_readable_messages() {
    let rejection: Box<dyn std::error::Error> =
      Box::new(Rejection::BadUpdateDate { nct_id: "NCT1".into(), raw: "soon".into() });
    assert_eq!(rejection.to_string(), r#"NCT1: unparseable date "soon""#);
    assert_eq!(Rejection::MissingNctId.to_string(), "study has no NCT id");
  }
}
