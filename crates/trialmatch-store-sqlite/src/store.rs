//! [`SqliteStore`]: the SQLite implementation of the catalog, patient
//! directory and checkpoint log.

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use trialmatch_core::{
  matching::MatchRecord,
  patient::PatientProfile,
  store::{CheckpointLog, PatientDirectory, Storage, TrialStore},
  trial::{CatalogStats, TrialRecord, TrialUpsert},
};

use crate::{
  encode::{
    content_hash, decode_date, decode_dt, encode_date, encode_dt, encode_list, RawMatch,
    RawPatient, RawTrial, MATCH_COLUMNS, PATIENT_COLUMNS, TRIAL_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A trial catalog backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Create or replace a patient profile, keyed by `user_id`.
  pub async fn save_patient(&self, profile: &PatientProfile) -> Result<()> {
    let user_id       = profile.user_id.clone();
    let first_name    = profile.first_name.clone();
    let last_name     = profile.last_name.clone();
    let email         = profile.email.clone();
    let dob_str       = encode_date(profile.date_of_birth);
    let gender_str    = profile.gender.to_string();
    let conditions    = encode_list(&profile.medical_conditions)?;
    let medications   = encode_list(&profile.medications)?;
    let ethnicity     = profile.ethnicity.clone();
    let family        = profile.family_medical_history.clone();
    let notified_str  = profile.last_notified.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO patients (
             user_id, first_name, last_name, email, date_of_birth, gender,
             medical_conditions, medications, ethnicity, family_medical_history,
             last_notified
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
           ON CONFLICT (user_id) DO UPDATE SET
             first_name             = excluded.first_name,
             last_name              = excluded.last_name,
             email                  = excluded.email,
             date_of_birth          = excluded.date_of_birth,
             gender                 = excluded.gender,
             medical_conditions     = excluded.medical_conditions,
             medications            = excluded.medications,
             ethnicity              = excluded.ethnicity,
             family_medical_history = excluded.family_medical_history,
             last_notified          = excluded.last_notified",
          rusqlite::params![
            user_id,
            first_name,
            last_name,
            email,
            dob_str,
            gender_str,
            conditions,
            medications,
            ethnicity,
            family,
            notified_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl Storage for SqliteStore {
  type Error = Error;
}

// ─── TrialStore impl ─────────────────────────────────────────────────────────

impl TrialStore for SqliteStore {
  // ── Trials ────────────────────────────────────────────────────────────────

  async fn count_trials(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM trials", [], |r| r.get(0))?))
      .await?;
    Ok(n.max(0) as u64)
  }

  async fn page_trials(&self, skip: u64, limit: u64) -> Result<Vec<TrialRecord>> {
    let skip_val  = i64::try_from(skip).unwrap_or(i64::MAX);
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawTrial> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TRIAL_COLUMNS} FROM trials ORDER BY nct_id ASC LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val, skip_val], RawTrial::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTrial::into_trial).collect()
  }

  async fn get_trial(&self, nct_id: &str) -> Result<Option<TrialRecord>> {
    let id = nct_id.to_owned();

    let raw: Option<RawTrial> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {TRIAL_COLUMNS} FROM trials WHERE nct_id = ?1"),
            rusqlite::params![id],
            RawTrial::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawTrial::into_trial).transpose()
  }

  async fn most_recent_update_date(&self) -> Result<Option<NaiveDate>> {
    let raw: Option<String> = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT MAX(last_update_posted) FROM trials", [], |r| r.get(0))?)
      })
      .await?;

    raw.as_deref().map(decode_date).transpose()
  }

  async fn upsert_trial(&self, record: &TrialRecord) -> Result<TrialUpsert> {
    record.validate()?;

    let hash          = content_hash(record)?;
    let nct_id        = record.nct_id.clone();
    let brief_title   = record.brief_title.clone();
    let official      = record.official_title.clone();
    let summary       = record.brief_summary.clone();
    let description   = record.detailed_description.clone();
    let status        = record.status.clone();
    let phase_str     = encode_list(&record.phase)?;
    let cond_str      = encode_list(&record.conditions)?;
    let criteria      = record.eligibility_criteria.clone();
    let updated_str   = encode_date(record.last_update_posted);
    let analyzed_str  = record
      .analyzed_criteria
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;
    let refreshed_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing: Option<(String, bool)> = tx
          .query_row(
            "SELECT content_hash, analyzed_criteria IS NOT NULL
             FROM trials WHERE nct_id = ?1",
            rusqlite::params![nct_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;

        let outcome = match existing {
          None => {
            tx.execute(
              "INSERT INTO trials (
                 nct_id, brief_title, official_title, brief_summary,
                 detailed_description, status, phase, conditions,
                 eligibility_criteria, last_update_posted, analyzed_criteria,
                 content_hash, refreshed_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
              rusqlite::params![
                nct_id,
                brief_title,
                official,
                summary,
                description,
                status,
                phase_str,
                cond_str,
                criteria,
                updated_str,
                analyzed_str,
                hash,
                refreshed_str,
              ],
            )?;
            TrialUpsert::Inserted
          }
          Some((stored_hash, has_analysis))
            if stored_hash == hash && (has_analysis || analyzed_str.is_none()) =>
          {
            TrialUpsert::Unchanged
          }
          Some(_) => {
            // A supplied enrichment replaces the stored one; otherwise the
            // stored enrichment is kept.
            tx.execute(
              "UPDATE trials SET
                 brief_title          = ?2,
                 official_title       = ?3,
                 brief_summary        = ?4,
                 detailed_description = ?5,
                 status               = ?6,
                 phase                = ?7,
                 conditions           = ?8,
                 eligibility_criteria = ?9,
                 last_update_posted   = ?10,
                 analyzed_criteria    = COALESCE(?11, analyzed_criteria),
                 content_hash         = ?12,
                 refreshed_at         = ?13
               WHERE nct_id = ?1",
              rusqlite::params![
                nct_id,
                brief_title,
                official,
                summary,
                description,
                status,
                phase_str,
                cond_str,
                criteria,
                updated_str,
                analyzed_str,
                hash,
                refreshed_str,
              ],
            )?;
            TrialUpsert::Updated
          }
        };

        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    debug!(nct_id = %record.nct_id, %outcome, "trial upserted");
    Ok(outcome)
  }

  async fn catalog_stats(&self) -> Result<CatalogStats> {
    type Grouped = Vec<(String, i64)>;

    let (total, earliest, latest, statuses, phases): (
      i64,
      Option<String>,
      Option<String>,
      Grouped,
      Grouped,
    ) = self
      .conn
      .call(|conn| {
        let (total, earliest, latest): (i64, Option<String>, Option<String>) = conn.query_row(
          "SELECT COUNT(*), MIN(last_update_posted), MAX(last_update_posted) FROM trials",
          [],
          |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;

        let statuses: Grouped = conn
          .prepare("SELECT status, COUNT(*) FROM trials GROUP BY status")?
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let phases: Grouped = conn
          .prepare(
            "SELECT p.value, COUNT(*)
             FROM trials t, json_each(t.phase) p
             GROUP BY p.value",
          )?
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, earliest, latest, statuses, phases))
      })
      .await?;

    let to_map = |rows: Grouped| -> BTreeMap<String, u64> {
      rows.into_iter().map(|(k, n)| (k, n.max(0) as u64)).collect()
    };

    Ok(CatalogStats {
      total_trials:  total.max(0) as u64,
      earliest:      earliest.as_deref().map(decode_date).transpose()?,
      latest:        latest.as_deref().map(decode_date).transpose()?,
      status_counts: to_map(statuses),
      phase_counts:  to_map(phases),
    })
  }

  // ── Matches: append-only ──────────────────────────────────────────────────

  async fn match_exists(&self, user_id: &str, nct_id: &str) -> Result<bool> {
    let user = user_id.to_owned();
    let nct  = nct_id.to_owned();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM matches WHERE user_id = ?1 AND nct_id = ?2",
              rusqlite::params![user, nct],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn insert_match(&self, record: &MatchRecord) -> Result<bool> {
    let user    = record.user_id.clone();
    let nct     = record.nct_id.clone();
    let score   = record.compatibility_score.value();
    let reasons = encode_list(&record.reasons)?;
    let at_str  = encode_dt(record.timestamp);

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT OR IGNORE INTO matches (user_id, nct_id, compatibility_score, reasons, timestamp)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![user, nct, score, reasons, at_str],
        )?;
        Ok(n == 1)
      })
      .await?;
    Ok(inserted)
  }

  async fn list_matches(
    &self,
    user_id: &str,
    offset: u64,
    limit: u64,
  ) -> Result<Vec<MatchRecord>> {
    let user       = user_id.to_owned();
    let offset_val = i64::try_from(offset).unwrap_or(i64::MAX);
    let limit_val  = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawMatch> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MATCH_COLUMNS} FROM matches
           WHERE user_id = ?1
           ORDER BY timestamp DESC, nct_id ASC
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user, limit_val, offset_val], RawMatch::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMatch::into_match).collect()
  }

  async fn count_matches(&self, user_id: &str) -> Result<u64> {
    let user = user_id.to_owned();
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM matches WHERE user_id = ?1",
          rusqlite::params![user],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(n.max(0) as u64)
  }
}

// ─── PatientDirectory impl ───────────────────────────────────────────────────

impl PatientDirectory for SqliteStore {
  async fn get_by_user_id(&self, user_id: &str) -> Result<Option<PatientProfile>> {
    let user = user_id.to_owned();

    let raw: Option<RawPatient> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE user_id = ?1"),
            rusqlite::params![user],
            RawPatient::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPatient::into_patient).transpose()
  }

  async fn list_patients(&self) -> Result<Vec<PatientProfile>> {
    let raws: Vec<RawPatient> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY user_id"))?;
        let rows = stmt
          .query_map([], RawPatient::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPatient::into_patient).collect()
  }

  async fn record_notified(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
    let user   = user_id.to_owned();
    let at_str = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE patients SET last_notified = ?2 WHERE user_id = ?1",
          rusqlite::params![user, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CheckpointLog impl ──────────────────────────────────────────────────────

impl CheckpointLog for SqliteStore {
  async fn latest_checkpoint(&self) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT MAX(check_date) FROM checkpoints", [], |r| r.get(0))?)
      })
      .await?;

    raw.as_deref().map(decode_dt).transpose()
  }

  async fn append_checkpoint(&self, check_date: DateTime<Utc>) -> Result<()> {
    let at_str = encode_dt(check_date);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO checkpoints (check_date) VALUES (?1)",
          rusqlite::params![at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
