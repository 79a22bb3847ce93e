//! SQL schema for the trial-matching SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS trials (
    nct_id               TEXT PRIMARY KEY,
    brief_title          TEXT NOT NULL DEFAULT '',
    official_title       TEXT NOT NULL DEFAULT '',
    brief_summary        TEXT NOT NULL DEFAULT '',
    detailed_description TEXT NOT NULL DEFAULT '',
    status               TEXT NOT NULL DEFAULT '',
    phase                TEXT NOT NULL DEFAULT '[]',  -- JSON array
    conditions           TEXT NOT NULL DEFAULT '[]',  -- JSON array
    eligibility_criteria TEXT NOT NULL DEFAULT '',
    last_update_posted   TEXT NOT NULL,               -- YYYY-MM-DD
    analyzed_criteria    TEXT,                        -- JSON object or NULL
    content_hash         TEXT NOT NULL,               -- sha256 of ingest fields
    refreshed_at         TEXT NOT NULL                -- RFC 3339 UTC
);

-- Matches are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS matches (
    user_id             TEXT NOT NULL,
    nct_id              TEXT NOT NULL,
    compatibility_score REAL NOT NULL CHECK (compatibility_score BETWEEN 0 AND 100),
    reasons             TEXT NOT NULL DEFAULT '[]',   -- JSON array
    timestamp           TEXT NOT NULL,                -- RFC 3339 UTC
    PRIMARY KEY (user_id, nct_id)
);

CREATE TABLE IF NOT EXISTS patients (
    user_id                TEXT PRIMARY KEY,
    first_name             TEXT NOT NULL,
    last_name              TEXT NOT NULL,
    email                  TEXT,
    date_of_birth          TEXT NOT NULL,             -- YYYY-MM-DD
    gender                 TEXT NOT NULL DEFAULT 'other',
    medical_conditions     TEXT NOT NULL DEFAULT '[]',
    medications            TEXT NOT NULL DEFAULT '[]',
    ethnicity              TEXT,
    family_medical_history TEXT,
    last_notified          TEXT
);

-- Append-only log of proactive-search runs.
CREATE TABLE IF NOT EXISTS checkpoints (
    checkpoint_id INTEGER PRIMARY KEY AUTOINCREMENT,
    check_date    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS trials_updated_idx    ON trials(last_update_posted);
CREATE INDEX IF NOT EXISTS matches_timestamp_idx ON matches(user_id, timestamp);
CREATE INDEX IF NOT EXISTS checkpoints_date_idx  ON checkpoints(check_date);

PRAGMA user_version = 1;
";
