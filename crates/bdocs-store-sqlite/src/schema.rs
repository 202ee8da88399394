//! SQL schema for the sentence store.
//!
//! Executed at connection startup; `PRAGMA user_version` records the layout
//! so later migrations can be gated on it.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Court-ordered fields are written once. Only the cached projection columns
-- (time_served_days, good_time_days, expected_release_date) and
-- actual_release_date are ever updated.
CREATE TABLE IF NOT EXISTS sentences (
    sentence_id           TEXT PRIMARY KEY,
    inmate_id             TEXT NOT NULL,
    court_case_id         TEXT NOT NULL,
    sentence_type         TEXT NOT NULL,   -- 'IMPRISONMENT' | 'LIFE' | ...
    sentence_date         TEXT NOT NULL,   -- YYYY-MM-DD
    original_term_days    INTEGER,
    original_term_months  INTEGER,         -- set when the court gave months
    minimum_term_months   INTEGER,
    life_sentence         INTEGER NOT NULL DEFAULT 0,
    is_death_sentence     INTEGER NOT NULL DEFAULT 0,
    start_date            TEXT,
    time_served_days      INTEGER NOT NULL DEFAULT 0,
    good_time_days        INTEGER NOT NULL DEFAULT 0,
    expected_release_date TEXT,
    actual_release_date   TEXT,
    stacking_mode         TEXT,            -- 'CONCURRENT' | 'CONSECUTIVE'
    stacking_case_id      TEXT,
    sentencing_judge      TEXT,
    notes                 TEXT,
    created_at            TEXT NOT NULL,   -- RFC 3339 UTC
    UNIQUE (inmate_id, court_case_id),
    CHECK  ((stacking_mode IS NULL) = (stacking_case_id IS NULL)),
    CHECK  (NOT (life_sentence AND is_death_sentence))
);

-- Strictly append-only. No UPDATE or DELETE is ever issued against it.
CREATE TABLE IF NOT EXISTS sentence_adjustments (
    adjustment_id      TEXT PRIMARY KEY,
    sentence_id        TEXT NOT NULL REFERENCES sentences(sentence_id),
    adjustment_type    TEXT NOT NULL,
    days               INTEGER NOT NULL CHECK (days != 0),
    effective_date     TEXT NOT NULL,
    reason             TEXT NOT NULL,
    document_reference TEXT,
    approved_by        TEXT,
    recorded_at        TEXT NOT NULL
);

-- An adjustment withdrawn from the ledger.
CREATE TABLE IF NOT EXISTS adjustment_voids (
    voiding_id    TEXT PRIMARY KEY,
    adjustment_id TEXT NOT NULL REFERENCES sentence_adjustments(adjustment_id),
    reason        TEXT,
    recorded_at   TEXT NOT NULL,
    UNIQUE (adjustment_id)
);

CREATE INDEX IF NOT EXISTS sentences_inmate_idx      ON sentences(inmate_id);
CREATE INDEX IF NOT EXISTS sentences_release_idx     ON sentences(expected_release_date);
CREATE INDEX IF NOT EXISTS adjustments_sentence_idx  ON sentence_adjustments(sentence_id);

PRAGMA user_version = 1;
";
