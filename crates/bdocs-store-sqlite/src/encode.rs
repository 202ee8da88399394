//! Encoding and decoding between domain types and SQLite column values.
//!
//! Civil dates are stored as `YYYY-MM-DD`, timestamps as fixed-width RFC 3339
//! UTC strings so they sort lexically, enums as their `SCREAMING_SNAKE_CASE`
//! names, and UUIDs as hyphenated lowercase strings.

use std::str::FromStr;

use bdocs_core::{
  adjustment::SentenceAdjustment,
  lifecycle::{AdjustmentStatus, ResolvedAdjustment},
  sentence::{Sentence, Stacking},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
  s.map(decode_date).transpose()
}

/// Enum discriminants go through their `strum` names.
pub fn encode_enum<T: Into<&'static str>>(value: T) -> &'static str {
  value.into()
}

pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::UnknownDiscriminant {
    column,
    value: s.to_owned(),
  })
}

// ─── Sentence rows ───────────────────────────────────────────────────────────

/// Column list matching [`RawSentence::from_row`]. Prefix-free so it can be
/// used in plain `SELECT ... FROM sentences` queries.
pub const SENTENCE_COLUMNS: &str = "sentence_id, inmate_id, court_case_id, \
   sentence_type, sentence_date, original_term_days, minimum_term_months, \
   life_sentence, is_death_sentence, start_date, time_served_days, \
   good_time_days, expected_release_date, actual_release_date, stacking_mode, \
   stacking_case_id, sentencing_judge, notes, created_at, \
   original_term_months";

/// Raw values read directly from a `sentences` row.
pub struct RawSentence {
  pub sentence_id:           String,
  pub inmate_id:             String,
  pub court_case_id:         String,
  pub sentence_type:         String,
  pub sentence_date:         String,
  pub original_term_days:    Option<i64>,
  pub original_term_months:  Option<u32>,
  pub minimum_term_months:   Option<u32>,
  pub life_sentence:         bool,
  pub is_death_sentence:     bool,
  pub start_date:            Option<String>,
  pub time_served_days:      i64,
  pub good_time_days:        i64,
  pub expected_release_date: Option<String>,
  pub actual_release_date:   Option<String>,
  pub stacking_mode:         Option<String>,
  pub stacking_case_id:      Option<String>,
  pub sentencing_judge:      Option<String>,
  pub notes:                 Option<String>,
  pub created_at:            String,
}

impl RawSentence {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sentence_id:           row.get(0)?,
      inmate_id:             row.get(1)?,
      court_case_id:         row.get(2)?,
      sentence_type:         row.get(3)?,
      sentence_date:         row.get(4)?,
      original_term_days:    row.get(5)?,
      minimum_term_months:   row.get(6)?,
      life_sentence:         row.get(7)?,
      is_death_sentence:     row.get(8)?,
      start_date:            row.get(9)?,
      time_served_days:      row.get(10)?,
      good_time_days:        row.get(11)?,
      expected_release_date: row.get(12)?,
      actual_release_date:   row.get(13)?,
      stacking_mode:         row.get(14)?,
      stacking_case_id:      row.get(15)?,
      sentencing_judge:      row.get(16)?,
      notes:                 row.get(17)?,
      created_at:            row.get(18)?,
      original_term_months:  row.get(19)?,
    })
  }

  pub fn decode(self) -> Result<Sentence> {
    let stacking = match (self.stacking_mode, self.stacking_case_id) {
      (Some(mode), Some(case)) => Some(Stacking {
        mode:      decode_enum("stacking_mode", &mode)?,
        with_case: decode_uuid(&case)?,
      }),
      _ => None,
    };

    Ok(Sentence {
      sentence_id: decode_uuid(&self.sentence_id)?,
      inmate_id: decode_uuid(&self.inmate_id)?,
      court_case_id: decode_uuid(&self.court_case_id)?,
      sentence_type: decode_enum("sentence_type", &self.sentence_type)?,
      sentence_date: decode_date(&self.sentence_date)?,
      original_term_days: self.original_term_days,
      original_term_months: self.original_term_months,
      minimum_term_months: self.minimum_term_months,
      life_sentence: self.life_sentence,
      is_death_sentence: self.is_death_sentence,
      start_date: decode_opt_date(self.start_date.as_deref())?,
      time_served_days: self.time_served_days,
      good_time_days: self.good_time_days,
      expected_release_date: decode_opt_date(
        self.expected_release_date.as_deref(),
      )?,
      actual_release_date: decode_opt_date(self.actual_release_date.as_deref())?,
      stacking,
      sentencing_judge: self.sentencing_judge,
      notes: self.notes,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Adjustment rows ─────────────────────────────────────────────────────────

/// Column list matching [`RawResolvedAdjustment::from_row`], for a query over
/// `sentence_adjustments a LEFT JOIN adjustment_voids v`.
pub const ADJUSTMENT_COLUMNS: &str = "a.adjustment_id, a.sentence_id, \
   a.adjustment_type, a.days, a.effective_date, a.reason, \
   a.document_reference, a.approved_by, a.recorded_at, v.voiding_id, \
   v.reason, v.recorded_at";

/// Raw values from a `sentence_adjustments` row joined with its voiding.
pub struct RawResolvedAdjustment {
  pub adjustment_id:      String,
  pub sentence_id:        String,
  pub adjustment_type:    String,
  pub days:               i64,
  pub effective_date:     String,
  pub reason:             String,
  pub document_reference: Option<String>,
  pub approved_by:        Option<String>,
  pub recorded_at:        String,
  // adjustment_voids columns
  pub voiding_id:         Option<String>,
  pub void_reason:        Option<String>,
  pub voided_at:          Option<String>,
}

impl RawResolvedAdjustment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      adjustment_id:      row.get(0)?,
      sentence_id:        row.get(1)?,
      adjustment_type:    row.get(2)?,
      days:               row.get(3)?,
      effective_date:     row.get(4)?,
      reason:             row.get(5)?,
      document_reference: row.get(6)?,
      approved_by:        row.get(7)?,
      recorded_at:        row.get(8)?,
      voiding_id:         row.get(9)?,
      void_reason:        row.get(10)?,
      voided_at:          row.get(11)?,
    })
  }

  pub fn decode(self) -> Result<ResolvedAdjustment> {
    let status = match (self.voiding_id, self.voided_at) {
      (Some(_), Some(at)) => AdjustmentStatus::Voided {
        reason: self.void_reason,
        at:     decode_dt(&at)?,
      },
      _ => AdjustmentStatus::Active,
    };

    Ok(ResolvedAdjustment {
      adjustment: SentenceAdjustment {
        adjustment_id:      decode_uuid(&self.adjustment_id)?,
        sentence_id:        decode_uuid(&self.sentence_id)?,
        adjustment_type:    decode_enum(
          "adjustment_type",
          &self.adjustment_type,
        )?,
        days:               self.days,
        effective_date:     decode_date(&self.effective_date)?,
        reason:             self.reason,
        document_reference: self.document_reference,
        approved_by:        self.approved_by,
        recorded_at:        decode_dt(&self.recorded_at)?,
      },
      status,
    })
  }
}
