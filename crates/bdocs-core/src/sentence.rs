//! A sentence is the term imposed by a court, and the clock it starts.
//!
//! A sentence carries only what the court ordered plus a few cached
//! projections. Everything that moves the release date lives in the
//! adjustment ledger (see [`crate::adjustment`]).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::error::InvalidInput;

// ─── Sentence type ───────────────────────────────────────────────────────────

/// The kind of sentence imposed. Stored and printed in the same
/// `SCREAMING_SNAKE_CASE` form the court records use.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum SentenceType {
  Imprisonment,
  Life,
  Death,
  Suspended,
  TimeServed,
  Probation,
  Fine,
}

impl SentenceType {
  /// Whether this type keeps the inmate in custody for a term.
  pub fn is_custodial(self) -> bool {
    matches!(self, Self::Imprisonment | Self::Life | Self::Death)
  }
}

// ─── Stacking ────────────────────────────────────────────────────────────────

/// How a sentence runs relative to a sibling sentence.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum StackingMode {
  /// Served at the same time as the sibling; the longer one governs.
  Concurrent,
  /// Clock starts only once the sibling's term has been served.
  Consecutive,
}

/// A link from one sentence to the sentence imposed in another court case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stacking {
  pub mode:      StackingMode,
  /// `court_case_id` of the sibling sentence.
  pub with_case: Uuid,
}

// ─── Sentence ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
  pub sentence_id:           Uuid,
  pub inmate_id:             Uuid,
  pub court_case_id:         Uuid,
  pub sentence_type:         SentenceType,
  /// Date the court imposed the sentence; may differ from `start_date`.
  pub sentence_date:         NaiveDate,
  /// `None` for life, death and non-term sentences. Converted from the
  /// nominal start when the term was given in months.
  pub original_term_days:    Option<i64>,
  /// Set when the court gave the term in months. The calculator converts it
  /// again from the start actually used, which differs for consecutive
  /// sentences.
  pub original_term_months:  Option<u32>,
  /// Minimum term for life sentences; only informs the eligibility date.
  pub minimum_term_months:   Option<u32>,
  pub life_sentence:         bool,
  pub is_death_sentence:     bool,
  pub start_date:            Option<NaiveDate>,
  /// Cached projection of `TIME_SERVED_CREDIT` ledger entries.
  pub time_served_days:      i64,
  /// Cached projection of `GOOD_TIME` ledger entries.
  pub good_time_days:        i64,
  /// Cached projection of the last computed release date.
  pub expected_release_date: Option<NaiveDate>,
  /// Set exactly once, when the inmate actually leaves custody.
  pub actual_release_date:   Option<NaiveDate>,
  pub stacking:              Option<Stacking>,
  pub sentencing_judge:      Option<String>,
  pub notes:                 Option<String>,
  pub created_at:            DateTime<Utc>,
}

impl Sentence {
  /// A death sentence, by type or by flag.
  pub fn is_capital(&self) -> bool {
    self.sentence_type == SentenceType::Death || self.is_death_sentence
  }

  /// A life sentence, by type or by flag.
  pub fn is_life(&self) -> bool {
    self.sentence_type == SentenceType::Life || self.life_sentence
  }

  pub fn is_released(&self) -> bool { self.actual_release_date.is_some() }

  /// Reject flag combinations the court could not have ordered.
  pub fn check_flags(&self) -> Result<(), InvalidInput> {
    if self.is_capital() && self.is_life() {
      return Err(InvalidInput::LifeAndDeath(self.sentence_id));
    }
    if let Some(days) = self.original_term_days
      && days < 0
    {
      return Err(InvalidInput::NegativeTerm {
        sentence_id: self.sentence_id,
        days,
      });
    }
    Ok(())
  }
}

// ─── NewSentence ─────────────────────────────────────────────────────────────

/// A term length as entered at sentencing. Months are converted to days once,
/// at the boundary, using [`crate::config::MonthConversion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum TermLength {
  Days(i64),
  Months(u32),
}

/// Input to [`crate::store::SentenceStore::add_sentence`].
/// `sentence_id`, `created_at` and every cached projection are set by the
/// store.
#[derive(Debug, Clone)]
pub struct NewSentence {
  pub inmate_id:           Uuid,
  pub court_case_id:       Uuid,
  pub sentence_type:       SentenceType,
  pub sentence_date:       NaiveDate,
  pub term:                Option<TermLength>,
  pub minimum_term_months: Option<u32>,
  pub start_date:          Option<NaiveDate>,
  /// Pre-trial detention; recorded as a `TIME_SERVED_CREDIT` ledger entry.
  pub time_served_days:    i64,
  pub stacking:            Option<Stacking>,
  pub sentencing_judge:    Option<String>,
  pub notes:               Option<String>,
}

impl NewSentence {
  /// Convenience constructor with all optional fields empty.
  pub fn new(
    inmate_id: Uuid,
    court_case_id: Uuid,
    sentence_type: SentenceType,
    sentence_date: NaiveDate,
  ) -> Self {
    Self {
      inmate_id,
      court_case_id,
      sentence_type,
      sentence_date,
      term: None,
      minimum_term_months: None,
      start_date: Some(sentence_date),
      time_served_days: 0,
      stacking: None,
      sentencing_judge: None,
      notes: None,
    }
  }
}
