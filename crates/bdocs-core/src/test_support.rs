//! Builders shared by the unit tests in this crate.

use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::{
  adjustment::{AdjustmentType, SentenceAdjustment},
  lifecycle::{ResolvedAdjustment, SentenceLedger},
  sentence::{Sentence, SentenceType, Stacking, StackingMode},
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// An open imprisonment sentence of `term_days` starting on `start`.
pub fn fixed_sentence(term_days: i64, start: NaiveDate) -> Sentence {
  Sentence {
    sentence_id:           Uuid::new_v4(),
    inmate_id:             Uuid::nil(),
    court_case_id:         Uuid::new_v4(),
    sentence_type:         SentenceType::Imprisonment,
    sentence_date:         start,
    original_term_days:    Some(term_days),
    original_term_months:  None,
    minimum_term_months:   None,
    life_sentence:         false,
    is_death_sentence:     false,
    start_date:            Some(start),
    time_served_days:      0,
    good_time_days:        0,
    expected_release_date: None,
    actual_release_date:   None,
    stacking:              None,
    sentencing_judge:      None,
    notes:                 None,
    created_at:            Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
  }
}

pub fn adjustment(
  sentence: &Sentence,
  adjustment_type: AdjustmentType,
  days: i64,
  effective_date: NaiveDate,
) -> SentenceAdjustment {
  SentenceAdjustment {
    adjustment_id: Uuid::new_v4(),
    sentence_id: sentence.sentence_id,
    adjustment_type,
    days,
    effective_date,
    reason: format!("{adjustment_type} for test"),
    document_reference: None,
    approved_by: None,
    recorded_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
  }
}

/// An active ledger entry effective on the sentence's start date.
pub fn ledger_entry(
  sentence: &Sentence,
  adjustment_type: AdjustmentType,
  days: i64,
) -> ResolvedAdjustment {
  let effective = sentence.start_date.unwrap_or(sentence.sentence_date);
  ResolvedAdjustment::active(adjustment(
    sentence,
    adjustment_type,
    days,
    effective,
  ))
}

pub fn stacked(
  mut sentence: Sentence,
  mode: StackingMode,
  with: &Sentence,
) -> Sentence {
  sentence.stacking = Some(Stacking {
    mode,
    with_case: with.court_case_id,
  });
  sentence
}

pub fn bare(sentence: Sentence) -> SentenceLedger {
  SentenceLedger { sentence, adjustments: Vec::new() }
}
