//! Release-date projection for a single sentence.
//!
//! Everything here is a pure function of the sentence, its ledger and the
//! civil date passed in as `today`. Nothing is read from the clock, so the same
//! inputs always produce the same projection.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::{
  Error, Result,
  adjustment::SentenceAdjustment,
  config::CalculatorConfig,
  error::InvalidInput,
  lifecycle::ResolvedAdjustment,
  sentence::{Sentence, TermLength},
};

// ─── Projection ──────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
  /// A concrete release date exists.
  Fixed,
  /// Life sentence, or a term whose clock cannot start yet.
  Indeterminate,
  /// Death sentence.
  Capital,
}

/// The computed release position of one sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseProjection {
  pub sentence_id:           Uuid,
  pub status:                ReleaseStatus,
  pub release_date:          Option<NaiveDate>,
  /// The start actually used; differs from the sentence's own start date when
  /// it runs consecutively after a sibling.
  pub effective_start_date:  Option<NaiveDate>,
  /// Start plus the full term, ignoring every adjustment.
  pub original_release_date: Option<NaiveDate>,
  pub effective_term_days:   Option<i64>,
  /// Raw sum of active ledger entries.
  pub total_adjustment_days: i64,
  /// Portion of the total actually applied after the remission cap.
  pub credited_days:         i64,
  /// Credit beyond the term. Dropped, never carried to another sentence.
  pub discarded_credit_days: i64,
  pub days_remaining:        Option<i64>,
  /// Earliest date a clemency petition could plausibly succeed on a life
  /// sentence with a minimum term. Not a release date.
  pub eligibility_date:      Option<NaiveDate>,
}

impl ReleaseProjection {
  fn open(sentence_id: Uuid, status: ReleaseStatus, total: i64) -> Self {
    Self {
      sentence_id,
      status,
      release_date: None,
      effective_start_date: None,
      original_release_date: None,
      effective_term_days: None,
      total_adjustment_days: total,
      credited_days: 0,
      discarded_credit_days: 0,
      days_remaining: None,
      eligibility_date: None,
    }
  }

  pub fn is_fixed(&self) -> bool { self.status == ReleaseStatus::Fixed }
}

/// The result of [`ReleaseCalculator::apply_adjustment`]: the ledger as it
/// would be after the append, and the projection it yields. Nothing is
/// persisted; that is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAdjustment {
  pub ledger:     Vec<ResolvedAdjustment>,
  pub projection: ReleaseProjection,
}

// ─── Calculator ──────────────────────────────────────────────────────────────

/// Stateless calculator parameterised only by policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseCalculator {
  config: CalculatorConfig,
}

impl ReleaseCalculator {
  pub fn new(config: CalculatorConfig) -> Self { Self { config } }

  pub fn config(&self) -> CalculatorConfig { self.config }

  /// Project the release date of `sentence` from its own start date.
  pub fn compute(
    &self,
    sentence: &Sentence,
    adjustments: &[ResolvedAdjustment],
    today: NaiveDate,
  ) -> Result<ReleaseProjection> {
    self.compute_from(sentence, adjustments, sentence.start_date, today)
  }

  /// Project with `start` in place of the sentence's nominal start date.
  pub(crate) fn compute_from(
    &self,
    sentence: &Sentence,
    adjustments: &[ResolvedAdjustment],
    start: Option<NaiveDate>,
    today: NaiveDate,
  ) -> Result<ReleaseProjection> {
    let id = sentence.sentence_id;
    sentence.check_flags()?;
    check_ownership(id, adjustments)?;

    let total =
      total_adjustment_days(adjustments).ok_or(InvalidInput::CreditOverflow(id))?;

    if sentence.is_capital() {
      return Ok(ReleaseProjection::open(id, ReleaseStatus::Capital, total));
    }

    if sentence.is_life() {
      let mut projection =
        ReleaseProjection::open(id, ReleaseStatus::Indeterminate, total);
      projection.effective_start_date = start;
      if let (Some(start), Some(months)) = (start, sentence.minimum_term_months)
      {
        let days = self
          .config
          .month_conversion
          .months_to_days(start, months)
          .ok_or(InvalidInput::DateOutOfRange(id))?;
        projection.eligibility_date = Some(add_days(id, start, days)?);
      }
      return Ok(projection);
    }

    let start = start.ok_or(InvalidInput::MissingStartDate(id))?;

    if !sentence.sentence_type.is_custodial() {
      // No custody to serve: the sentence is discharged the day it starts.
      return Ok(ReleaseProjection {
        release_date: Some(start),
        effective_start_date: Some(start),
        original_release_date: Some(start),
        effective_term_days: Some(0),
        days_remaining: Some(days_until(today, start)),
        ..ReleaseProjection::open(id, ReleaseStatus::Fixed, total)
      });
    }

    let term = self.term_for(sentence, start)?;

    let credited = match self.config.remission_cap.limit(term) {
      Some(limit) if total > limit => limit,
      _ => total,
    };
    let overflow = InvalidInput::CreditOverflow(id);
    let effective = term.checked_sub(credited).ok_or(overflow.clone())?.max(0);
    let discarded = credited.checked_sub(term).ok_or(overflow)?.max(0);

    let release = add_days(id, start, effective)?;
    Ok(ReleaseProjection {
      sentence_id:           id,
      status:                ReleaseStatus::Fixed,
      release_date:          Some(release),
      effective_start_date:  Some(start),
      original_release_date: Some(add_days(id, start, term)?),
      effective_term_days:   Some(effective),
      total_adjustment_days: total,
      credited_days:         credited - discarded,
      discarded_credit_days: discarded,
      days_remaining:        Some(days_until(today, release)),
      eligibility_date:      None,
    })
  }

  /// Project a sentence whose clock cannot start because the sentence it
  /// follows has no fixed release date.
  pub(crate) fn compute_blocked(
    &self,
    sentence: &Sentence,
    adjustments: &[ResolvedAdjustment],
  ) -> Result<ReleaseProjection> {
    let id = sentence.sentence_id;
    sentence.check_flags()?;
    check_ownership(id, adjustments)?;

    let status = if sentence.is_capital() {
      ReleaseStatus::Capital
    } else {
      ReleaseStatus::Indeterminate
    };
    let total =
      total_adjustment_days(adjustments).ok_or(InvalidInput::CreditOverflow(id))?;
    Ok(ReleaseProjection::open(id, status, total))
  }

  /// Validate `adjustment` against `sentence`, append it to a copy of
  /// `ledger` and project the result from the sentence's own start date.
  ///
  /// A consecutive sentence gets its start from the stack; use
  /// [`ReleaseCalculator::apply_adjustment_in_stack`] for those.
  pub fn apply_adjustment(
    &self,
    sentence: &Sentence,
    ledger: &[ResolvedAdjustment],
    adjustment: SentenceAdjustment,
    today: NaiveDate,
  ) -> Result<AppliedAdjustment> {
    self.check_adjustment(sentence, &adjustment, sentence.start_date)?;

    let mut ledger = ledger.to_vec();
    ledger.push(ResolvedAdjustment::active(adjustment));
    let projection = self.compute(sentence, &ledger, today)?;
    Ok(AppliedAdjustment { ledger, projection })
  }

  /// The checks an adjustment must pass before it may be appended, with
  /// `start` as the date the sentence's clock started. When no start is
  /// known the sentence date is the floor for the effective date.
  pub fn check_adjustment(
    &self,
    sentence: &Sentence,
    adjustment: &SentenceAdjustment,
    start: Option<NaiveDate>,
  ) -> Result<()> {
    if let Some(released_on) = sentence.actual_release_date {
      return Err(Error::AlreadyReleased {
        sentence_id: sentence.sentence_id,
        released_on,
      });
    }
    if adjustment.sentence_id != sentence.sentence_id {
      return Err(
        InvalidInput::ForeignAdjustment {
          adjustment_id: adjustment.adjustment_id,
          expected:      sentence.sentence_id,
          found:         adjustment.sentence_id,
        }
        .into(),
      );
    }
    if adjustment.days == 0 {
      return Err(InvalidInput::ZeroDays.into());
    }
    let start_date = start.unwrap_or(sentence.sentence_date);
    if adjustment.effective_date < start_date {
      return Err(
        InvalidInput::EffectiveBeforeStart {
          effective_date: adjustment.effective_date,
          start_date,
        }
        .into(),
      );
    }
    Ok(())
  }

  /// Term length in days for a clock starting on `start`. Month terms are
  /// converted from that date, not from the nominal one.
  fn term_for(
    &self,
    sentence: &Sentence,
    start: NaiveDate,
  ) -> Result<i64, InvalidInput> {
    let id = sentence.sentence_id;
    match sentence.original_term_months {
      Some(months) => self
        .config
        .month_conversion
        .months_to_days(start, months)
        .ok_or(InvalidInput::DateOutOfRange(id)),
      None => sentence.original_term_days.ok_or(InvalidInput::MissingTerm(id)),
    }
  }

  /// Convert a term as entered at sentencing into canonical days.
  pub fn term_days(&self, term: TermLength, start: NaiveDate) -> Option<i64> {
    match term {
      TermLength::Days(days) => Some(days),
      TermLength::Months(months) => {
        self.config.month_conversion.months_to_days(start, months)
      }
    }
  }
}

/// [`ReleaseCalculator::compute`] under the default policy.
pub fn compute_release_date(
  sentence: &Sentence,
  adjustments: &[ResolvedAdjustment],
  today: NaiveDate,
) -> Result<ReleaseProjection> {
  ReleaseCalculator::default().compute(sentence, adjustments, today)
}

/// [`ReleaseCalculator::apply_adjustment`] under the default policy.
pub fn apply_adjustment(
  sentence: &Sentence,
  ledger: &[ResolvedAdjustment],
  adjustment: SentenceAdjustment,
  today: NaiveDate,
) -> Result<AppliedAdjustment> {
  ReleaseCalculator::default().apply_adjustment(
    sentence, ledger, adjustment, today,
  )
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Sum of `days` over active entries. Voided entries never count. `None`
/// when the sum leaves the `i64` range.
pub fn total_adjustment_days(adjustments: &[ResolvedAdjustment]) -> Option<i64> {
  adjustments
    .iter()
    .filter(|ra| ra.status.is_active())
    .try_fold(0i64, |acc, ra| acc.checked_add(ra.adjustment.days))
}

fn check_ownership(
  sentence_id: Uuid,
  adjustments: &[ResolvedAdjustment],
) -> Result<(), InvalidInput> {
  match adjustments
    .iter()
    .find(|ra| ra.adjustment.sentence_id != sentence_id)
  {
    Some(ra) => Err(InvalidInput::ForeignAdjustment {
      adjustment_id: ra.adjustment.adjustment_id,
      expected:      sentence_id,
      found:         ra.adjustment.sentence_id,
    }),
    None => Ok(()),
  }
}

fn add_days(
  sentence_id: Uuid,
  date: NaiveDate,
  days: i64,
) -> Result<NaiveDate, InvalidInput> {
  u64::try_from(days)
    .ok()
    .and_then(|days| date.checked_add_days(Days::new(days)))
    .ok_or(InvalidInput::DateOutOfRange(sentence_id))
}

fn days_until(today: NaiveDate, date: NaiveDate) -> i64 {
  (date - today).num_days().max(0)
}
