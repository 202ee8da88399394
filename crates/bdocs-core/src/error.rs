//! Error types for `bdocs-core`.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid input: {0}")]
  InvalidInput(#[from] InvalidInput),

  #[error("sentence {sentence_id} was already released on {released_on}")]
  AlreadyReleased {
    sentence_id: Uuid,
    released_on: NaiveDate,
  },

  #[error("sentence not found: {0}")]
  SentenceNotFound(Uuid),

  #[error("adjustment not found: {0}")]
  AdjustmentNotFound(Uuid),

  #[error("adjustment {0} is already voided")]
  AlreadyVoided(Uuid),
}

/// Malformed or contradictory sentence and ledger data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
  #[error("sentence {0} has a fixed term but no start date")]
  MissingStartDate(Uuid),

  #[error("sentence {0} is an imprisonment term without a term length")]
  MissingTerm(Uuid),

  #[error("sentence {sentence_id} has a negative term of {days} days")]
  NegativeTerm { sentence_id: Uuid, days: i64 },

  #[error("sentence {0} cannot be both a life and a death sentence")]
  LifeAndDeath(Uuid),

  #[error(
    "adjustment {adjustment_id} belongs to sentence {found}, not {expected}"
  )]
  ForeignAdjustment {
    adjustment_id: Uuid,
    expected:      Uuid,
    found:         Uuid,
  },

  #[error("adjustment days must be non-zero")]
  ZeroDays,

  #[error("adjustment days on sentence {0} exceed the representable range")]
  CreditOverflow(Uuid),

  #[error("combined terms for inmate {0} exceed the representable range")]
  TermOverflow(Uuid),

  #[error("pre-trial custody cannot be negative, got {0} days")]
  NegativeTimeServed(i64),

  #[error(
    "adjustment effective {effective_date} precedes sentence start {start_date}"
  )]
  EffectiveBeforeStart {
    effective_date: NaiveDate,
    start_date:     NaiveDate,
  },

  #[error("stacking chain contains a cycle through sentences {0:?}")]
  StackingCycle(Vec<Uuid>),

  #[error(
    "sentence {sentence_id} is stacked with court case {case_id}, which has \
     no sentence in this set"
  )]
  UnknownStackingCase { sentence_id: Uuid, case_id: Uuid },

  #[error("court case {0} appears on more than one sentence")]
  DuplicateCase(Uuid),

  #[error("sentence {sentence_id} belongs to an inmate other than {inmate_id}")]
  ForeignSentence { sentence_id: Uuid, inmate_id: Uuid },

  #[error("sentence {0} appears more than once")]
  DuplicateSentence(Uuid),

  #[error("release date for sentence {0} is outside the supported range")]
  DateOutOfRange(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
