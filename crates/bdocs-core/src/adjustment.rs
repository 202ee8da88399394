//! Sentence adjustments: the append-only credit ledger.
//!
//! An adjustment is an immutable record that moves a sentence's release date.
//! Adjustments are never updated; a mistaken entry is voided (see
//! [`crate::lifecycle`]) and, if needed, a corrected one appended.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

/// Why the days were credited or added.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AdjustmentType {
  /// Daily credit for conduct in custody.
  GoodTime,
  /// Statutory remission for good conduct.
  Remission,
  /// Pre-trial detention credited against the term.
  TimeServedCredit,
  /// Prerogative of Mercy.
  ClemencyReduction,
  /// Appeal outcome or other court-ordered change.
  CourtModification,
}

/// One ledger entry. Positive `days` shorten the term; negative `days`
/// lengthen it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceAdjustment {
  pub adjustment_id:      Uuid,
  pub sentence_id:        Uuid,
  pub adjustment_type:    AdjustmentType,
  pub days:               i64,
  pub effective_date:     NaiveDate,
  /// Audit text only; never affects the computation.
  pub reason:             String,
  pub document_reference: Option<String>,
  pub approved_by:        Option<String>,
  /// Server-assigned; never changes after creation.
  pub recorded_at:        DateTime<Utc>,
}

/// Input to [`crate::store::SentenceStore::record_adjustment`].
/// `adjustment_id` and `recorded_at` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewAdjustment {
  pub sentence_id:        Uuid,
  pub adjustment_type:    AdjustmentType,
  pub days:               i64,
  pub effective_date:     NaiveDate,
  pub reason:             String,
  pub document_reference: Option<String>,
  pub approved_by:        Option<String>,
}

impl NewAdjustment {
  pub fn new(
    sentence_id: Uuid,
    adjustment_type: AdjustmentType,
    days: i64,
    effective_date: NaiveDate,
    reason: impl Into<String>,
  ) -> Self {
    Self {
      sentence_id,
      adjustment_type,
      days,
      effective_date,
      reason: reason.into(),
      document_reference: None,
      approved_by: None,
    }
  }

  /// Stamp the entry with an identity and recording time.
  pub fn into_adjustment(
    self,
    adjustment_id: Uuid,
    recorded_at: DateTime<Utc>,
  ) -> SentenceAdjustment {
    SentenceAdjustment {
      adjustment_id,
      sentence_id: self.sentence_id,
      adjustment_type: self.adjustment_type,
      days: self.days,
      effective_date: self.effective_date,
      reason: self.reason,
      document_reference: self.document_reference,
      approved_by: self.approved_by,
      recorded_at,
    }
  }
}
