//! Voiding events and resolved ledger types.
//!
//! Adjustments are immutable. Correcting one means recording a [`Voiding`] in
//! a separate append-only table; an adjustment's status is computed at query
//! time by joining against it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  adjustment::SentenceAdjustment,
  calculator::ReleaseProjection,
  sentence::Sentence,
};

// ─── Voiding ─────────────────────────────────────────────────────────────────

/// Records that an adjustment was entered in error and no longer counts.
/// An adjustment can be voided at most once (enforced by a UNIQUE constraint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voiding {
  pub voiding_id:    Uuid,
  pub adjustment_id: Uuid,
  pub reason:        Option<String>,
  pub recorded_at:   DateTime<Utc>,
}

// ─── Computed status ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdjustmentStatus {
  Active,
  Voided {
    reason: Option<String>,
    at:     DateTime<Utc>,
  },
}

impl AdjustmentStatus {
  pub fn is_active(&self) -> bool { matches!(self, Self::Active) }
}

/// An adjustment bundled with its current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAdjustment {
  pub adjustment: SentenceAdjustment,
  pub status:     AdjustmentStatus,
}

impl ResolvedAdjustment {
  /// Wrap a freshly recorded adjustment.
  pub fn active(adjustment: SentenceAdjustment) -> Self {
    Self { adjustment, status: AdjustmentStatus::Active }
  }
}

/// A sentence together with its full ledger: the unit the calculator and
/// the stack resolver consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceLedger {
  pub sentence:    Sentence,
  pub adjustments: Vec<ResolvedAdjustment>,
}

// ─── Materialised view ───────────────────────────────────────────────────────

/// The computed read model for a sentence; never stored, always derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceView {
  pub sentence:           Sentence,
  /// The civil date `days_remaining` was measured from.
  pub as_of:              NaiveDate,
  /// Active entries only, in ledger order.
  pub active_adjustments: Vec<ResolvedAdjustment>,
  pub projection:         ReleaseProjection,
}
