//! The `SentenceStore` trait.
//!
//! Storage backends (e.g. `bdocs-store-sqlite`) implement it; the `bdocs`
//! binary depends on this abstraction rather than a concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  adjustment::{NewAdjustment, SentenceAdjustment},
  calculator::ReleaseProjection,
  lifecycle::{ResolvedAdjustment, SentenceLedger, SentenceView, Voiding},
  sentence::{NewSentence, Sentence},
};

/// Abstraction over a sentence store backend.
///
/// Adjustments are append-only. Corrections are expressed as voidings, which
/// are themselves append-only. The cached fields on [`Sentence`]
/// (`time_served_days`, `good_time_days`, `expected_release_date`) are
/// rewritten from the ledger after every write and are never edited directly.
pub trait SentenceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Sentences ─────────────────────────────────────────────────────────

  /// Persist a new sentence.
  ///
  /// The sentence is validated as part of its inmate's full stack, so a
  /// stacking reference must name a court case that already has a sentence
  /// for the same inmate. Pre-trial `time_served_days` is recorded as a
  /// `TIME_SERVED_CREDIT` ledger entry.
  fn add_sentence(
    &self,
    input: NewSentence,
  ) -> impl Future<Output = Result<Sentence, Self::Error>> + Send + '_;

  fn get_sentence(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Sentence>, Self::Error>> + Send + '_;

  /// List sentences, optionally restricted to one inmate, oldest first.
  fn list_sentences(
    &self,
    inmate_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Sentence>, Self::Error>> + Send + '_;

  /// The inmate's unreleased sentence with the latest start date, if any.
  fn current_sentence(
    &self,
    inmate_id: Uuid,
  ) -> impl Future<Output = Result<Option<Sentence>, Self::Error>> + Send + '_;

  /// Mark a sentence as released. Allowed exactly once.
  fn record_release(
    &self,
    sentence_id: Uuid,
    released_on: NaiveDate,
  ) -> impl Future<Output = Result<Sentence, Self::Error>> + Send + '_;

  // ── Ledger writes ─────────────────────────────────────────────────────

  /// Validate and append an adjustment, returning the persisted entry and the
  /// sentence's refreshed projection. Nothing is written when validation
  /// fails.
  fn record_adjustment(
    &self,
    input: NewAdjustment,
    today: NaiveDate,
  ) -> impl Future<
    Output = Result<(SentenceAdjustment, ReleaseProjection), Self::Error>,
  > + Send
  + '_;

  /// Void an adjustment. Rejected when it is already voided or its sentence
  /// has been released.
  fn void_adjustment(
    &self,
    adjustment_id: Uuid,
    reason: Option<String>,
  ) -> impl Future<Output = Result<Voiding, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The ledger of one sentence ordered by effective date, then by recording
  /// time.
  fn get_adjustments(
    &self,
    sentence_id: Uuid,
    include_voided: bool,
  ) -> impl Future<Output = Result<Vec<ResolvedAdjustment>, Self::Error>>
  + Send
  + '_;

  /// Materialise a [`SentenceView`] with a stack-aware projection. Returns
  /// `None` if the sentence does not exist.
  fn materialize(
    &self,
    sentence_id: Uuid,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Option<SentenceView>, Self::Error>> + Send + '_;

  /// Every sentence of one inmate together with its full ledger.
  fn inmate_ledgers(
    &self,
    inmate_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SentenceLedger>, Self::Error>> + Send + '_;

  /// Ledgers for every inmate who still has an open sentence. All of such an
  /// inmate's sentences are included so stacking can be resolved.
  fn open_ledgers(
    &self,
  ) -> impl Future<Output = Result<Vec<SentenceLedger>, Self::Error>> + Send + '_;
}
