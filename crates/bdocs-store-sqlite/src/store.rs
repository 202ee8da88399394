//! [`SqliteStore`]: the SQLite implementation of [`SentenceStore`].

use std::path::Path;

use bdocs_core::{
  InvalidInput, ReleaseCalculator, ReleaseProjection,
  adjustment::{AdjustmentType, NewAdjustment, SentenceAdjustment},
  lifecycle::{ResolvedAdjustment, SentenceLedger, SentenceView, Voiding},
  sentence::{NewSentence, Sentence, SentenceType, TermLength},
  stack::StackProjection,
  store::SentenceStore,
  summary::CreditCounters,
};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ADJUSTMENT_COLUMNS, RawResolvedAdjustment, RawSentence, SENTENCE_COLUMNS,
    decode_uuid, encode_date, encode_dt, encode_enum, encode_uuid,
  },
  schema::SCHEMA,
};

/// Reason recorded on the ledger entry created for pre-trial custody.
const PRE_TRIAL_REASON: &str = "pre-trial custody credited at sentencing";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A sentence store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  calculator: ReleaseCalculator,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(
    path: impl AsRef<Path>,
    calculator: ReleaseCalculator,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, calculator };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory(calculator: ReleaseCalculator) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, calculator };
    store.init_schema().await?;
    Ok(store)
  }

  pub fn calculator(&self) -> ReleaseCalculator { self.calculator }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── SentenceStore impl ──────────────────────────────────────────────────────

impl SentenceStore for SqliteStore {
  type Error = crate::Error;

  // ── Sentences ─────────────────────────────────────────────────────────────

  async fn add_sentence(&self, input: NewSentence) -> Result<Sentence> {
    let calculator = self.calculator;
    let inmate_id = input.inmate_id;
    let result = self
      .conn
      .call(move |conn| Ok(create_sentence(conn, calculator, input)))
      .await?;

    match &result {
      Ok(s) => tracing::info!(
        sentence_id = %s.sentence_id,
        inmate_id = %s.inmate_id,
        sentence_type = %s.sentence_type,
        expected_release = ?s.expected_release_date,
        "sentence recorded"
      ),
      Err(e) => tracing::warn!(%inmate_id, error = %e, "sentence rejected"),
    }
    result
  }

  async fn get_sentence(&self, id: Uuid) -> Result<Option<Sentence>> {
    self
      .conn
      .call(move |conn| Ok(load_sentence(conn, id)))
      .await?
  }

  async fn list_sentences(
    &self,
    inmate_id: Option<Uuid>,
  ) -> Result<Vec<Sentence>> {
    self
      .conn
      .call(move |conn| Ok(load_sentences(conn, inmate_id)))
      .await?
  }

  async fn current_sentence(&self, inmate_id: Uuid) -> Result<Option<Sentence>> {
    self
      .conn
      .call(move |conn| Ok(load_current_sentence(conn, inmate_id)))
      .await?
  }

  async fn record_release(
    &self,
    sentence_id: Uuid,
    released_on: NaiveDate,
  ) -> Result<Sentence> {
    let result = self
      .conn
      .call(move |conn| Ok(release_sentence(conn, sentence_id, released_on)))
      .await?;

    match &result {
      Ok(_) => tracing::info!(%sentence_id, %released_on, "release recorded"),
      Err(e) => tracing::warn!(%sentence_id, error = %e, "release rejected"),
    }
    result
  }

  // ── Ledger writes ─────────────────────────────────────────────────────────

  async fn record_adjustment(
    &self,
    input: NewAdjustment,
    today: NaiveDate,
  ) -> Result<(SentenceAdjustment, ReleaseProjection)> {
    let calculator = self.calculator;
    let sentence_id = input.sentence_id;
    let result = self
      .conn
      .call(move |conn| Ok(append_adjustment(conn, calculator, input, today)))
      .await?;

    match &result {
      Ok((adj, projection)) => tracing::info!(
        %sentence_id,
        adjustment_id = %adj.adjustment_id,
        adjustment_type = %adj.adjustment_type,
        days = adj.days,
        release = ?projection.release_date,
        "adjustment recorded"
      ),
      Err(e) => tracing::warn!(%sentence_id, error = %e, "adjustment rejected"),
    }
    result
  }

  async fn void_adjustment(
    &self,
    adjustment_id: Uuid,
    reason: Option<String>,
  ) -> Result<Voiding> {
    let calculator = self.calculator;
    let result = self
      .conn
      .call(move |conn| Ok(void(conn, calculator, adjustment_id, reason)))
      .await?;

    match &result {
      Ok(v) => tracing::info!(
        %adjustment_id,
        voiding_id = %v.voiding_id,
        "adjustment voided"
      ),
      Err(e) => tracing::warn!(%adjustment_id, error = %e, "voiding rejected"),
    }
    result
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_adjustments(
    &self,
    sentence_id: Uuid,
    include_voided: bool,
  ) -> Result<Vec<ResolvedAdjustment>> {
    self
      .conn
      .call(move |conn| {
        Ok(load_adjustments(conn, sentence_id, include_voided))
      })
      .await?
  }

  async fn materialize(
    &self,
    sentence_id: Uuid,
    today: NaiveDate,
  ) -> Result<Option<SentenceView>> {
    let calculator = self.calculator;
    self
      .conn
      .call(move |conn| Ok(view(conn, calculator, sentence_id, today)))
      .await?
  }

  async fn inmate_ledgers(&self, inmate_id: Uuid) -> Result<Vec<SentenceLedger>> {
    self
      .conn
      .call(move |conn| Ok(load_inmate_ledgers(conn, inmate_id)))
      .await?
  }

  async fn open_ledgers(&self) -> Result<Vec<SentenceLedger>> {
    self.conn.call(|conn| Ok(load_open_ledgers(conn))).await?
  }
}

// ─── Write paths ─────────────────────────────────────────────────────────────
//
// Each runs on the connection thread inside one transaction. Returning early
// with an error drops the transaction, which rolls it back.

fn create_sentence(
  conn: &mut Connection,
  calculator: ReleaseCalculator,
  input: NewSentence,
) -> Result<Sentence> {
  if input.time_served_days < 0 {
    return Err(InvalidInput::NegativeTimeServed(input.time_served_days).into());
  }

  let sentence_id = Uuid::new_v4();
  let created_at = Utc::now();
  let clock_start = input.start_date.unwrap_or(input.sentence_date);

  let original_term_days = input
    .term
    .map(|term| {
      calculator
        .term_days(term, clock_start)
        .ok_or(InvalidInput::DateOutOfRange(sentence_id))
    })
    .transpose()?;

  let sentence = Sentence {
    sentence_id,
    inmate_id: input.inmate_id,
    court_case_id: input.court_case_id,
    sentence_type: input.sentence_type,
    sentence_date: input.sentence_date,
    original_term_days,
    original_term_months: match input.term {
      Some(TermLength::Months(months)) => Some(months),
      _ => None,
    },
    minimum_term_months: input.minimum_term_months,
    life_sentence: input.sentence_type == SentenceType::Life,
    is_death_sentence: input.sentence_type == SentenceType::Death,
    start_date: input.start_date,
    time_served_days: 0,
    good_time_days: 0,
    expected_release_date: None,
    actual_release_date: None,
    stacking: input.stacking,
    sentencing_judge: input.sentencing_judge,
    notes: input.notes,
    created_at,
  };

  let tx = conn.transaction()?;
  insert_sentence(&tx, &sentence)?;

  if input.time_served_days > 0 {
    let credit = NewAdjustment::new(
      sentence_id,
      AdjustmentType::TimeServedCredit,
      input.time_served_days,
      clock_start,
      PRE_TRIAL_REASON,
    )
    .into_adjustment(Uuid::new_v4(), created_at);
    insert_adjustment(&tx, &credit)?;
  }

  refresh_inmate(&tx, calculator, sentence.inmate_id, created_at.date_naive())?;
  let stored = require_sentence(&tx, sentence_id)?;
  tx.commit()?;
  Ok(stored)
}

fn append_adjustment(
  conn: &mut Connection,
  calculator: ReleaseCalculator,
  input: NewAdjustment,
  today: NaiveDate,
) -> Result<(SentenceAdjustment, ReleaseProjection)> {
  let tx = conn.transaction()?;

  let sentence = require_sentence(&tx, input.sentence_id)?;
  let ledgers = load_inmate_ledgers(&tx, sentence.inmate_id)?;
  let adjustment = input.into_adjustment(Uuid::new_v4(), Utc::now());

  // Validated where the sentence sits in its stack, so a consecutive
  // sentence is checked against its predecessor's release.
  calculator.apply_adjustment_in_stack(&ledgers, adjustment.clone(), today)?;

  insert_adjustment(&tx, &adjustment)?;
  let stack = refresh_inmate(&tx, calculator, sentence.inmate_id, today)?;
  let projection = stack
    .projection(sentence.sentence_id)
    .cloned()
    .ok_or(bdocs_core::Error::SentenceNotFound(sentence.sentence_id))?;

  tx.commit()?;
  Ok((adjustment, projection))
}

fn void(
  conn: &mut Connection,
  calculator: ReleaseCalculator,
  adjustment_id: Uuid,
  reason: Option<String>,
) -> Result<Voiding> {
  let tx = conn.transaction()?;
  let id_str = encode_uuid(adjustment_id);

  let found: Option<(String, Option<String>)> = tx
    .query_row(
      "SELECT a.sentence_id, v.voiding_id
       FROM sentence_adjustments a
       LEFT JOIN adjustment_voids v ON v.adjustment_id = a.adjustment_id
       WHERE a.adjustment_id = ?1",
      rusqlite::params![id_str],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;

  let (sentence_id, existing) =
    found.ok_or(bdocs_core::Error::AdjustmentNotFound(adjustment_id))?;
  if existing.is_some() {
    return Err(bdocs_core::Error::AlreadyVoided(adjustment_id).into());
  }

  let sentence = require_sentence(&tx, decode_uuid(&sentence_id)?)?;
  if let Some(released_on) = sentence.actual_release_date {
    return Err(
      bdocs_core::Error::AlreadyReleased {
        sentence_id: sentence.sentence_id,
        released_on,
      }
      .into(),
    );
  }

  let voiding = Voiding {
    voiding_id: Uuid::new_v4(),
    adjustment_id,
    reason,
    recorded_at: Utc::now(),
  };
  tx.execute(
    "INSERT INTO adjustment_voids (voiding_id, adjustment_id, reason, recorded_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      encode_uuid(voiding.voiding_id),
      id_str,
      voiding.reason,
      encode_dt(voiding.recorded_at),
    ],
  )?;

  refresh_inmate(
    &tx,
    calculator,
    sentence.inmate_id,
    voiding.recorded_at.date_naive(),
  )?;
  tx.commit()?;
  Ok(voiding)
}

fn release_sentence(
  conn: &mut Connection,
  sentence_id: Uuid,
  released_on: NaiveDate,
) -> Result<Sentence> {
  let tx = conn.transaction()?;
  let sentence = require_sentence(&tx, sentence_id)?;
  if let Some(previous) = sentence.actual_release_date {
    return Err(
      bdocs_core::Error::AlreadyReleased {
        sentence_id,
        released_on: previous,
      }
      .into(),
    );
  }

  tx.execute(
    "UPDATE sentences SET actual_release_date = ?2
     WHERE sentence_id = ?1 AND actual_release_date IS NULL",
    rusqlite::params![encode_uuid(sentence_id), encode_date(released_on)],
  )?;
  let stored = require_sentence(&tx, sentence_id)?;
  tx.commit()?;
  Ok(stored)
}

/// Recompute the stack for one inmate and rewrite every cached projection
/// column from it. Fails, and so aborts the surrounding transaction, when the
/// inmate's sentences no longer resolve.
fn refresh_inmate(
  conn: &Connection,
  calculator: ReleaseCalculator,
  inmate_id: Uuid,
  today: NaiveDate,
) -> Result<StackProjection> {
  let ledgers = load_inmate_ledgers(conn, inmate_id)?;
  let stack = calculator.compute_stack(&ledgers, today)?;

  let mut update = conn.prepare(
    "UPDATE sentences
     SET time_served_days = ?2, good_time_days = ?3, expected_release_date = ?4
     WHERE sentence_id = ?1",
  )?;
  for (ledger, projection) in ledgers.iter().zip(&stack.projections) {
    let counters = CreditCounters::from_ledger(&ledger.adjustments)?;
    let expected = projection
      .is_fixed()
      .then_some(projection.release_date)
      .flatten()
      .map(encode_date);
    update.execute(rusqlite::params![
      encode_uuid(ledger.sentence.sentence_id),
      counters.time_served_days,
      counters.good_time_days,
      expected,
    ])?;
  }

  Ok(stack)
}

fn insert_sentence(conn: &Connection, s: &Sentence) -> Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO sentences ({SENTENCE_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
               ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
    ),
    rusqlite::params![
      encode_uuid(s.sentence_id),
      encode_uuid(s.inmate_id),
      encode_uuid(s.court_case_id),
      encode_enum(s.sentence_type),
      encode_date(s.sentence_date),
      s.original_term_days,
      s.minimum_term_months,
      s.life_sentence,
      s.is_death_sentence,
      s.start_date.map(encode_date),
      s.time_served_days,
      s.good_time_days,
      s.expected_release_date.map(encode_date),
      s.actual_release_date.map(encode_date),
      s.stacking.map(|st| encode_enum(st.mode)),
      s.stacking.map(|st| encode_uuid(st.with_case)),
      s.sentencing_judge,
      s.notes,
      encode_dt(s.created_at),
      s.original_term_months,
    ],
  )?;
  Ok(())
}

fn insert_adjustment(conn: &Connection, a: &SentenceAdjustment) -> Result<()> {
  conn.execute(
    "INSERT INTO sentence_adjustments (
       adjustment_id, sentence_id, adjustment_type, days, effective_date,
       reason, document_reference, approved_by, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      encode_uuid(a.adjustment_id),
      encode_uuid(a.sentence_id),
      encode_enum(a.adjustment_type),
      a.days,
      encode_date(a.effective_date),
      a.reason,
      a.document_reference,
      a.approved_by,
      encode_dt(a.recorded_at),
    ],
  )?;
  Ok(())
}

// ─── Read paths ──────────────────────────────────────────────────────────────

fn load_sentence(conn: &Connection, id: Uuid) -> Result<Option<Sentence>> {
  conn
    .query_row(
      &format!("SELECT {SENTENCE_COLUMNS} FROM sentences WHERE sentence_id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawSentence::from_row,
    )
    .optional()?
    .map(RawSentence::decode)
    .transpose()
}

fn require_sentence(conn: &Connection, id: Uuid) -> Result<Sentence> {
  load_sentence(conn, id)?
    .ok_or_else(|| bdocs_core::Error::SentenceNotFound(id).into())
}

fn load_sentences(
  conn: &Connection,
  inmate_id: Option<Uuid>,
) -> Result<Vec<Sentence>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {SENTENCE_COLUMNS} FROM sentences
     WHERE ?1 IS NULL OR inmate_id = ?1
     ORDER BY sentence_date, created_at, rowid"
  ))?;
  let raws = stmt
    .query_map(
      rusqlite::params![inmate_id.map(encode_uuid)],
      RawSentence::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSentence::decode).collect()
}

/// A sentence without a start date ranks by its sentence date. Ties go to
/// the later sentencing, then the later insert.
fn load_current_sentence(
  conn: &Connection,
  inmate_id: Uuid,
) -> Result<Option<Sentence>> {
  conn
    .query_row(
      &format!(
        "SELECT {SENTENCE_COLUMNS} FROM sentences
         WHERE inmate_id = ?1 AND actual_release_date IS NULL
         ORDER BY COALESCE(start_date, sentence_date) DESC, sentence_date DESC,
                  rowid DESC
         LIMIT 1"
      ),
      rusqlite::params![encode_uuid(inmate_id)],
      RawSentence::from_row,
    )
    .optional()?
    .map(RawSentence::decode)
    .transpose()
}

fn load_adjustments(
  conn: &Connection,
  sentence_id: Uuid,
  include_voided: bool,
) -> Result<Vec<ResolvedAdjustment>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ADJUSTMENT_COLUMNS}
     FROM sentence_adjustments a
     LEFT JOIN adjustment_voids v ON v.adjustment_id = a.adjustment_id
     WHERE a.sentence_id = ?1 AND (?2 OR v.voiding_id IS NULL)
     ORDER BY a.effective_date, a.recorded_at, a.rowid"
  ))?;
  let raws = stmt
    .query_map(
      rusqlite::params![encode_uuid(sentence_id), include_voided],
      RawResolvedAdjustment::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawResolvedAdjustment::decode).collect()
}

fn load_inmate_ledgers(
  conn: &Connection,
  inmate_id: Uuid,
) -> Result<Vec<SentenceLedger>> {
  load_sentences(conn, Some(inmate_id))?
    .into_iter()
    .map(|sentence| {
      let adjustments = load_adjustments(conn, sentence.sentence_id, true)?;
      Ok(SentenceLedger { sentence, adjustments })
    })
    .collect()
}

fn load_open_ledgers(conn: &Connection) -> Result<Vec<SentenceLedger>> {
  let mut stmt = conn.prepare(
    "SELECT DISTINCT inmate_id FROM sentences
     WHERE actual_release_date IS NULL
     ORDER BY inmate_id",
  )?;
  let inmates = stmt
    .query_map([], |r| r.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut ledgers = Vec::new();
  for inmate in inmates {
    ledgers.extend(load_inmate_ledgers(conn, decode_uuid(&inmate)?)?);
  }
  Ok(ledgers)
}

fn view(
  conn: &Connection,
  calculator: ReleaseCalculator,
  sentence_id: Uuid,
  today: NaiveDate,
) -> Result<Option<SentenceView>> {
  let Some(sentence) = load_sentence(conn, sentence_id)? else {
    return Ok(None);
  };

  let ledgers = load_inmate_ledgers(conn, sentence.inmate_id)?;
  let stack = calculator.compute_stack(&ledgers, today)?;
  let projection = stack
    .projection(sentence_id)
    .cloned()
    .ok_or(bdocs_core::Error::SentenceNotFound(sentence_id))?;

  let active_adjustments = ledgers
    .into_iter()
    .find(|l| l.sentence.sentence_id == sentence_id)
    .map(|l| {
      l.adjustments
        .into_iter()
        .filter(|ra| ra.status.is_active())
        .collect()
    })
    .unwrap_or_default();

  Ok(Some(SentenceView {
    sentence,
    as_of: today,
    active_adjustments,
    projection,
  }))
}
