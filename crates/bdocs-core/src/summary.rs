//! Read models derived from one or more ledgers.

use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  adjustment::AdjustmentType,
  calculator::{ReleaseCalculator, ReleaseProjection},
  error::InvalidInput,
  lifecycle::{ResolvedAdjustment, SentenceLedger},
  sentence::Sentence,
  stack::StackRelease,
};

// ─── Ledger projections ──────────────────────────────────────────────────────

/// Active ledger totals, overall and per adjustment type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
  pub total_days: i64,
  pub entries:    usize,
  pub by_type:    BTreeMap<AdjustmentType, i64>,
}

impl LedgerSummary {
  /// Fails when a running total leaves the `i64` range.
  pub fn from_ledger(
    adjustments: &[ResolvedAdjustment],
  ) -> Result<Self, InvalidInput> {
    let mut acc = Self::default();
    for ra in adjustments.iter().filter(|ra| ra.status.is_active()) {
      let adj = &ra.adjustment;
      let overflow = || InvalidInput::CreditOverflow(adj.sentence_id);
      acc.total_days = acc.total_days.checked_add(adj.days).ok_or_else(overflow)?;
      let by_type = acc.by_type.entry(adj.adjustment_type).or_default();
      *by_type = by_type.checked_add(adj.days).ok_or_else(overflow)?;
      acc.entries += 1;
    }
    Ok(acc)
  }

  pub fn days_of(&self, adjustment_type: AdjustmentType) -> i64 {
    self.by_type.get(&adjustment_type).copied().unwrap_or(0)
  }
}

/// The counters cached on [`Sentence`]. Always recomputed from the ledger,
/// never incremented in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCounters {
  pub time_served_days: i64,
  pub good_time_days:   i64,
}

impl CreditCounters {
  pub fn from_ledger(
    adjustments: &[ResolvedAdjustment],
  ) -> Result<Self, InvalidInput> {
    let summary = LedgerSummary::from_ledger(adjustments)?;
    Ok(Self {
      time_served_days: summary.days_of(AdjustmentType::TimeServedCredit),
      good_time_days:   summary.days_of(AdjustmentType::GoodTime),
    })
  }
}

// ─── Inmate summary ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceProjection {
  pub sentence:   Sentence,
  pub ledger:     LedgerSummary,
  pub projection: ReleaseProjection,
}

/// Everything the records office needs to answer "when does this person get
/// out".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InmateSentenceSummary {
  pub inmate_id:             Uuid,
  pub total_sentences:       usize,
  /// Sentences with no actual release recorded.
  pub active_sentences:      usize,
  /// Sum of original terms; `None` when no sentence has a term.
  pub total_term_days:       Option<i64>,
  pub has_life_sentence:     bool,
  pub has_death_sentence:    bool,
  /// Soonest fixed release among active sentences.
  pub earliest_release_date: Option<NaiveDate>,
  /// When the whole stack releases, concurrency and consecutive links
  /// included.
  pub latest_release:        Option<StackRelease>,
  pub sentences:             Vec<SentenceProjection>,
}

/// An open sentence due for release inside the look-ahead window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCandidate {
  pub sentence:   Sentence,
  pub projection: ReleaseProjection,
}

impl ReleaseCalculator {
  /// Summarise every sentence of one inmate. `ledgers` must all belong to
  /// `inmate_id`.
  pub fn summarize_inmate(
    &self,
    inmate_id: Uuid,
    ledgers: &[SentenceLedger],
    today: NaiveDate,
  ) -> Result<InmateSentenceSummary> {
    if let Some(foreign) =
      ledgers.iter().find(|l| l.sentence.inmate_id != inmate_id)
    {
      return Err(
        InvalidInput::ForeignSentence {
          sentence_id: foreign.sentence.sentence_id,
          inmate_id,
        }
        .into(),
      );
    }

    let stack = self.compute_stack(ledgers, today)?;

    let sentences = ledgers
      .iter()
      .zip(&stack.projections)
      .map(|(l, p)| {
        Ok(SentenceProjection {
          sentence:   l.sentence.clone(),
          ledger:     LedgerSummary::from_ledger(&l.adjustments)?,
          projection: p.clone(),
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let open = || sentences.iter().filter(|sp| !sp.sentence.is_released());

    let terms: Vec<i64> = ledgers
      .iter()
      .filter_map(|l| l.sentence.original_term_days)
      .collect();
    let total_term_days = if terms.is_empty() {
      None
    } else {
      let sum = terms.iter().try_fold(0i64, |acc, t| acc.checked_add(*t));
      Some(sum.ok_or(InvalidInput::TermOverflow(inmate_id))?)
    };

    Ok(InmateSentenceSummary {
      inmate_id,
      total_sentences: ledgers.len(),
      active_sentences: open().count(),
      total_term_days,
      has_life_sentence: ledgers.iter().any(|l| l.sentence.is_life()),
      has_death_sentence: ledgers.iter().any(|l| l.sentence.is_capital()),
      earliest_release_date: open()
        .filter(|sp| sp.projection.is_fixed())
        .filter_map(|sp| sp.projection.release_date)
        .min(),
      latest_release: stack.overall,
      sentences,
    })
  }

  /// Open sentences whose fixed release date falls within `days_ahead` days
  /// of `today`, soonest first. Ledgers may span many inmates; stacking is
  /// resolved per inmate.
  pub fn releasing_within(
    &self,
    ledgers: &[SentenceLedger],
    today: NaiveDate,
    days_ahead: u32,
  ) -> Result<Vec<ReleaseCandidate>> {
    let cutoff = today
      .checked_add_days(Days::new(u64::from(days_ahead)))
      .unwrap_or(NaiveDate::MAX);

    let mut by_inmate: HashMap<Uuid, Vec<SentenceLedger>> = HashMap::new();
    for l in ledgers {
      by_inmate
        .entry(l.sentence.inmate_id)
        .or_default()
        .push(l.clone());
    }

    let mut candidates = Vec::new();
    for group in by_inmate.values() {
      let stack = self.compute_stack(group, today)?;
      for (l, p) in group.iter().zip(stack.projections) {
        let due = p
          .release_date
          .filter(|d| p.is_fixed() && *d >= today && *d <= cutoff);
        if due.is_some() && !l.sentence.is_released() {
          candidates.push(ReleaseCandidate {
            sentence:   l.sentence.clone(),
            projection: p,
          });
        }
      }
    }

    candidates.sort_by_key(|c| (c.projection.release_date, c.sentence.sentence_id));
    Ok(candidates)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    Error,
    calculator::ReleaseStatus,
    lifecycle::AdjustmentStatus,
    sentence::{SentenceType, StackingMode},
    test_support::{bare, date, fixed_sentence, ledger_entry, stacked},
  };

  fn today() -> NaiveDate { date(2024, 1, 1) }

  #[test]
  fn ledger_summary_groups_by_type_and_skips_voided() {
    let s = fixed_sentence(1000, date(2022, 1, 1));
    let mut voided = ledger_entry(&s, AdjustmentType::Remission, 300);
    voided.status = AdjustmentStatus::Voided {
      reason: None,
      at:     chrono::Utc::now(),
    };
    let ledger = vec![
      ledger_entry(&s, AdjustmentType::GoodTime, 20),
      ledger_entry(&s, AdjustmentType::GoodTime, 15),
      ledger_entry(&s, AdjustmentType::TimeServedCredit, 90),
      ledger_entry(&s, AdjustmentType::CourtModification, -10),
      voided,
    ];

    let summary = LedgerSummary::from_ledger(&ledger).unwrap();
    assert_eq!(summary.total_days, 115);
    assert_eq!(summary.entries, 4);
    assert_eq!(summary.days_of(AdjustmentType::GoodTime), 35);
    assert_eq!(summary.days_of(AdjustmentType::Remission), 0);

    let counters = CreditCounters::from_ledger(&ledger).unwrap();
    assert_eq!(counters, CreditCounters {
      time_served_days: 90,
      good_time_days:   35,
    });
  }

  #[test]
  fn ledger_summary_rejects_a_per_type_overflow() {
    // The grand total stays in range; the good-time subtotal does not.
    let s = fixed_sentence(1000, date(2022, 1, 1));
    let ledger = vec![
      ledger_entry(&s, AdjustmentType::GoodTime, i64::MAX),
      ledger_entry(&s, AdjustmentType::CourtModification, -1),
      ledger_entry(&s, AdjustmentType::GoodTime, 1),
    ];
    assert_eq!(
      LedgerSummary::from_ledger(&ledger),
      Err(InvalidInput::CreditOverflow(s.sentence_id))
    );
    assert_eq!(
      CreditCounters::from_ledger(&ledger),
      Err(InvalidInput::CreditOverflow(s.sentence_id))
    );
  }

  #[test]
  fn inmate_summary_reports_stack_release() {
    let inmate = uuid::Uuid::new_v4();
    let mut a = fixed_sentence(1827, date(2020, 1, 1));
    a.inmate_id = inmate;
    let mut b = stacked(
      fixed_sentence(1826, date(2020, 1, 1)),
      StackingMode::Consecutive,
      &a,
    );
    b.inmate_id = inmate;
    let mut released = fixed_sentence(30, date(2019, 1, 1));
    released.inmate_id = inmate;
    released.actual_release_date = Some(date(2019, 1, 31));

    let summary = ReleaseCalculator::default()
      .summarize_inmate(inmate, &[bare(released), bare(a), bare(b)], today())
      .unwrap();

    assert_eq!(summary.total_sentences, 3);
    assert_eq!(summary.active_sentences, 2);
    assert_eq!(summary.total_term_days, Some(1827 + 1826 + 30));
    assert_eq!(summary.earliest_release_date, Some(date(2025, 1, 1)));
    let latest = summary.latest_release.unwrap();
    assert_eq!(latest.status, ReleaseStatus::Fixed);
    assert_eq!(latest.release_date, Some(date(2030, 1, 1)));
    assert!(!summary.has_life_sentence);
    assert!(!summary.has_death_sentence);
  }

  #[test]
  fn inmate_summary_flags_life_and_death() {
    let inmate = uuid::Uuid::new_v4();
    let mut life = fixed_sentence(0, date(2010, 1, 1));
    life.inmate_id = inmate;
    life.sentence_type = SentenceType::Life;
    life.original_term_days = None;

    let summary = ReleaseCalculator::default()
      .summarize_inmate(inmate, &[bare(life)], today())
      .unwrap();

    assert!(summary.has_life_sentence);
    assert_eq!(summary.total_term_days, None);
    assert_eq!(summary.earliest_release_date, None);
    assert_eq!(
      summary.latest_release.unwrap().status,
      ReleaseStatus::Indeterminate
    );
  }

  #[test]
  fn inmate_summary_rejects_other_inmates() {
    let s = fixed_sentence(10, date(2023, 1, 1));
    let err = ReleaseCalculator::default()
      .summarize_inmate(uuid::Uuid::new_v4(), &[bare(s)], today())
      .unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidInput(InvalidInput::ForeignSentence { .. })
    ));
  }

  #[test]
  fn releasing_within_window_sorted_soonest_first() {
    let soon = fixed_sentence(365, date(2023, 1, 10)); // 2024-01-10
    let sooner = fixed_sentence(365, date(2023, 1, 5)); // 2024-01-05
    let later = fixed_sentence(365, date(2023, 6, 1)); // outside
    let mut gone = fixed_sentence(365, date(2023, 1, 2));
    gone.actual_release_date = Some(date(2024, 1, 2));

    let mut inmates = [soon, sooner, later, gone];
    for s in &mut inmates {
      s.inmate_id = uuid::Uuid::new_v4();
    }
    let ledgers: Vec<_> = inmates.iter().cloned().map(bare).collect();

    let due = ReleaseCalculator::default()
      .releasing_within(&ledgers, today(), 30)
      .unwrap();

    let dates: Vec<_> = due.iter().map(|c| c.projection.release_date).collect();
    assert_eq!(dates, vec![Some(date(2024, 1, 5)), Some(date(2024, 1, 10))]);
  }
}
