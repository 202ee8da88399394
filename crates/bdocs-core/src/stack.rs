//! Concurrent and consecutive stacking across an inmate's sentences.
//!
//! Concurrent links are symmetric and merge sentences into groups that release
//! together when the longest member finishes. Consecutive links are directed:
//! the later sentence's clock starts on the earlier one's release date. Groups
//! joined by consecutive links must form a DAG; any cycle, including a
//! consecutive link inside a concurrent group, is rejected.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  adjustment::SentenceAdjustment,
  calculator::{ReleaseCalculator, ReleaseProjection, ReleaseStatus},
  error::InvalidInput,
  lifecycle::{ResolvedAdjustment, SentenceLedger},
  sentence::StackingMode,
};

// ─── Output types ────────────────────────────────────────────────────────────

/// When a set of sentences lets the inmate go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRelease {
  pub status:                ReleaseStatus,
  pub release_date:          Option<NaiveDate>,
  pub days_remaining:        Option<i64>,
  /// The member whose release date governs, when the status is fixed.
  pub governing_sentence_id: Option<Uuid>,
}

/// Sentences served at the same time. A sentence with no concurrent links is
/// a group of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrentGroup {
  pub sentence_ids: Vec<Uuid>,
  pub release:      StackRelease,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackProjection {
  /// One per input sentence, in input order.
  pub projections: Vec<ReleaseProjection>,
  /// Ordered by each group's first member in the input.
  pub groups:      Vec<ConcurrentGroup>,
  /// Latest release across every group; `None` for an empty input.
  pub overall:     Option<StackRelease>,
}

impl StackProjection {
  pub fn projection(&self, sentence_id: Uuid) -> Option<&ReleaseProjection> {
    self
      .projections
      .iter()
      .find(|p| p.sentence_id == sentence_id)
  }

  pub fn group_of(&self, sentence_id: Uuid) -> Option<&ConcurrentGroup> {
    self
      .groups
      .iter()
      .find(|g| g.sentence_ids.contains(&sentence_id))
  }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

impl ReleaseCalculator {
  /// Project every sentence in `ledgers`, resolving stacking links between
  /// them. Links must point at court cases present in the same input.
  pub fn compute_stack(
    &self,
    ledgers: &[SentenceLedger],
    today: NaiveDate,
  ) -> Result<StackProjection> {
    let n = ledgers.len();
    let links = Links::build(ledgers)?;

    let mut projections: Vec<Option<ReleaseProjection>> = vec![None; n];
    for group in links.topological_groups(ledgers)? {
      for &i in &links.members[group] {
        let ledger = &ledgers[i];
        let projection = match links.predecessor[i] {
          None => self.compute(&ledger.sentence, &ledger.adjustments, today)?,
          Some(j) => match projections[j].as_ref().and_then(fixed_release) {
            Some(start) => self.compute_from(
              &ledger.sentence,
              &ledger.adjustments,
              Some(start),
              today,
            )?,
            None => self.compute_blocked(&ledger.sentence, &ledger.adjustments)?,
          },
        };
        projections[i] = Some(projection);
      }
    }

    let projections: Vec<ReleaseProjection> =
      projections.into_iter().flatten().collect();

    let groups: Vec<ConcurrentGroup> = links
      .group_order
      .iter()
      .map(|&g| {
        let members = &links.members[g];
        ConcurrentGroup {
          sentence_ids: members
            .iter()
            .map(|&i| ledgers[i].sentence.sentence_id)
            .collect(),
          release:      combine(members.iter().map(|&i| &projections[i]), today),
        }
      })
      .collect();

    let overall = (!projections.is_empty())
      .then(|| combine(projections.iter(), today));

    Ok(StackProjection { projections, groups, overall })
  }

  /// Validate `adjustment` against its sentence's position in the stack,
  /// append it, and project the whole stack again.
  ///
  /// A consecutive sentence's clock runs from its predecessor's release, so
  /// that is the floor for the effective date. When no start is known the
  /// sentence date is used instead.
  pub fn apply_adjustment_in_stack(
    &self,
    ledgers: &[SentenceLedger],
    adjustment: SentenceAdjustment,
    today: NaiveDate,
  ) -> Result<StackedAdjustment> {
    let index = ledgers
      .iter()
      .position(|l| l.sentence.sentence_id == adjustment.sentence_id)
      .ok_or(Error::SentenceNotFound(adjustment.sentence_id))?;

    let before = self.compute_stack(ledgers, today)?;
    let sentence = &ledgers[index].sentence;
    let start = before.projections[index]
      .effective_start_date
      .or(sentence.start_date);
    self.check_adjustment(sentence, &adjustment, start)?;

    let mut ledgers = ledgers.to_vec();
    ledgers[index]
      .adjustments
      .push(ResolvedAdjustment::active(adjustment));
    let stack = self.compute_stack(&ledgers, today)?;
    Ok(StackedAdjustment { ledgers, stack })
  }
}

/// A stack after one adjustment was appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackedAdjustment {
  pub ledgers: Vec<SentenceLedger>,
  pub stack:   StackProjection,
}

/// [`ReleaseCalculator::compute_stack`] under the default policy.
pub fn compute_stack(
  ledgers: &[SentenceLedger],
  today: NaiveDate,
) -> Result<StackProjection> {
  ReleaseCalculator::default().compute_stack(ledgers, today)
}

fn fixed_release(p: &ReleaseProjection) -> Option<NaiveDate> {
  p.is_fixed().then_some(p.release_date).flatten()
}

/// Capital beats indeterminate beats fixed; among fixed, the latest date wins
/// and the earliest member in input order breaks ties.
fn combine<'a>(
  members: impl Iterator<Item = &'a ReleaseProjection>,
  today: NaiveDate,
) -> StackRelease {
  let mut status = ReleaseStatus::Fixed;
  let mut latest: Option<(NaiveDate, Uuid)> = None;

  for p in members {
    match p.status {
      ReleaseStatus::Capital => status = ReleaseStatus::Capital,
      ReleaseStatus::Indeterminate if status == ReleaseStatus::Fixed => {
        status = ReleaseStatus::Indeterminate
      }
      _ => {}
    }
    if let Some(date) = fixed_release(p)
      && latest.is_none_or(|(best, _)| date > best)
    {
      latest = Some((date, p.sentence_id));
    }
  }

  match (status, latest) {
    (ReleaseStatus::Fixed, Some((date, id))) => StackRelease {
      status,
      release_date: Some(date),
      days_remaining: Some((date - today).num_days().max(0)),
      governing_sentence_id: Some(id),
    },
    _ => StackRelease {
      status,
      release_date: None,
      days_remaining: None,
      governing_sentence_id: None,
    },
  }
}

// ─── Link graph ──────────────────────────────────────────────────────────────

struct Links {
  /// Index of the sentence each one runs consecutively after.
  predecessor: Vec<Option<usize>>,
  /// Group id of each sentence.
  group:       Vec<usize>,
  /// Members of each group id, in input order. Empty for unused ids.
  members:     Vec<Vec<usize>>,
  /// Non-empty group ids ordered by first member.
  group_order: Vec<usize>,
}

impl Links {
  fn build(ledgers: &[SentenceLedger]) -> Result<Self, InvalidInput> {
    let n = ledgers.len();
    let mut by_case: HashMap<Uuid, usize> = HashMap::with_capacity(n);
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(n);

    for (i, l) in ledgers.iter().enumerate() {
      if !seen.insert(l.sentence.sentence_id) {
        return Err(InvalidInput::DuplicateSentence(l.sentence.sentence_id));
      }
      if by_case.insert(l.sentence.court_case_id, i).is_some() {
        return Err(InvalidInput::DuplicateCase(l.sentence.court_case_id));
      }
    }

    let mut predecessor = vec![None; n];
    let mut sets = DisjointSets::new(n);

    for (i, l) in ledgers.iter().enumerate() {
      let Some(stacking) = l.sentence.stacking else { continue };
      let j = *by_case.get(&stacking.with_case).ok_or(
        InvalidInput::UnknownStackingCase {
          sentence_id: l.sentence.sentence_id,
          case_id:     stacking.with_case,
        },
      )?;
      if i == j {
        return Err(InvalidInput::StackingCycle(vec![l.sentence.sentence_id]));
      }
      match stacking.mode {
        StackingMode::Concurrent => sets.union(i, j),
        StackingMode::Consecutive => predecessor[i] = Some(j),
      }
    }

    let group: Vec<usize> = (0..n).map(|i| sets.find(i)).collect();
    let mut members = vec![Vec::new(); n];
    let mut group_order = Vec::new();
    for (i, &g) in group.iter().enumerate() {
      if members[g].is_empty() {
        group_order.push(g);
      }
      members[g].push(i);
    }

    Ok(Self { predecessor, group, members, group_order })
  }

  /// Kahn's algorithm over groups, with an edge from a predecessor's group to
  /// its successor's. Groups left unvisited sit on or behind a cycle.
  fn topological_groups(
    &self,
    ledgers: &[SentenceLedger],
  ) -> Result<Vec<usize>, InvalidInput> {
    let n = self.group.len();
    let mut indegree = vec![0usize; n];
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, pred) in self.predecessor.iter().enumerate() {
      if let Some(j) = *pred {
        let (from, to) = (self.group[j], self.group[i]);
        if from == to {
          return Err(InvalidInput::StackingCycle(vec![
            ledgers[j].sentence.sentence_id,
            ledgers[i].sentence.sentence_id,
          ]));
        }
        edges[from].push(to);
        indegree[to] += 1;
      }
    }

    let mut queue: VecDeque<usize> = self
      .group_order
      .iter()
      .copied()
      .filter(|&g| indegree[g] == 0)
      .collect();
    let mut order = Vec::with_capacity(self.group_order.len());

    while let Some(g) = queue.pop_front() {
      order.push(g);
      for &next in &edges[g] {
        indegree[next] -= 1;
        if indegree[next] == 0 {
          queue.push_back(next);
        }
      }
    }

    if order.len() < self.group_order.len() {
      let stuck: Vec<Uuid> = (0..n)
        .filter(|&i| indegree[self.group[i]] > 0)
        .map(|i| ledgers[i].sentence.sentence_id)
        .collect();
      return Err(InvalidInput::StackingCycle(stuck));
    }

    Ok(order)
  }
}

/// Union-find with path halving.
struct DisjointSets {
  parent: Vec<usize>,
}

impl DisjointSets {
  fn new(n: usize) -> Self { Self { parent: (0..n).collect() } }

  fn find(&mut self, mut i: usize) -> usize {
    while self.parent[i] != i {
      self.parent[i] = self.parent[self.parent[i]];
      i = self.parent[i];
    }
    i
  }

  /// Merge, keeping the lower index as root so group ids stay stable.
  fn union(&mut self, a: usize, b: usize) {
    let (ra, rb) = (self.find(a), self.find(b));
    if ra != rb {
      let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
      self.parent[child] = root;
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Days;

  use super::*;
  use crate::{
    Error,
    adjustment::AdjustmentType,
    config::{CalculatorConfig, MonthConversion},
    sentence::SentenceType,
    test_support::{adjustment, bare, date, fixed_sentence, ledger_entry, stacked},
  };

  fn today() -> NaiveDate { date(2024, 1, 1) }

  fn cycle(err: Error) -> Vec<Uuid> {
    match err {
      Error::InvalidInput(InvalidInput::StackingCycle(ids)) => ids,
      other => panic!("expected a stacking cycle, got {other:?}"),
    }
  }

  #[test]
  fn consecutive_sentence_starts_at_predecessor_release() {
    // Five calendar years from 2020-01-01 and then from 2025-01-01.
    let a = fixed_sentence(1827, date(2020, 1, 1));
    let b = stacked(
      fixed_sentence(1826, date(2020, 1, 1)),
      StackingMode::Consecutive,
      &a,
    );
    let stack = compute_stack(&[bare(a.clone()), bare(b.clone())], today()).unwrap();

    let pa = stack.projection(a.sentence_id).unwrap();
    let pb = stack.projection(b.sentence_id).unwrap();
    assert_eq!(pa.release_date, Some(date(2025, 1, 1)));
    assert_eq!(pb.effective_start_date, Some(date(2025, 1, 1)));
    assert_eq!(pb.release_date, Some(date(2030, 1, 1)));

    let overall = stack.overall.unwrap();
    assert_eq!(overall.release_date, Some(date(2030, 1, 1)));
    assert_eq!(overall.governing_sentence_id, Some(b.sentence_id));
  }

  #[test]
  fn consecutive_chain_resolves_transitively_in_any_input_order() {
    let a = fixed_sentence(100, date(2023, 1, 1));
    let b = stacked(fixed_sentence(50, date(2023, 1, 1)), StackingMode::Consecutive, &a);
    let c = stacked(fixed_sentence(25, date(2023, 1, 1)), StackingMode::Consecutive, &b);

    let stack = compute_stack(
      &[bare(c.clone()), bare(b.clone()), bare(a.clone())],
      today(),
    )
    .unwrap();

    let expected = date(2023, 1, 1).checked_add_days(Days::new(175));
    assert_eq!(stack.projection(c.sentence_id).unwrap().release_date, expected);
    assert_eq!(stack.projections[0].sentence_id, c.sentence_id);
    assert_eq!(stack.groups.len(), 3);
  }

  #[test]
  fn credit_on_predecessor_pulls_successor_forward() {
    let a = fixed_sentence(100, date(2023, 1, 1));
    let b = stacked(fixed_sentence(100, date(2023, 1, 1)), StackingMode::Consecutive, &a);
    let a_ledger = SentenceLedger {
      adjustments: vec![ledger_entry(&a, AdjustmentType::GoodTime, 10)],
      sentence:    a,
    };

    let stack = compute_stack(&[a_ledger, bare(b.clone())], today()).unwrap();
    let expected = date(2023, 1, 1).checked_add_days(Days::new(190));
    assert_eq!(stack.projection(b.sentence_id).unwrap().release_date, expected);
  }

  #[test]
  fn concurrent_group_is_governed_by_longest_member() {
    let a = fixed_sentence(4383, date(2020, 1, 1));
    let b = stacked(fixed_sentence(1827, date(2020, 1, 1)), StackingMode::Concurrent, &a);

    let stack = compute_stack(&[bare(a.clone()), bare(b.clone())], today()).unwrap();

    assert_eq!(stack.groups.len(), 1);
    let group = &stack.groups[0];
    assert_eq!(group.sentence_ids, vec![a.sentence_id, b.sentence_id]);
    assert_eq!(group.release.release_date, Some(date(2032, 1, 1)));
    assert_eq!(
      group.release.release_date,
      stack.projection(a.sentence_id).unwrap().release_date
    );
    assert_eq!(group.release.governing_sentence_id, Some(a.sentence_id));
    // Individual projections stay individual.
    assert_eq!(
      stack.projection(b.sentence_id).unwrap().release_date,
      Some(date(2025, 1, 1))
    );
  }

  #[test]
  fn mutual_concurrent_references_form_one_group() {
    let a = fixed_sentence(300, date(2022, 1, 1));
    let b = stacked(fixed_sentence(200, date(2022, 1, 1)), StackingMode::Concurrent, &a);
    let a = stacked(a, StackingMode::Concurrent, &b);

    let stack = compute_stack(&[bare(a), bare(b)], today()).unwrap();
    assert_eq!(stack.groups.len(), 1);
  }

  #[test]
  fn capital_member_makes_group_capital() {
    let a = fixed_sentence(300, date(2022, 1, 1));
    let mut b = stacked(fixed_sentence(0, date(2022, 1, 1)), StackingMode::Concurrent, &a);
    b.sentence_type = SentenceType::Death;
    b.original_term_days = None;

    let stack = compute_stack(&[bare(a), bare(b)], today()).unwrap();
    assert_eq!(stack.groups[0].release.status, ReleaseStatus::Capital);
    assert_eq!(stack.groups[0].release.release_date, None);
    assert_eq!(stack.overall.unwrap().status, ReleaseStatus::Capital);
  }

  #[test]
  fn term_after_life_sentence_cannot_start() {
    let mut a = fixed_sentence(0, date(2010, 1, 1));
    a.sentence_type = SentenceType::Life;
    a.original_term_days = None;
    let b = stacked(fixed_sentence(365, date(2010, 1, 1)), StackingMode::Consecutive, &a);

    let stack = compute_stack(&[bare(a), bare(b.clone())], today()).unwrap();
    let pb = stack.projection(b.sentence_id).unwrap();
    assert_eq!(pb.status, ReleaseStatus::Indeterminate);
    assert_eq!(pb.release_date, None);
  }

  #[test]
  fn two_sentence_consecutive_cycle_is_rejected() {
    let mut a = fixed_sentence(100, date(2023, 1, 1));
    let b = stacked(fixed_sentence(100, date(2023, 1, 1)), StackingMode::Consecutive, &a);
    a = stacked(a, StackingMode::Consecutive, &b);

    let err = compute_stack(&[bare(a.clone()), bare(b.clone())], today()).unwrap_err();
    let ids = cycle(err);
    assert!(ids.contains(&a.sentence_id) && ids.contains(&b.sentence_id));
  }

  #[test]
  fn self_reference_is_a_cycle() {
    let a = fixed_sentence(100, date(2023, 1, 1));
    let a = stacked(a.clone(), StackingMode::Consecutive, &a);
    let err = compute_stack(&[bare(a.clone())], today()).unwrap_err();
    assert_eq!(cycle(err), vec![a.sentence_id]);
  }

  #[test]
  fn consecutive_link_inside_concurrent_group_is_rejected() {
    let a = fixed_sentence(100, date(2023, 1, 1));
    let b = stacked(fixed_sentence(100, date(2023, 1, 1)), StackingMode::Concurrent, &a);
    let c = stacked(fixed_sentence(100, date(2023, 1, 1)), StackingMode::Concurrent, &b);
    // a runs after c, but c runs alongside a through b.
    let a = stacked(a, StackingMode::Consecutive, &c);

    let err = compute_stack(&[bare(a), bare(b), bare(c)], today()).unwrap_err();
    assert_eq!(cycle(err).len(), 2);
  }

  #[test]
  fn cycle_through_groups_is_rejected() {
    let a0 = fixed_sentence(100, date(2023, 1, 1));
    let b0 = fixed_sentence(100, date(2023, 1, 1));
    let c0 = fixed_sentence(100, date(2023, 1, 1));
    // a after b, c after a, while b and c run together.
    let a = stacked(a0, StackingMode::Consecutive, &b0);
    let b = stacked(b0, StackingMode::Concurrent, &c0);
    let c = stacked(c0, StackingMode::Consecutive, &a);

    let err = compute_stack(&[bare(a), bare(b), bare(c)], today()).unwrap_err();
    assert_eq!(cycle(err).len(), 3);
  }

  #[test]
  fn unknown_stacking_case_is_rejected() {
    let other = fixed_sentence(100, date(2023, 1, 1));
    let a = stacked(fixed_sentence(100, date(2023, 1, 1)), StackingMode::Concurrent, &other);
    let err = compute_stack(&[bare(a)], today()).unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidInput(InvalidInput::UnknownStackingCase { case_id, .. })
        if case_id == other.court_case_id
    ));
  }

  #[test]
  fn duplicate_court_case_is_rejected() {
    let a = fixed_sentence(100, date(2023, 1, 1));
    let mut b = fixed_sentence(100, date(2023, 1, 1));
    b.court_case_id = a.court_case_id;
    let err = compute_stack(&[bare(a), bare(b)], today()).unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidInput(InvalidInput::DuplicateCase(_))
    ));
  }

  #[test]
  fn empty_stack_has_no_overall_release() {
    let stack = compute_stack(&[], today()).unwrap();
    assert!(stack.projections.is_empty());
    assert!(stack.overall.is_none());
  }

  #[test]
  fn calendar_months_run_from_the_predecessor_release() {
    let calc = ReleaseCalculator::new(CalculatorConfig {
      month_conversion: MonthConversion::Calendar,
      ..CalculatorConfig::default()
    });
    // Both terms are 12 months; 2020 is a leap year, 2021 is not.
    let mut a = fixed_sentence(366, date(2020, 1, 1));
    a.original_term_months = Some(12);
    let mut b = fixed_sentence(366, date(2020, 1, 1));
    b.original_term_months = Some(12);
    let b = stacked(b, StackingMode::Consecutive, &a);
    let b_id = b.sentence_id;

    let stack = calc.compute_stack(&[bare(a), bare(b)], today()).unwrap();
    let b = stack.projection(b_id).unwrap();
    assert_eq!(b.effective_start_date, Some(date(2021, 1, 1)));
    assert_eq!(b.effective_term_days, Some(365));
    assert_eq!(b.release_date, Some(date(2022, 1, 1)));
  }

  #[test]
  fn adjustment_on_consecutive_sentence_without_start() {
    let calc = ReleaseCalculator::default();
    let a = fixed_sentence(3650, date(2020, 6, 15));
    let mut b = stacked(
      fixed_sentence(3650, date(2020, 6, 15)),
      StackingMode::Consecutive,
      &a,
    );
    b.start_date = None;
    let ledgers = vec![bare(a.clone()), bare(b.clone())];

    let before = calc.compute_stack(&ledgers, today()).unwrap();
    let a_release = before.projection(a.sentence_id).unwrap().release_date.unwrap();
    let b_release = before.projection(b.sentence_id).unwrap().release_date.unwrap();

    let award = adjustment(&b, AdjustmentType::GoodTime, 10, a_release);
    let applied = calc
      .apply_adjustment_in_stack(&ledgers, award, today())
      .unwrap();
    let after = applied.stack.projection(b.sentence_id).unwrap();
    assert_eq!(after.release_date, b_release.checked_sub_days(Days::new(10)));
    assert_eq!(applied.ledgers[1].adjustments.len(), 1);
    assert!(ledgers[1].adjustments.is_empty());
  }

  #[test]
  fn consecutive_adjustment_floor_is_the_predecessor_release() {
    let calc = ReleaseCalculator::default();
    let a = fixed_sentence(3650, date(2020, 6, 15));
    let b = stacked(
      fixed_sentence(3650, date(2020, 6, 15)),
      StackingMode::Consecutive,
      &a,
    );
    let ledgers = vec![bare(a.clone()), bare(b.clone())];
    let a_release = calc
      .compute(&a, &[], today())
      .unwrap()
      .release_date
      .unwrap();

    // After the nominal start but before the clock actually runs.
    let early = adjustment(&b, AdjustmentType::GoodTime, 10, date(2021, 1, 1));
    let err = calc
      .apply_adjustment_in_stack(&ledgers, early, today())
      .unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidInput(InvalidInput::EffectiveBeforeStart { start_date, .. })
        if start_date == a_release
    ));
  }

  #[test]
  fn adjustment_for_sentence_outside_the_stack_is_not_found() {
    let a = fixed_sentence(100, date(2023, 1, 1));
    let stranger = fixed_sentence(100, date(2023, 1, 1));
    let award = adjustment(&stranger, AdjustmentType::GoodTime, 5, date(2023, 2, 1));
    let err = ReleaseCalculator::default()
      .apply_adjustment_in_stack(&[bare(a)], award, today())
      .unwrap_err();
    assert!(matches!(err, Error::SentenceNotFound(id) if id == stranger.sentence_id));
  }
}
