//! Subcommands and their execution against a [`SentenceStore`].
//!
//! Every command prints one pretty JSON document to the supplied writer.

use std::io::Write;

use anyhow::{Context as _, bail};
use bdocs_core::{
  ReleaseCalculator,
  adjustment::{AdjustmentType, NewAdjustment},
  sentence::{NewSentence, SentenceType, Stacking, StackingMode, TermLength},
  store::SentenceStore,
};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

// ─── Arguments ───────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Record, show or list sentences.
  #[command(subcommand)]
  Sentence(SentenceCommand),

  /// Append an adjustment to a sentence's ledger.
  Adjust(AdjustArgs),

  /// Void a ledger entry.
  Void {
    adjustment_id: Uuid,
    #[arg(long)]
    reason:        Option<String>,
  },

  /// Record the actual release of a sentence.
  Release {
    sentence_id: Uuid,
    #[arg(long = "on", value_name = "DATE")]
    released_on: NaiveDate,
  },

  /// Project one sentence's release date, taking stacking into account.
  Project { sentence_id: Uuid },

  /// Resolve all of an inmate's sentences as a stack.
  Stack { inmate_id: Uuid },

  /// Summarise an inmate's sentences.
  Summary { inmate_id: Uuid },

  /// Open sentences due for release within the next `--days` days.
  ReleasingSoon {
    #[arg(long, default_value_t = 30)]
    days: u32,
  },
}

#[derive(Subcommand, Debug)]
pub enum SentenceCommand {
  Add(AddSentenceArgs),
  Show { sentence_id: Uuid },
  /// The inmate's open sentence with the latest start date.
  Current { inmate_id: Uuid },
  List {
    #[arg(long)]
    inmate: Option<Uuid>,
  },
}

#[derive(Args, Debug)]
pub struct AddSentenceArgs {
  #[arg(long)]
  inmate:              Uuid,
  #[arg(long = "case")]
  court_case:          Uuid,
  /// IMPRISONMENT, LIFE, DEATH, SUSPENDED, TIME_SERVED, PROBATION or FINE.
  #[arg(long = "type")]
  sentence_type:       SentenceType,
  /// Date the sentence was handed down.
  #[arg(long = "date", value_name = "DATE")]
  sentence_date:       NaiveDate,
  #[arg(long, conflicts_with = "term_months")]
  term_days:           Option<i64>,
  #[arg(long)]
  term_months:         Option<u32>,
  #[arg(long)]
  minimum_term_months: Option<u32>,
  /// When the clock starts. Defaults to the sentence date.
  #[arg(long, value_name = "DATE")]
  start:               Option<NaiveDate>,
  /// Pre-trial custody to credit, in days.
  #[arg(long, default_value_t = 0)]
  time_served:         i64,
  #[arg(long, value_name = "CASE", conflicts_with = "consecutive_to")]
  concurrent_with:     Option<Uuid>,
  #[arg(long, value_name = "CASE")]
  consecutive_to:      Option<Uuid>,
  #[arg(long)]
  judge:               Option<String>,
  #[arg(long)]
  notes:               Option<String>,
}

#[derive(Args, Debug)]
pub struct AdjustArgs {
  #[arg(long = "sentence")]
  sentence_id:    Uuid,
  /// GOOD_TIME, REMISSION, TIME_SERVED_CREDIT, CLEMENCY_REDUCTION or
  /// COURT_MODIFICATION.
  #[arg(long = "type")]
  kind:           AdjustmentType,
  /// Positive to shorten the term, negative to extend it.
  #[arg(long, allow_hyphen_values = true)]
  days:           i64,
  #[arg(long, value_name = "DATE")]
  effective:      NaiveDate,
  #[arg(long)]
  reason:         String,
  #[arg(long)]
  document:       Option<String>,
  #[arg(long)]
  approved_by:    Option<String>,
}

impl AddSentenceArgs {
  fn into_new_sentence(self) -> NewSentence {
    let term = match (self.term_days, self.term_months) {
      (Some(days), _) => Some(TermLength::Days(days)),
      (None, Some(months)) => Some(TermLength::Months(months)),
      (None, None) => None,
    };
    let stacking = match (self.concurrent_with, self.consecutive_to) {
      (Some(case), _) => Some(Stacking {
        mode:      StackingMode::Concurrent,
        with_case: case,
      }),
      (None, Some(case)) => Some(Stacking {
        mode:      StackingMode::Consecutive,
        with_case: case,
      }),
      (None, None) => None,
    };

    NewSentence {
      term,
      minimum_term_months: self.minimum_term_months,
      start_date: self.start.or(Some(self.sentence_date)),
      time_served_days: self.time_served,
      stacking,
      sentencing_judge: self.judge,
      notes: self.notes,
      ..NewSentence::new(
        self.inmate,
        self.court_case,
        self.sentence_type,
        self.sentence_date,
      )
    }
  }
}

impl AdjustArgs {
  fn into_new_adjustment(self) -> NewAdjustment {
    NewAdjustment {
      document_reference: self.document,
      approved_by: self.approved_by,
      ..NewAdjustment::new(
        self.sentence_id,
        self.kind,
        self.days,
        self.effective,
        self.reason,
      )
    }
  }
}

// ─── Execution ───────────────────────────────────────────────────────────────

pub async fn run<S: SentenceStore>(
  command: Command,
  store: &S,
  calculator: ReleaseCalculator,
  today: NaiveDate,
  out: &mut impl Write,
) -> anyhow::Result<()> {
  match command {
    Command::Sentence(SentenceCommand::Add(args)) => {
      let sentence = store.add_sentence(args.into_new_sentence()).await?;
      emit(out, &sentence)
    }
    Command::Sentence(SentenceCommand::Show { sentence_id }) => {
      match store.get_sentence(sentence_id).await? {
        Some(sentence) => emit(out, &sentence),
        None => bail!("no sentence with id {sentence_id}"),
      }
    }
    Command::Sentence(SentenceCommand::Current { inmate_id }) => {
      match store.current_sentence(inmate_id).await? {
        Some(sentence) => emit(out, &sentence),
        None => bail!("inmate {inmate_id} has no open sentence"),
      }
    }
    Command::Sentence(SentenceCommand::List { inmate }) => {
      emit(out, &store.list_sentences(inmate).await?)
    }
    Command::Adjust(args) => {
      let (adjustment, projection) = store
        .record_adjustment(args.into_new_adjustment(), today)
        .await?;
      emit(
        out,
        &serde_json::json!({ "adjustment": adjustment, "projection": projection }),
      )
    }
    Command::Void { adjustment_id, reason } => {
      emit(out, &store.void_adjustment(adjustment_id, reason).await?)
    }
    Command::Release { sentence_id, released_on } => {
      emit(out, &store.record_release(sentence_id, released_on).await?)
    }
    Command::Project { sentence_id } => {
      match store.materialize(sentence_id, today).await? {
        Some(view) => emit(out, &view),
        None => bail!("no sentence with id {sentence_id}"),
      }
    }
    Command::Stack { inmate_id } => {
      let ledgers = store.inmate_ledgers(inmate_id).await?;
      emit(out, &calculator.compute_stack(&ledgers, today)?)
    }
    Command::Summary { inmate_id } => {
      let ledgers = store.inmate_ledgers(inmate_id).await?;
      emit(out, &calculator.summarize_inmate(inmate_id, &ledgers, today)?)
    }
    Command::ReleasingSoon { days } => {
      let ledgers = store.open_ledgers().await?;
      emit(out, &calculator.releasing_within(&ledgers, today, days)?)
    }
  }
}

fn emit<T: Serialize>(out: &mut impl Write, value: &T) -> anyhow::Result<()> {
  serde_json::to_writer_pretty(&mut *out, value)
    .context("failed to serialise output")?;
  writeln!(out)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use bdocs_store_sqlite::SqliteStore;
  use clap::Parser;
  use serde_json::Value;

  use super::*;

  #[derive(Parser)]
  struct TestCli {
    #[command(subcommand)]
    command: Command,
  }

  fn today() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() }

  async fn exec(store: &SqliteStore, argv: &[&str]) -> anyhow::Result<Value> {
    let cli = TestCli::try_parse_from(
      std::iter::once("bdocs").chain(argv.iter().copied()),
    )?;
    let mut out = Vec::new();
    run(cli.command, store, store.calculator(), today(), &mut out).await?;
    Ok(serde_json::from_slice(&out)?)
  }

  async fn store() -> SqliteStore {
    SqliteStore::open_in_memory(ReleaseCalculator::default())
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn add_adjust_and_project() {
    let s = store().await;
    let inmate = Uuid::new_v4().to_string();
    let case = Uuid::new_v4().to_string();

    let sentence = exec(&s, &[
      "sentence", "add", "--inmate", &inmate, "--case", &case, "--type",
      "imprisonment", "--date", "2020-06-15", "--term-days", "3650",
    ])
    .await
    .unwrap();
    assert_eq!(sentence["expected_release_date"], "2030-06-13");
    let id = sentence["sentence_id"].as_str().unwrap().to_owned();

    let applied = exec(&s, &[
      "adjust", "--sentence", &id, "--type", "GOOD_TIME", "--days", "730",
      "--effective", "2021-01-01", "--reason", "annual award",
    ])
    .await
    .unwrap();
    assert_eq!(applied["adjustment"]["adjustment_type"], "GOOD_TIME");
    assert_eq!(applied["projection"]["effective_term_days"], 2920);

    let view = exec(&s, &["project", &id]).await.unwrap();
    assert_eq!(view["projection"]["status"], "FIXED");
    assert_eq!(view["active_adjustments"].as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn negative_days_parse_as_penalties() {
    let s = store().await;
    let sentence = exec(&s, &[
      "sentence", "add", "--inmate", &Uuid::new_v4().to_string(), "--case",
      &Uuid::new_v4().to_string(), "--type", "IMPRISONMENT", "--date",
      "2023-01-01", "--term-days", "365",
    ])
    .await
    .unwrap();
    let id = sentence["sentence_id"].as_str().unwrap().to_owned();

    let applied = exec(&s, &[
      "adjust", "--sentence", &id, "--type", "GOOD_TIME", "--days", "-30",
      "--effective", "2023-02-01", "--reason", "misconduct",
    ])
    .await
    .unwrap();
    assert_eq!(applied["projection"]["release_date"], "2024-01-31");
  }

  #[tokio::test]
  async fn summary_and_stack_cover_consecutive_terms() {
    let s = store().await;
    let inmate = Uuid::new_v4().to_string();
    let first_case = Uuid::new_v4().to_string();

    exec(&s, &[
      "sentence", "add", "--inmate", &inmate, "--case", &first_case,
      "--type", "IMPRISONMENT", "--date", "2020-01-01", "--term-days", "1827",
    ])
    .await
    .unwrap();
    exec(&s, &[
      "sentence", "add", "--inmate", &inmate, "--case",
      &Uuid::new_v4().to_string(), "--type", "IMPRISONMENT", "--date",
      "2020-01-01", "--term-days", "1826", "--consecutive-to", &first_case,
    ])
    .await
    .unwrap();

    let stack = exec(&s, &["stack", &inmate]).await.unwrap();
    assert_eq!(stack["overall"]["release_date"], "2030-01-01");

    let summary = exec(&s, &["summary", &inmate]).await.unwrap();
    assert_eq!(summary["total_sentences"], 2);
    assert_eq!(summary["latest_release"]["release_date"], "2030-01-01");
  }

  #[tokio::test]
  async fn current_sentence_follows_releases() {
    let s = store().await;
    let inmate = Uuid::new_v4().to_string();
    exec(&s, &[
      "sentence", "add", "--inmate", &inmate, "--case",
      &Uuid::new_v4().to_string(), "--type", "IMPRISONMENT", "--date",
      "2020-06-15", "--term-days", "3650",
    ])
    .await
    .unwrap();
    let later = exec(&s, &[
      "sentence", "add", "--inmate", &inmate, "--case",
      &Uuid::new_v4().to_string(), "--type", "IMPRISONMENT", "--date",
      "2022-03-01", "--term-days", "100",
    ])
    .await
    .unwrap();
    let later_id = later["sentence_id"].as_str().unwrap().to_owned();

    let current = exec(&s, &["sentence", "current", &inmate]).await.unwrap();
    assert_eq!(current["sentence_id"], later_id.as_str());

    exec(&s, &["release", &later_id, "--on", "2022-06-09"])
      .await
      .unwrap();
    let current = exec(&s, &["sentence", "current", &inmate]).await.unwrap();
    assert_eq!(current["sentence_date"], "2020-06-15");

    let stranger = Uuid::new_v4().to_string();
    assert!(exec(&s, &["sentence", "current", &stranger]).await.is_err());
  }

  #[tokio::test]
  async fn releasing_soon_lists_due_sentences() {
    let s = store().await;
    exec(&s, &[
      "sentence", "add", "--inmate", &Uuid::new_v4().to_string(), "--case",
      &Uuid::new_v4().to_string(), "--type", "IMPRISONMENT", "--date",
      "2023-01-10", "--term-days", "365",
    ])
    .await
    .unwrap();

    let soon = exec(&s, &["releasing-soon", "--days", "30"]).await.unwrap();
    assert_eq!(soon.as_array().unwrap().len(), 1);

    let none = exec(&s, &["releasing-soon", "--days", "5"]).await.unwrap();
    assert!(none.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn show_missing_sentence_fails() {
    let s = store().await;
    let err = exec(&s, &["sentence", "show", &Uuid::new_v4().to_string()])
      .await
      .unwrap_err();
    assert!(err.to_string().starts_with("no sentence with id"));
  }

  #[test]
  fn term_flags_conflict() {
    let nil = Uuid::nil().to_string();
    let parsed = TestCli::try_parse_from([
      "bdocs", "sentence", "add", "--inmate", nil.as_str(), "--case",
      nil.as_str(), "--type", "IMPRISONMENT", "--date", "2020-01-01",
      "--term-days", "10", "--term-months", "1",
    ]);
    assert!(parsed.is_err());
  }
}
