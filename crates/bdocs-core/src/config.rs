//! Calculation policy knobs.
//!
//! Both settings exist because the rule in force depends on the jurisdiction
//! and on how the sentencing court expressed the term. Defaults reproduce the
//! legacy system: thirty-day months and no remission ceiling.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// How a term entered in months becomes the canonical day count.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MonthConversion {
  /// Every month is 30 days.
  #[default]
  ThirtyDay,
  /// Calendar months counted from the start date (end-of-month clamped).
  Calendar,
}

impl MonthConversion {
  /// Convert `months` starting at `start` into days. `None` on date overflow.
  pub fn months_to_days(self, start: NaiveDate, months: u32) -> Option<i64> {
    match self {
      Self::ThirtyDay => Some(i64::from(months) * 30),
      Self::Calendar => start
        .checked_add_months(Months::new(months))
        .map(|end| (end - start).num_days()),
    }
  }
}

/// Ceiling on the total credit a sentence may receive.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RemissionCap {
  /// Credit is bounded only by the term itself.
  #[default]
  Uncapped,
  /// Credit may not exceed one third of the original term.
  OneThird,
}

impl RemissionCap {
  /// Largest credit allowed against a term of `term_days`, if bounded.
  pub fn limit(self, term_days: i64) -> Option<i64> {
    match self {
      Self::Uncapped => None,
      Self::OneThird => Some(term_days / 3),
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct CalculatorConfig {
  #[serde(default)]
  pub month_conversion: MonthConversion,
  #[serde(default)]
  pub remission_cap:    RemissionCap,
}
