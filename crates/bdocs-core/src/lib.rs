//! Core types and the release date calculator for the Bahamas Department of
//! Correctional Services sentence records.
//!
//! Everything here is pure and synchronous apart from the [`store`] trait.
//! The crate has no database dependencies; `bdocs-store-sqlite` supplies one.

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// returned futures.
#![allow(async_fn_in_trait)]

pub mod adjustment;
pub mod calculator;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod sentence;
pub mod stack;
pub mod store;
pub mod summary;

pub use calculator::{ReleaseCalculator, ReleaseProjection, ReleaseStatus};
pub use error::{Error, InvalidInput, Result};

#[cfg(test)]
mod test_support;
