//! SQLite backend for the sentence store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every ledger write runs inside a single
//! transaction on that thread, so the validate, append and reproject steps
//! cannot interleave with another writer.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
