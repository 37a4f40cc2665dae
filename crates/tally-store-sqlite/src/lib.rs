//! SQLite backend for the Tally engagement store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each engagement write is a single
//! `IMMEDIATE` transaction; uniqueness constraints on the fact tables back up
//! the check-then-write logic when several processes share the file.

mod encode;
mod retry;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use store::{SqliteStore, StorePolicy};
