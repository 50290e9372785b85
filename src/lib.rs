//! Generates dated income and expense ledger entries from recurring rules and retainer
//! contracts, exactly once per billing month.
//!
//! The heart of the crate is the [`engine`]: a [`Generator`] reads active rules and contracts from
//! a [`Store`], walks each one month by month up to a short horizon, and writes whatever is
//! missing. Re-running it is always safe. [`Db`] is the SQLite store used by the `cadence` CLI;
//! [`MemoryStore`] is an in-memory store for tests and embedding.

pub mod args;
pub mod commands;
mod config;
pub mod db;
pub mod engine;
mod error;
pub mod model;
pub mod store;
mod utils;


pub use config::Config;
pub use db::{Db, ImportSummary};
pub use engine::{GenerationReport, Generator};
pub use error::{Error, ErrorType, Result};
pub use store::{MemoryStore, Store};
