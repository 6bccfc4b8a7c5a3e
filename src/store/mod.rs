//! SQLite-backed patient catalog and consumption ledger.

pub mod sqlite;

pub use sqlite::{HistoryEntry, NewMedication, SqliteStore};

#[cfg(test)]
mod tests;
