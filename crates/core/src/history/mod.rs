//! # History Store
//!
//! Append-only, per-scenario audit log of everything a run produced.
//!
//! ## Architecture
//!
//! ```text
//!                 HistoryStore (append / query)
//!                        ↓
//!   InMemoryHistoryStore (tests, offline) or SqliteHistoryStore (persistent)
//! ```
//!
//! Each scenario owns its own sequence space starting at 1. There is no
//! update or delete operation.

pub mod db;
pub mod memory;
pub mod records;

pub use db::SqliteHistoryStore;
pub use memory::InMemoryHistoryStore;
pub use records::{Contribution, HistoryEntry, HistoryRecord, ToolCall, Verdict};

use crate::error::HistoryError;

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

pub trait HistoryStore: Send + Sync {
    /// Append an entry to the scenario's log and return its sequence number.
    fn append(&self, scenario: &str, entry: HistoryEntry) -> HistoryResult<u64>;

    /// All records of a scenario in append order.
    fn query(&self, scenario: &str) -> HistoryResult<Vec<HistoryRecord>>;

    /// The last `limit` records of a scenario, oldest first.
    fn latest(&self, scenario: &str, limit: usize) -> HistoryResult<Vec<HistoryRecord>> {
        let records = self.query(scenario)?;
        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }

    fn contributions(&self, scenario: &str) -> HistoryResult<Vec<Contribution>> {
        Ok(self
            .query(scenario)?
            .into_iter()
            .filter_map(|r| match r.entry {
                HistoryEntry::Contribution(c) => Some(c),
                _ => None,
            })
            .collect())
    }

    fn verdicts(&self, scenario: &str) -> HistoryResult<Vec<Verdict>> {
        Ok(self
            .query(scenario)?
            .into_iter()
            .filter_map(|r| match r.entry {
                HistoryEntry::Verdict(v) => Some(v),
                _ => None,
            })
            .collect())
    }

    fn tool_calls(&self, scenario: &str) -> HistoryResult<Vec<ToolCall>> {
        Ok(self
            .query(scenario)?
            .into_iter()
            .filter_map(|r| match r.entry {
                HistoryEntry::ToolCall(t) => Some(t),
                _ => None,
            })
            .collect())
    }
}
