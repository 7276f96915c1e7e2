use std::collections::HashMap;
use std::sync::Mutex;

use super::{HistoryEntry, HistoryRecord, HistoryResult, HistoryStore};
use crate::error::HistoryError;

/// Volatile history store. One `Vec` per scenario.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    logs: Mutex<HashMap<String, Vec<HistoryRecord>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scenarios that have at least one record, sorted.
    pub fn scenarios(&self) -> HistoryResult<Vec<String>> {
        let logs = self
            .logs
            .lock()
            .map_err(|e| HistoryError::Lock(e.to_string()))?;
        let mut names: Vec<String> = logs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(&self, scenario: &str, entry: HistoryEntry) -> HistoryResult<u64> {
        let mut logs = self
            .logs
            .lock()
            .map_err(|e| HistoryError::Lock(e.to_string()))?;

        let log = logs.entry(scenario.to_string()).or_default();
        let sequence = log.last().map(|r| r.sequence).unwrap_or(0) + 1;
        log.push(HistoryRecord {
            scenario: scenario.to_string(),
            sequence,
            entry,
        });
        Ok(sequence)
    }

    fn query(&self, scenario: &str) -> HistoryResult<Vec<HistoryRecord>> {
        let logs = self
            .logs
            .lock()
            .map_err(|e| HistoryError::Lock(e.to_string()))?;
        Ok(logs.get(scenario).cloned().unwrap_or_default())
    }
}
