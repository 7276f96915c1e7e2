//! # SQLite History Store
//!
//! Persistent append-only log in a single SQLite file (`.roundtable/history.db`
//! by default). Every scenario is a separate sequence inside one table,
//! keyed by `(scenario, sequence)`.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{HistoryEntry, HistoryRecord, HistoryResult, HistoryStore};
use crate::error::HistoryError;

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

pub const DEFAULT_HISTORY_PATH: &str = ".roundtable/history.db";

pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    /// Open or create the store at the default path
    pub fn open() -> HistoryResult<Self> {
        Self::open_at(DEFAULT_HISTORY_PATH)
    }

    /// Open the store at a specific path (useful for testing)
    pub fn open_at<P: AsRef<Path>>(path: P) -> HistoryResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> HistoryResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> HistoryResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn lock(&self) -> HistoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HistoryError::Lock(e.to_string()))
    }

    fn run_migrations(&self) -> HistoryResult<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }

    /// Migration to version 1 - append-only record log
    fn migrate_v1(conn: &Connection) -> HistoryResult<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS history_records (
                scenario TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                kind TEXT NOT NULL,
                round INTEGER,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (scenario, sequence)
            )
            "#,
            [],
        )?;

        // Storage-level guard: rows are never rewritten or removed.
        conn.execute_batch(
            r#"
            CREATE TRIGGER IF NOT EXISTS history_records_no_update
            BEFORE UPDATE ON history_records
            BEGIN
                SELECT RAISE(ABORT, 'history is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS history_records_no_delete
            BEFORE DELETE ON history_records
            BEGIN
                SELECT RAISE(ABORT, 'history is append-only');
            END;
            "#,
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_kind ON history_records(scenario, kind)",
            [],
        )?;

        Ok(())
    }

    /// Scenarios that have at least one record, sorted.
    pub fn scenarios(&self) -> HistoryResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT scenario FROM history_records ORDER BY scenario")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Wall-clock time a record was written, for audit output.
    pub fn recorded_at(&self, scenario: &str, sequence: u64) -> HistoryResult<Option<String>> {
        let conn = self.lock()?;
        let created_at = conn
            .query_row(
                "SELECT created_at FROM history_records WHERE scenario = ?1 AND sequence = ?2",
                params![scenario, sequence as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(created_at)
    }

    fn decode(scenario: &str, rows: Vec<(i64, String)>) -> HistoryResult<Vec<HistoryRecord>> {
        rows.into_iter()
            .map(|(sequence, payload)| -> HistoryResult<HistoryRecord> {
                let entry: HistoryEntry = serde_json::from_str(&payload)?;
                let sequence = u64::try_from(sequence).map_err(|_| {
                    HistoryError::Corrupt(format!("bad sequence {} in '{}'", sequence, scenario))
                })?;
                Ok(HistoryRecord {
                    scenario: scenario.to_string(),
                    sequence,
                    entry,
                })
            })
            .collect()
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn append(&self, scenario: &str, entry: HistoryEntry) -> HistoryResult<u64> {
        let payload = serde_json::to_string(&entry)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM history_records WHERE scenario = ?1",
            params![scenario],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO history_records (scenario, sequence, kind, round, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![scenario, next, entry.kind(), entry.round(), payload],
        )?;
        tx.commit()?;

        Ok(next as u64)
    }

    fn query(&self, scenario: &str) -> HistoryResult<Vec<HistoryRecord>> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT sequence, payload
                FROM history_records
                WHERE scenario = ?1
                ORDER BY sequence ASC
                "#,
            )?;
            let rows = stmt
                .query_map(params![scenario], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<(i64, String)>, _>>()?;
            rows
        };

        Self::decode(scenario, rows)
    }

    fn latest(&self, scenario: &str, limit: usize) -> HistoryResult<Vec<HistoryRecord>> {
        let mut rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT sequence, payload
                FROM history_records
                WHERE scenario = ?1
                ORDER BY sequence DESC
                LIMIT ?2
                "#,
            )?;
            let rows = stmt
                .query_map(params![scenario, limit as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<Result<Vec<(i64, String)>, _>>()?;
            rows
        };
        rows.reverse();

        Self::decode(scenario, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{Contribution, Verdict};

    fn contribution(round: u32, agent: &str, content: &str) -> HistoryEntry {
        HistoryEntry::Contribution(Contribution {
            round,
            agent: agent.to_string(),
            content: content.to_string(),
            index: 0,
        })
    }

    #[test]
    fn test_append_and_query_in_order() {
        let store = SqliteHistoryStore::open_in_memory().unwrap();

        let s1 = store
            .append("research", contribution(1, "ResearchBot", "Paris"))
            .unwrap();
        let s2 = store
            .append("research", Verdict::approve(1, "complete").into())
            .unwrap();
        assert_eq!((s1, s2), (1, 2));

        let records = store.query("research").unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0].entry, HistoryEntry::Contribution(_)));
        assert!(matches!(records[1].entry, HistoryEntry::Verdict(_)));
    }

    #[test]
    fn test_scenarios_do_not_share_sequences() {
        let store = SqliteHistoryStore::open_in_memory().unwrap();

        store.append("a", contribution(1, "ResearchBot", "x")).unwrap();
        store.append("a", contribution(2, "ResearchBot", "y")).unwrap();
        let first_b = store.append("b", contribution(1, "CreativeBot", "z")).unwrap();

        assert_eq!(first_b, 1);
        assert_eq!(store.query("a").unwrap().len(), 2);
        assert_eq!(store.scenarios().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_latest_returns_tail_oldest_first() {
        let store = SqliteHistoryStore::open_in_memory().unwrap();
        for round in 1..=4 {
            store
                .append("s", contribution(round, "ResearchBot", "draft"))
                .unwrap();
        }

        let tail: Vec<u64> = store
            .latest("s", 3)
            .unwrap()
            .iter()
            .map(|r| r.sequence)
            .collect();
        assert_eq!(tail, vec![2, 3, 4]);
    }

    #[test]
    fn test_rows_cannot_be_rewritten() {
        let store = SqliteHistoryStore::open_in_memory().unwrap();
        store.append("s", contribution(1, "ResearchBot", "draft")).unwrap();

        let conn = store.lock().unwrap();
        let update = conn.execute("UPDATE history_records SET payload = '{}'", []);
        assert!(update.is_err());
        let delete = conn.execute("DELETE FROM history_records", []);
        assert!(delete.is_err());
    }

    #[test]
    fn test_reopen_continues_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");

        {
            let store = SqliteHistoryStore::open_at(&path).unwrap();
            store.append("s", contribution(1, "ResearchBot", "one")).unwrap();
            store.append("s", Verdict::reject(1, "again").into()).unwrap();
        }

        let store = SqliteHistoryStore::open_at(&path).unwrap();
        let next = store.append("s", contribution(2, "ResearchBot", "two")).unwrap();
        assert_eq!(next, 3);
        assert!(store.recorded_at("s", 1).unwrap().is_some());
        assert!(store.recorded_at("s", 9).unwrap().is_none());
    }
}
