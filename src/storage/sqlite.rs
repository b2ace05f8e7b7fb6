//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ProxyStorage trait.

use crate::proxy::{Anonymity, ProbeOutcome, ProxyEndpoint, ProxyProtocol, ProxyQuery, ProxyRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ProxyStorage, StorageError, StorageResult};
use crate::storage::RefreshRunRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

const PROXY_COLUMNS: &str =
    "host, port, protocol, successes, attempts, latency_ms, anonymity, last_checked";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    ///
    /// Nothing survives the process; used by tests and dry runs.
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Initializes or opens a storage database at the given path
pub fn init_database(path: &Path) -> StorageResult<SqliteStorage> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStorage::new(path)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ProxyRecord> {
    let protocol: String = row.get(2)?;
    let successes: i64 = row.get(3)?;
    let attempts: i64 = row.get(4)?;
    let latency_ms: Option<i64> = row.get(5)?;
    let anonymity: Option<String> = row.get(6)?;
    let last_checked: Option<String> = row.get(7)?;

    Ok(ProxyRecord {
        endpoint: ProxyEndpoint {
            host: row.get(0)?,
            port: row.get(1)?,
            protocol: ProxyProtocol::from_db_string(&protocol).unwrap_or_default(),
        },
        successes: successes.max(0) as u64,
        attempts: attempts.max(0) as u64,
        latency: latency_ms.map(|ms| Duration::from_millis(ms.max(0) as u64)),
        anonymity: anonymity.as_deref().and_then(Anonymity::from_db_string),
        last_checked: last_checked.as_deref().and_then(parse_timestamp),
    })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn duration_to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl ProxyStorage for SqliteStorage {
    // ===== Proxy Health =====

    fn record_probe(
        &mut self,
        endpoint: &ProxyEndpoint,
        outcome: &ProbeOutcome,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let now = at.to_rfc3339();
        let (success, latency_ms, anonymity, checked) = match outcome {
            ProbeOutcome::Success { latency, anonymity } => (
                1i64,
                Some(duration_to_millis(*latency)),
                Some(anonymity.to_db_string()),
                Some(now.clone()),
            ),
            ProbeOutcome::Failure => (0i64, None, None, None),
        };

        self.conn.execute(
            "INSERT INTO proxies
                (host, port, protocol, successes, attempts, latency_ms, anonymity, last_checked, first_seen)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8)
             ON CONFLICT(host, port) DO UPDATE SET
                protocol = excluded.protocol,
                successes = proxies.successes + excluded.successes,
                attempts = proxies.attempts + 1,
                latency_ms = COALESCE(excluded.latency_ms, proxies.latency_ms),
                anonymity = COALESCE(excluded.anonymity, proxies.anonymity),
                last_checked = COALESCE(excluded.last_checked, proxies.last_checked)",
            params![
                endpoint.host,
                endpoint.port,
                endpoint.protocol.to_db_string(),
                success,
                latency_ms,
                anonymity,
                checked,
                now,
            ],
        )?;

        Ok(())
    }

    fn get_proxy(&self, endpoint: &ProxyEndpoint) -> StorageResult<Option<ProxyRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM proxies WHERE host = ?1 AND port = ?2",
            PROXY_COLUMNS
        ))?;

        let record = stmt
            .query_row(params![endpoint.host, endpoint.port], row_to_record)
            .optional()?;

        Ok(record)
    }

    fn query_proxies(&self, query: &ProxyQuery) -> StorageResult<Vec<ProxyRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM proxies
             WHERE successes > 0
               AND latency_ms IS NOT NULL
               AND latency_ms <= ?1
               AND (CASE anonymity
                      WHEN 'elite' THEN 2
                      WHEN 'anonymous' THEN 1
                      WHEN 'transparent' THEN 0
                      ELSE -1
                    END) >= ?2
             ORDER BY CAST(successes AS REAL) / attempts DESC, latency_ms ASC, id ASC",
            PROXY_COLUMNS
        ))?;

        let records = stmt
            .query_map(
                params![
                    duration_to_millis(query.max_latency),
                    query.min_anonymity.rank()
                ],
                row_to_record,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn count_vetted(&self) -> StorageResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM proxies WHERE attempts > 0 AND successes > 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_proxies(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM proxies", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ===== Refresh Runs =====

    fn create_refresh_run(&mut self) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO refresh_runs (started_at) VALUES (?1)",
            params![now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_refresh_run(
        &mut self,
        run_id: i64,
        fetched: usize,
        validated: usize,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE refresh_runs SET finished_at = ?1, fetched = ?2, validated = ?3 WHERE id = ?4",
            params![now, fetched as i64, validated as i64, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_refresh_run(&self) -> StorageResult<Option<RefreshRunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, fetched, validated
             FROM refresh_runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row([], |row| {
                Ok(RefreshRunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    fetched: row.get::<_, i64>(3)? as usize,
                    validated: row.get::<_, i64>(4)? as usize,
                })
            })
            .optional()?;

        Ok(run)
    }
}
