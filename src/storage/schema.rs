//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the proxy health database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Proxy health, one row per host:port
CREATE TABLE IF NOT EXISTS proxies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    host TEXT NOT NULL,
    port INTEGER NOT NULL,
    protocol TEXT NOT NULL,
    successes INTEGER NOT NULL DEFAULT 0,
    attempts INTEGER NOT NULL DEFAULT 0,
    latency_ms INTEGER,
    anonymity TEXT,
    last_checked TEXT,
    first_seen TEXT NOT NULL,
    UNIQUE(host, port),
    CHECK (successes <= attempts)
);

CREATE INDEX IF NOT EXISTS idx_proxies_latency ON proxies(latency_ms);

-- Track acquisition runs
CREATE TABLE IF NOT EXISTS refresh_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    fetched INTEGER NOT NULL DEFAULT 0,
    validated INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
