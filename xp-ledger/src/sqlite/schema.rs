//! Ledger schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::{LedgerError, Result};

/// Version stamped on a freshly created ledger.
pub const SCHEMA_VERSION: i32 = 1;

/// Create the ledger tables on an unversioned database.
///
/// A database that already carries a version is left untouched.
pub fn init_schema(conn: &Connection) -> Result<()> {
    if let Some(version) = stored_version(conn)? {
        info!("Ledger schema present (v{})", version);
        return Ok(());
    }

    info!("Creating new ledger schema v{}", SCHEMA_VERSION);
    conn.execute_batch(&format!(
        "BEGIN;\n{}\nINSERT INTO schema_version (version) VALUES ({});\nCOMMIT;",
        LEDGER_SCHEMA, SCHEMA_VERSION
    ))
    .map_err(|e| LedgerError::Database(format!("Failed to create ledger tables: {}", e)))
}

fn stored_version(conn: &Connection) -> Result<Option<i32>> {
    let has_table: bool = conn
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
            [],
            |row| row.get(0),
        )
        .map_err(|e| LedgerError::Database(format!("Failed to inspect schema: {}", e)))?;
    if !has_table {
        return Ok(None);
    }

    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| LedgerError::Database(format!("Failed to read schema_version: {}", e)))
}

/// Version stamp, users, locations and permits.
///
/// The partial unique index keeps at most one untokenized permit per
/// (beneficiary, location); a racing second insert fails with a constraint
/// violation instead of duplicating the row.
const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id INTEGER NOT NULL UNIQUE,
    node_type TEXT NOT NULL,
    node_url TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS permits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    amount TEXT NOT NULL,
    beneficiary_id INTEGER NOT NULL REFERENCES users(id),
    location_id INTEGER REFERENCES locations(id),
    token_id INTEGER,
    nonce TEXT NOT NULL,
    deadline TEXT NOT NULL DEFAULT '',
    signature TEXT NOT NULL UNIQUE,
    partner_id INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_permits_untokenized_pair
    ON permits(beneficiary_id, location_id) WHERE token_id IS NULL;
CREATE INDEX IF NOT EXISTS idx_permits_beneficiary ON permits(beneficiary_id);
"#;
