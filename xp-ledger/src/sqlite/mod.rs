//! SQLite-backed ledger store.
//!
//! ## Tables
//!
//! - `users` - Beneficiaries, keyed by platform user id
//! - `locations` - One row per work item (`issue_id` is unique)
//! - `permits` - Signed XP amounts in base units

pub mod schema;

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::store::{IssueLocation, LedgerStore, NewPermit, Permit};

/// Ledger store over a single SQLite connection.
pub struct SqliteLedgerStore {
    conn: Mutex<Connection>,
}

impl SqliteLedgerStore {
    /// Open or create the ledger database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening ledger database at {:?}", path);

        let conn = Connection::open(path)
            .map_err(|e| LedgerError::Database(format!("Failed to open SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| LedgerError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory ledger database");

        let conn = Connection::open_in_memory()
            .map_err(|e| LedgerError::Database(format!("Failed to open in-memory SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| LedgerError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }
}

fn permit_from_row(row: &Row) -> std::result::Result<Permit, rusqlite::Error> {
    Ok(Permit {
        id: row.get("id")?,
        beneficiary_id: row.get("beneficiary_id")?,
        location_id: row.get("location_id")?,
        amount: row.get("amount")?,
        token_id: row.get("token_id")?,
        nonce: row.get("nonce")?,
        signature: row.get("signature")?,
        partner_id: row.get("partner_id")?,
    })
}

/// Map constraint violations to `Conflict`, everything else to `Database`.
fn insert_error(entity: &'static str, err: rusqlite::Error) -> LedgerError {
    match &err {
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::ConstraintViolation => {
            LedgerError::Conflict {
                entity,
                detail: err.to_string(),
            }
        }
        _ => LedgerError::Database(format!("Failed to insert {}: {}", entity, err)),
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn find_user(&self, user_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id FROM users WHERE id = ?1", params![user_id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| LedgerError::Database(format!("User lookup failed: {}", e)))
        })
    }

    async fn insert_user(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO users (id) VALUES (?1)", params![user_id])
                .map_err(|e| insert_error("user", e))?;
            Ok(user_id)
        })
    }

    async fn find_location(&self, issue_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM locations WHERE issue_id = ?1",
                params![issue_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| LedgerError::Database(format!("Location lookup failed: {}", e)))
        })
    }

    async fn insert_location(&self, location: &IssueLocation) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO locations (issue_id, node_type, node_url) VALUES (?1, 'Issue', ?2)",
                params![location.issue_id, location.issue_url],
            )
            .map_err(|e| insert_error("location", e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    async fn find_untokenized_permit(
        &self,
        beneficiary_id: i64,
        location_id: i64,
    ) -> Result<Option<Permit>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM permits
                 WHERE beneficiary_id = ?1 AND location_id = ?2 AND token_id IS NULL",
                params![beneficiary_id, location_id],
                permit_from_row,
            )
            .optional()
            .map_err(|e| LedgerError::Database(format!("Permit lookup failed: {}", e)))
        })
    }

    async fn insert_permit(&self, permit: &NewPermit) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO permits (amount, beneficiary_id, location_id, token_id, nonce, signature, partner_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
                params![
                    permit.amount,
                    permit.beneficiary_id,
                    permit.location_id,
                    permit.token_id,
                    permit.nonce,
                    permit.signature,
                ],
            )
            .map_err(|e| insert_error("permit", e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    async fn update_permit_amount(&self, permit_id: i64, amount: &str) -> Result<()> {
        self.with_conn(|conn| {
            let updated = conn
                .execute(
                    "UPDATE permits SET amount = ?1 WHERE id = ?2",
                    params![amount, permit_id],
                )
                .map_err(|e| LedgerError::Database(format!("Permit update failed: {}", e)))?;
            if updated == 0 {
                return Err(LedgerError::Database(format!("Permit {} vanished before update", permit_id)));
            }
            Ok(())
        })
    }

    async fn untokenized_amounts(
        &self,
        beneficiary_id: i64,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT amount FROM permits
                     WHERE beneficiary_id = ?1 AND token_id IS NULL
                     ORDER BY id LIMIT ?2 OFFSET ?3",
                )
                .map_err(|e| LedgerError::Database(format!("Prepare failed: {}", e)))?;

            let amounts = stmt
                .query_map(params![beneficiary_id, limit as i64, offset as i64], |row| row.get(0))
                .map_err(|e| LedgerError::Database(format!("Query failed: {}", e)))?
                .collect::<std::result::Result<Vec<String>, _>>()
                .map_err(|e| LedgerError::Database(format!("Row parse failed: {}", e)))?;

            Ok(amounts)
        })
    }
}
