//! Error types for xp-ledger

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// A read or write against the backing store failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An insert hit a uniqueness constraint. Raised when two writers race on
    /// the same key and both observed "no existing row".
    #[error("Conflicting write on {entity}: {detail}")]
    Conflict { entity: &'static str, detail: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
