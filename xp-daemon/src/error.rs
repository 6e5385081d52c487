//! Error types for the malus engine and XP commands.

use crate::github::GithubError;
use xp_ledger::LedgerError;

/// Fatal conditions. Skip conditions are not errors; see
/// [`SkipReason`](crate::engine::SkipReason).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A payload field needed to persist or act is absent
    #[error("Missing payload field: {0}")]
    MissingField(&'static str),

    /// An authorization check failed with something other than a definitive "no"
    #[error("Could not determine {check} for {login}: {source}")]
    Authorization {
        check: &'static str,
        login: String,
        #[source]
        source: GithubError,
    },

    /// Platform call failed
    #[error("Platform error: {0}")]
    Github(#[from] GithubError),

    /// Ledger read or write failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A ban is required but the payload names no organization
    #[error("Organization login missing from payload, cannot ban {0}")]
    MissingOrganization(String),

    /// The block call failed
    #[error("Failed to ban {login} from {org}: {source}")]
    Ban {
        login: String,
        org: String,
        #[source]
        source: GithubError,
    },

    /// Settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}
