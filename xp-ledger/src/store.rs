//! Persistence seam for the ledger.
//!
//! The store offers keyed CRUD only. Get-or-create and upsert semantics are
//! composed on top of it by [`crate::Ledger`] as lookup-then-insert-or-update,
//! so a uniqueness violation on insert must surface as
//! [`LedgerError::Conflict`](crate::LedgerError::Conflict) rather than a silent duplicate.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The work item a ledger entry is keyed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLocation {
    /// Platform identifier of the work item
    pub issue_id: i64,
    /// Canonical URL of the work item
    pub issue_url: String,
}

/// A persisted ledger entry ("permit").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit {
    pub id: i64,
    pub beneficiary_id: i64,
    pub location_id: Option<i64>,
    /// Signed amount in base units, as an integer string
    pub amount: String,
    pub token_id: Option<i64>,
    pub nonce: String,
    pub signature: String,
    pub partner_id: Option<i64>,
}

/// Input for inserting a permit.
#[derive(Debug, Clone)]
pub struct NewPermit {
    pub beneficiary_id: i64,
    pub location_id: i64,
    pub amount: String,
    /// Always `None` for XP entries; tokenized rows are minted elsewhere.
    pub token_id: Option<i64>,
    pub nonce: String,
    pub signature: String,
}

/// A user's XP balance, derived from their untokenized permits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserXpTotal {
    pub total: BigDecimal,
    pub permit_count: u64,
}

impl UserXpTotal {
    /// The "no data" sentinel: no permits at all, as opposed to permits summing to zero.
    pub fn no_data() -> Self {
        Self {
            total: BigDecimal::from(0),
            permit_count: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.permit_count > 0
    }
}

/// Keyed CRUD over users, locations and permits.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Look up a user row by platform user id.
    async fn find_user(&self, user_id: i64) -> Result<Option<i64>>;

    /// Insert a user row, returning its id.
    async fn insert_user(&self, user_id: i64) -> Result<i64>;

    /// Look up the location id for a work item.
    async fn find_location(&self, issue_id: i64) -> Result<Option<i64>>;

    /// Insert a location row for a work item, returning its id.
    async fn insert_location(&self, location: &IssueLocation) -> Result<i64>;

    /// Find the untokenized permit for a (beneficiary, location) pair.
    async fn find_untokenized_permit(
        &self,
        beneficiary_id: i64,
        location_id: i64,
    ) -> Result<Option<Permit>>;

    /// Insert a permit, returning its id.
    async fn insert_permit(&self, permit: &NewPermit) -> Result<i64>;

    /// Overwrite the amount of an existing permit.
    async fn update_permit_amount(&self, permit_id: i64, amount: &str) -> Result<()>;

    /// One page of untokenized permit amounts for a beneficiary, in a stable order.
    async fn untokenized_amounts(
        &self,
        beneficiary_id: i64,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<String>>;
}
