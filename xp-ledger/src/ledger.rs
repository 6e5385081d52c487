//! Ledger facade: idempotent XP writes and paginated totals.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::amount::{from_base_units, parse_fixed_point, to_fixed_point};
use crate::error::Result;
use crate::store::{IssueLocation, LedgerStore, NewPermit, UserXpTotal};

/// Rows fetched per page when summing a user's permits.
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// Input for [`Ledger::save_record`].
#[derive(Debug, Clone)]
pub struct SaveXpRecord {
    /// Platform user id of the beneficiary
    pub user_id: i64,
    /// Work item the amount is recorded against
    pub issue: IssueLocation,
    /// Signed XP amount (negative for a malus)
    pub amount: BigDecimal,
}

/// What [`Ledger::save_record`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted { permit_id: i64 },
    Updated { permit_id: i64 },
}

/// Score ledger over an injected [`LedgerStore`].
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    page_size: u64,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the summation page size.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Resolve the beneficiary row, creating it on first sight.
    pub async fn get_or_create_user(&self, user_id: i64) -> Result<i64> {
        if let Some(id) = self.store.find_user(user_id).await? {
            return Ok(id);
        }
        info!(user_id, "User not found in ledger, creating");
        let id = self.store.insert_user(user_id).await?;
        info!(user_id, "Created ledger user");
        Ok(id)
    }

    /// Resolve the location for a work item, creating it on first sight.
    ///
    /// An insert failure after a miss (including a lost race) is returned as-is.
    pub async fn get_or_create_location(&self, issue: &IssueLocation) -> Result<i64> {
        if let Some(id) = self.store.find_location(issue.issue_id).await? {
            return Ok(id);
        }
        let id = self.store.insert_location(issue).await?;
        info!(issue_id = issue.issue_id, location_id = id, "Created new location");
        Ok(id)
    }

    /// Write `amount` for (user, work item), overwriting any existing
    /// untokenized entry for the same pair.
    pub async fn save_record(&self, input: &SaveXpRecord) -> Result<SaveOutcome> {
        let SaveXpRecord {
            user_id,
            issue,
            amount,
        } = input;
        debug!(user_id, issue_id = issue.issue_id, %amount, "Saving XP record");

        let beneficiary_id = self.get_or_create_user(*user_id).await?;
        let location_id = self.get_or_create_location(issue).await?;
        let fixed = to_fixed_point(amount);

        if let Some(existing) = self
            .store
            .find_untokenized_permit(beneficiary_id, location_id)
            .await?
        {
            debug!(user_id, issue_id = issue.issue_id, permit_id = existing.id, "Existing XP record found, updating amount");
            self.store.update_permit_amount(existing.id, &fixed).await?;
            info!(user_id, issue_id = issue.issue_id, "XP record updated");
            return Ok(SaveOutcome::Updated {
                permit_id: existing.id,
            });
        }

        let permit = NewPermit {
            beneficiary_id,
            location_id,
            amount: fixed,
            token_id: None,
            nonce: derive_nonce(*user_id, issue.issue_id),
            signature: uuid::Uuid::new_v4().to_string(),
        };
        let permit_id = self.store.insert_permit(&permit).await?;
        info!(user_id, issue_id = issue.issue_id, permit_id, "XP record inserted");
        Ok(SaveOutcome::Inserted { permit_id })
    }

    /// Sum every untokenized permit of a user, page by page.
    pub async fn get_user_total(&self, user_id: i64) -> Result<UserXpTotal> {
        info!(user_id, "Fetching XP permits");
        let mut offset = 0u64;
        let mut permit_count = 0u64;
        let mut units = BigInt::from(0);

        loop {
            let page = self
                .store
                .untokenized_amounts(user_id, offset, self.page_size)
                .await?;
            if page.is_empty() {
                break;
            }
            for raw in &page {
                units += parse_fixed_point(raw)?;
            }
            let fetched = page.len() as u64;
            permit_count += fetched;
            if fetched < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        if permit_count == 0 {
            info!(user_id, "No XP permits found");
            return Ok(UserXpTotal::no_data());
        }

        debug!(user_id, permit_count, "XP permits summed");
        Ok(UserXpTotal {
            total: from_base_units(units),
            permit_count,
        })
    }
}

/// Deterministic permit nonce for a (user, work item) pair: the SHA-256 of
/// `"{user}-{issue}"` read as an unsigned big-endian integer.
pub fn derive_nonce(user_id: i64, issue_id: i64) -> String {
    let digest = Sha256::digest(format!("{}-{}", user_id, issue_id).as_bytes());
    BigInt::from_bytes_be(Sign::Plus, &digest).to_string()
}
