//! XP Ledger - fixed-point score storage
//!
//! Stores signed XP amounts per (beneficiary, work item) and derives user
//! totals from them.
//!
//! - [`amount`]: base-unit (10^18) encoding over arbitrary-precision decimals
//! - [`store`]: the keyed CRUD seam ([`LedgerStore`])
//! - [`sqlite`]: SQLite implementation of the seam
//! - [`ledger`]: idempotent upsert and paginated summation ([`Ledger`])

pub mod amount;
pub mod error;
pub mod ledger;
pub mod sqlite;
pub mod store;

pub use error::{LedgerError, Result};
pub use ledger::{derive_nonce, Ledger, SaveOutcome, SaveXpRecord, DEFAULT_PAGE_SIZE};
pub use sqlite::SqliteLedgerStore;
pub use store::{IssueLocation, LedgerStore, NewPermit, Permit, UserXpTotal};
