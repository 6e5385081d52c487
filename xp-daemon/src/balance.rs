//! Read-only balance lookup for many users at once.

use std::collections::HashSet;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::command::no_data_reply;
use crate::error::EngineError;
use crate::format::sanitize_handle;
use crate::github::GithubApi;
use xp_ledger::Ledger;

/// Balance of one requested user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UserBalance {
    #[serde(rename_all = "camelCase")]
    Available {
        login: String,
        id: i64,
        has_data: bool,
        total: BigDecimal,
        permit_count: u64,
    },
    #[serde(rename_all = "camelCase")]
    Unavailable {
        login: String,
        has_data: bool,
        message: String,
    },
}

impl UserBalance {
    fn unavailable(login: &str) -> Self {
        UserBalance::Unavailable {
            login: login.to_string(),
            has_data: false,
            message: no_data_reply(login),
        }
    }
}

/// Normalize requested usernames.
///
/// Each input may be a single login, a JSON array of logins or a
/// comma-separated list. Leading `@`s are stripped, blanks dropped and
/// duplicates removed case-insensitively, keeping the first spelling.
pub fn extract_usernames<S: AsRef<str>>(inputs: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .flat_map(|input| split_input(input.as_ref()))
        .filter_map(|raw| sanitize_handle(&raw))
        .filter(|login| seen.insert(login.to_ascii_lowercase()))
        .collect()
}

fn split_input(input: &str) -> Vec<String> {
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str::<serde_json::Value>(input) {
        return items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect();
    }
    input.split(',').map(|part| part.trim().to_string()).collect()
}

/// Fan-out over `get_user` and the ledger total.
pub struct BalanceService {
    github: Arc<dyn GithubApi>,
    ledger: Ledger,
}

impl BalanceService {
    pub fn new(github: Arc<dyn GithubApi>, ledger: Ledger) -> Self {
        Self { github, ledger }
    }

    /// Balances for `usernames`, in request order. Any platform or ledger
    /// failure fails the whole lookup.
    pub async fn lookup<S: AsRef<str>>(&self, usernames: &[S]) -> Result<Vec<UserBalance>, EngineError> {
        let logins = extract_usernames(usernames);
        info!(count = logins.len(), "Looking up XP balances");
        try_join_all(logins.iter().map(|login| self.lookup_one(login))).await
    }

    async fn lookup_one(&self, login: &str) -> Result<UserBalance, EngineError> {
        let Some(user) = self.github.get_user(login).await? else {
            debug!(login, "User not found");
            return Ok(UserBalance::unavailable(login));
        };

        let total = self.ledger.get_user_total(user.id).await?;
        if !total.has_data() {
            return Ok(UserBalance::unavailable(&user.login));
        }
        Ok(UserBalance::Available {
            login: user.login,
            id: user.id,
            has_data: true,
            total: total.total,
            permit_count: total.permit_count,
        })
    }
}
