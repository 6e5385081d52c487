//! Configuration for xp-daemon
//!
//! Per-installation settings come from a TOML or JSON file; process
//! configuration from CLI arguments and environment variables via clap.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::github::DEFAULT_API_URL;

/// Per-installation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Prevent XP updates from being posted back to the platform
    #[serde(default)]
    pub disable_comment_posting: bool,

    /// Ban the user from the organization when their XP falls below this
    /// value after a disqualification
    #[serde(default = "default_ban_threshold")]
    pub disqualification_ban_threshold: f64,
}

fn default_ban_threshold() -> f64 { -2000.0 }

impl Default for Settings {
    fn default() -> Self {
        Self {
            disable_comment_posting: false,
            disqualification_ban_threshold: default_ban_threshold(),
        }
    }
}

impl Settings {
    /// Load settings from `path`; `.json` files are read as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content, path.extension().and_then(|e| e.to_str()) == Some("json"))
    }

    fn parse(content: &str, json: bool) -> Result<Self, EngineError> {
        if json {
            serde_json::from_str(content).map_err(|e| EngineError::Config(e.to_string()))
        } else {
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))
        }
    }

    /// The ban threshold as an exact decimal.
    pub fn ban_threshold(&self) -> Result<BigDecimal, EngineError> {
        let threshold = self.disqualification_ban_threshold;
        if !threshold.is_finite() {
            return Err(EngineError::Config(format!(
                "disqualificationBanThreshold must be finite, got {}",
                threshold
            )));
        }
        BigDecimal::from_str(&threshold.to_string())
            .map_err(|e| EngineError::Config(format!("Invalid ban threshold {}: {}", threshold, e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// xp-daemon - XP malus engine and XP queries
#[derive(Parser, Debug, Clone)]
#[command(name = "xp-daemon")]
#[command(about = "Applies disqualification maluses and answers XP queries")]
pub struct Args {
    /// Platform API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Platform REST API root
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub github_api_url: String,

    /// GraphQL endpoint override (defaults to <api-url>/graphql)
    #[arg(long, env = "GITHUB_GRAPHQL_URL")]
    pub github_graphql_url: Option<String>,

    /// Ledger database path
    #[arg(long, env = "XP_DATABASE", default_value = "xp.db")]
    pub database: PathBuf,

    /// Installation settings file (TOML or JSON)
    #[arg(long, env = "XP_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Log level for xp crates
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Evaluate an `issues.unassigned` payload
    Evaluate {
        /// Path to the JSON payload
        payload: PathBuf,
    },
    /// Answer an `/xp` comment payload
    Xp {
        /// Path to the JSON payload
        payload: PathBuf,
    },
    /// Print XP balances for the given logins as JSON
    Balance {
        /// Logins (a JSON array or comma-separated list also works)
        #[arg(required = true)]
        users: Vec<String>,
    },
    /// Print the XP total of a platform user id
    Total {
        user_id: i64,
    },
}

impl Args {
    /// Load installation settings, defaulting when no file is configured.
    pub fn load_settings(&self) -> Result<Settings, EngineError> {
        match &self.settings {
            Some(path) => Settings::load(path),
            None => Ok(Settings::default()),
        }
    }
}
