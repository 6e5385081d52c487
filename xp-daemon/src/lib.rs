//! xp-daemon - Disqualification malus engine
//!
//! Charges an XP penalty when a bot unassigns a contributor right after
//! disqualifying them, and answers XP balance queries:
//! - Timeline correlation of the unassignment and the disqualifier comment
//! - Participant discovery across the work item and its closing pull requests
//! - Privilege classification via organization role or repository permission
//! - Report-or-ban policy against a configured threshold
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              MalusEngine                │
//! │   (evaluate_unassignment entry point)   │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │ GithubApi   │       │ Ledger      │
//! │ (REST/Mock) │       │ (xp-ledger) │
//! └─────────────┘       └─────────────┘
//! ```

pub mod actor;
pub mod balance;
pub mod collaborators;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod format;
pub mod github;
pub mod involvement;
pub mod malus;
pub mod sanction;
pub mod timeline;

// Re-export main types for convenience
pub use actor::{is_bot_actor, Actor, ActorKind};
pub use balance::{BalanceService, UserBalance};
pub use command::XpCommandHandler;
pub use config::{Args, Command, LogFormat, Settings};
pub use engine::{EvaluationOutcome, MalusApplication, MalusEngine, SkipReason};
pub use error::EngineError;
pub use event::{CommentEvent, UnassignedEvent};
pub use github::{GithubApi, GithubError, MockGithub, RestGithubClient};
pub use sanction::SanctionOutcome;
