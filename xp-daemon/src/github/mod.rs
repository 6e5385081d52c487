//! Issue-tracking platform abstraction.
//!
//! - `GithubApi`: the trait the engine is written against
//! - `RestGithubClient`: REST + GraphQL implementation over `reqwest`
//! - `MockGithub`: scripted implementation for tests

pub mod mock;
pub mod rest;
pub mod traits;
pub mod types;

pub use mock::MockGithub;
pub use rest::{RestGithubClient, DEFAULT_API_URL};
pub use traits::{GithubApi, GithubError};
pub use types::*;
