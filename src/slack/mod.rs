//! Slack Web API module
//!
//! Only the calls the CLI and its tools need: `auth.test` for the identity
//! round-trip and `users.info` for profile lookups.

mod client;
mod types;

pub use client::{SlackClient, SlackClientConfig, DEFAULT_API_BASE_URL};
pub use types::*;
