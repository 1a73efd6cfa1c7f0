//! Slackline - Slack session credentials and tools from the command line
//!
//! Authenticates against Slack's web API with a browser session token
//! (`xoxc-`) and its `d` cookie (`xoxd-`), keeps them in the OS keyring, and
//! serves a few tools to MCP clients over stdio.
//!
//! ## Features
//!
//! - Two-stage credential validation: local prefix checks, then `auth.test`
//! - Secure credential storage (macOS Keychain, Windows Credential Manager, Linux Secret Service behind the kernel keyring)
//! - A time-bounded local cache of fetched Slack entities
//! - MCP tools: current date/time, user profiles, authentication status
//!
//! ## Architecture
//!
//! - **Auth**: bundles, credential sources, validation, keyring storage
//! - **Slack**: the authenticated Web API client
//! - **Cache**: the on-disk envelope and its TTL rules
//! - **Context**: per-run state passed explicitly between the steps
//! - **MCP**: JSON-RPC server and tool registry
//! - **Security**: secret strings and log sanitization

pub mod auth;
pub mod cache;
pub mod commands;
pub mod config;
pub mod context;
pub mod mcp;
pub mod security;
pub mod slack;

pub use commands::AppState;
pub use config::AppConfig;
pub use context::AppContext;
