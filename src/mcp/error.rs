//! Error types for the tool server

use thiserror::Error;

use crate::cache::CacheError;
use crate::slack::SlackError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Tool server errors
#[derive(Error, Debug)]
pub enum Error {
    /// Message is valid JSON but not a JSON-RPC message
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No tool with that name
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Bad tool arguments
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Tool needs Slack credentials and none were validated
    #[error("not authenticated: run `slackline setup` first")]
    NotAuthenticated,

    /// Slack API failure
    #[error("slack error: {0}")]
    Slack(#[from] SlackError),

    /// Cache write failure
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error on the transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// JSON-RPC error code for this error
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidRequest(_) => codes::INVALID_REQUEST,
            Error::ToolNotFound(_) => codes::METHOD_NOT_FOUND,
            Error::InvalidParams(_) => codes::INVALID_PARAMS,
            Error::NotAuthenticated => codes::NOT_AUTHENTICATED,
            Error::Slack(_) => codes::SLACK_ERROR,
            Error::Serialization(_) => codes::PARSE_ERROR,
            Error::Io(_) => codes::IO_ERROR,
            Error::Cache(_) => codes::INTERNAL_ERROR,
        }
    }
}

/// JSON-RPC error codes
pub mod codes {
    /// Parse error
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid request
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// No validated credentials
    pub const NOT_AUTHENTICATED: i32 = -32000;
    /// Slack API call failed
    pub const SLACK_ERROR: i32 = -32001;
    /// Transport I/O failed
    pub const IO_ERROR: i32 = -32002;
}
