//! Authenticated Slack Web API client
//!
//! Sends the session token as a bearer credential and the `d` cookie in the
//! `Cookie` header, which is what Slack expects for `xoxc-` tokens.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::types::{AuthTestResponse, SlackError, SlackUser};
use crate::auth::cookie_header;
use crate::security::Sanitizer;

/// Default Slack Web API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Configuration for the Slack client
#[derive(Debug, Clone, PartialEq)]
pub struct SlackClientConfig {
    /// API base URL
    pub api_base_url: String,
    /// Request timeout; `None` leaves requests unbounded
    pub timeout: Option<Duration>,
}

impl Default for SlackClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl SlackClientConfig {
    /// Creates a config with custom base URL (for testing)
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            api_base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

/// Slack Web API client bound to one token and cookie
#[derive(Debug, Clone)]
pub struct SlackClient {
    client: Client,
    api_base_url: String,
}

impl SlackClient {
    /// Creates a client authenticated with `token` and `cookie`
    pub fn new(token: &str, cookie: &str, config: &SlackClientConfig) -> Result<Self, SlackError> {
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let mut cookie = HeaderValue::from_str(&cookie_header(cookie))?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);

        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("slackline/", env!("CARGO_PKG_VERSION"))),
        );

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!(
            "Creating Slack client for {} with token {}",
            config.api_base_url,
            Sanitizer::sanitize_token(token)
        );

        Ok(Self {
            client: builder.build()?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Calls a Web API method and returns its body
    ///
    /// Fails on non-success HTTP status and on `ok: false`.
    async fn api_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<T, SlackError> {
        let url = format!("{}/{}", self.api_base_url, method);
        tracing::debug!("Calling {}", Sanitizer::sanitize_url(&url));

        let response = self.client.post(&url).form(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(
                body.char_indices()
                    .nth(MAX_ERROR_BODY)
                    .map_or(body.len(), |(i, _)| i),
            );
            tracing::warn!("{} failed: {} - {}", method, status, body);
            return Err(SlackError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SlackError::Parse(format!("{} returned invalid JSON: {}", method, e)))?;

        #[derive(Deserialize)]
        struct Envelope {
            ok: bool,
            #[serde(default)]
            error: Option<String>,
        }

        let envelope: Envelope = serde_json::from_value(value.clone())
            .map_err(|e| SlackError::Parse(format!("{} response: {}", method, e)))?;
        if !envelope.ok {
            return Err(SlackError::Api(
                envelope.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| SlackError::Parse(format!("{} response: {}", method, e)))
    }

    /// Confirms the credentials and returns who they belong to
    pub async fn auth_test(&self) -> Result<AuthTestResponse, SlackError> {
        self.api_call("auth.test", &[]).await
    }

    /// Looks up one user
    pub async fn user_info(&self, user_id: &str) -> Result<SlackUser, SlackError> {
        #[derive(Deserialize)]
        struct UserInfo {
            user: SlackUser,
        }

        let info: UserInfo = self.api_call("users.info", &[("user", user_id)]).await?;
        Ok(info.user)
    }
}
