//! Tool definitions and registry

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::error::{Error, Result};
use super::protocol::{ToolCallResult, ToolDefinition};
use crate::cache::CacheStore;
use crate::context::AppContext;
use crate::slack::{SlackClient, SlackUser};

/// A callable tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and argument schema
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool
    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult>;
}

/// State the tools work against
pub struct ToolContext {
    /// Context of the current run
    pub app: Arc<Mutex<AppContext>>,
    /// Authenticated client; `None` when no credentials were validated
    pub slack: Option<SlackClient>,
    /// Where the envelope is loaded from and saved to
    pub cache: CacheStore,
}

impl ToolContext {
    /// Creates an unauthenticated tool context
    pub fn new(app: AppContext, cache: CacheStore) -> Self {
        Self {
            app: Arc::new(Mutex::new(app)),
            slack: None,
            cache,
        }
    }

    /// Attaches an authenticated Slack client
    pub fn with_slack(mut self, client: SlackClient) -> Self {
        self.slack = Some(client);
        self
    }

    /// Writes the in-memory envelope back to disk
    pub async fn save_cache(&self) -> Result<()> {
        let app = self.app.lock().await;
        self.cache.save(&app).await?;
        Ok(())
    }
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    context: Arc<ToolContext>,
}

impl ToolRegistry {
    /// Creates a registry with the built-in tools
    pub fn new(context: ToolContext) -> Self {
        let mut registry = Self {
            tools: BTreeMap::new(),
            context: Arc::new(context),
        };
        registry.register(Arc::new(CurrentDateTimeTool));
        registry.register(Arc::new(UserProfileTool));
        registry.register(Arc::new(AuthStatusTool));
        registry
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Tool definitions, ordered by name
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Executes a tool by name
    pub async fn execute(&self, name: &str, arguments: serde_json::Value) -> Result<ToolCallResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;

        tool.execute(arguments, &self.context).await
    }

    /// Registers a tool, replacing any with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: serde_json::Value) -> Result<T> {
    // Clients send `null` or nothing when a tool takes no arguments
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| Error::InvalidParams(e.to_string()))
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Current date and time
pub struct CurrentDateTimeTool;

#[derive(Debug, Deserialize)]
struct DateTimeArgs {
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

fn format_datetime<Tz: TimeZone>(now: DateTime<Tz>, format: Option<&str>) -> Result<String>
where
    Tz::Offset: std::fmt::Display,
{
    let Some(format) = format else {
        return Ok(now.to_rfc3339());
    };

    let items = StrftimeItems::new(format);
    if items.clone().any(|item| matches!(item, Item::Error)) {
        return Err(Error::InvalidParams(format!(
            "invalid format string: {}",
            format
        )));
    }

    let mut out = String::new();
    write!(out, "{}", now.format_with_items(items))
        .map_err(|_| Error::InvalidParams(format!("cannot apply format: {}", format)))?;
    Ok(out)
}

#[async_trait::async_trait]
impl Tool for CurrentDateTimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_current_datetime".into(),
            description: "Get the current date and time, in RFC 3339 by default.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "timezone": {
                        "type": "string",
                        "enum": ["utc", "local"],
                        "description": "Time zone to report in (default: utc)"
                    },
                    "format": {
                        "type": "string",
                        "description": "strftime-style format, e.g. %Y-%m-%d %H:%M"
                    }
                },
                "required": []
            }),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: DateTimeArgs = parse_args(arguments)?;
        let format = args.format.as_deref();

        let text = match args.timezone.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("utc") => format_datetime(Utc::now(), format)?,
            Some("local") => format_datetime(Local::now(), format)?,
            Some(other) => {
                return Err(Error::InvalidParams(format!("unknown timezone: {}", other)));
            }
        };

        Ok(ToolCallResult::text(text))
    }
}

/// Slack user lookup, served from the cache when possible
pub struct UserProfileTool;

#[derive(Debug, Deserialize)]
struct UserProfileArgs {
    user_id: String,
}

fn profile_json(user: &SlackUser, cached: bool) -> serde_json::Value {
    json!({
        "id": user.id,
        "name": user.name,
        "display_name": user.display_name(),
        "real_name": user.real_name.as_ref().or(user.profile.real_name.as_ref()),
        "title": user.profile.title,
        "email": user.profile.email,
        "tz": user.tz,
        "is_bot": user.is_bot,
        "deleted": user.deleted,
        "cached": cached,
    })
}

#[async_trait::async_trait]
impl Tool for UserProfileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_user_profile".into(),
            description: "Look up a Slack user's profile by user id.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "user_id": {
                        "type": "string",
                        "description": "Slack user id, e.g. U012AB3CD"
                    }
                },
                "required": ["user_id"]
            }),
        }
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let args: UserProfileArgs = parse_args(arguments)?;
        let user_id = args.user_id.trim();
        if user_id.is_empty() {
            return Err(Error::InvalidParams("user_id must not be empty".into()));
        }

        let mut app = context.app.lock().await;

        if let Some(entity) = context.cache.load(&mut app).await.entity(user_id) {
            match serde_json::from_value::<SlackUser>(entity.clone()) {
                Ok(user) => {
                    tracing::debug!("Serving {} from cache", user_id);
                    return ToolCallResult::json(&profile_json(&user, true));
                }
                Err(e) => tracing::warn!("Ignoring unreadable cached user {}: {}", user_id, e),
            }
        }

        let slack = context.slack.as_ref().ok_or(Error::NotAuthenticated)?;
        let user = slack.user_info(user_id).await?;

        let entity = serde_json::to_value(&user)?;
        context
            .cache
            .load(&mut app)
            .await
            .insert_entity(user_id, entity);

        ToolCallResult::json(&profile_json(&user, false))
    }
}

/// Reports who the server is authenticated as
pub struct AuthStatusTool;

#[async_trait::async_trait]
impl Tool for AuthStatusTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "auth_status".into(),
            description: "Show the authenticated Slack user and workspace.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(
        &self,
        _arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolCallResult> {
        let app = context.app.lock().await;

        let status = match app.identity() {
            Some(identity) => json!({
                "authenticated": true,
                "workspace": app.workspace,
                "user": identity.user,
                "user_id": identity.user_id,
                "team": identity.team,
                "team_id": identity.team_id,
                "url": identity.url,
            }),
            None => json!({
                "authenticated": false,
                "workspace": app.workspace,
            }),
        };

        ToolCallResult::json(&status)
    }
}
