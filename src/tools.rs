//! Gmail tools exposed to the agent
//!
//! Every tool takes a JSON object and returns a JSON string for the model to
//! read. Failures that the model should see as data (an invalid delete
//! request, a failed message in a batch) are part of the returned JSON;
//! everything else is an `Err` so the caller can decide whether to retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::MailProvider;
use crate::delete::{DeleteConfig, DeleteOperation};
use crate::error::{DeleteError, Result, TriageError};
use crate::models::DeleteRequest;

pub const SEARCH_TOOL: &str = "search_gmail";
pub const GET_MESSAGE_TOOL: &str = "get_gmail_message";
pub const DELETE_TOOL: &str = "delete_gmail";

const MISSING_TARGET_MESSAGE: &str = "You must specify message_ids or query.";
const NO_MATCH_MESSAGE: &str = "No messages matched query.";

/// A tool as advertised to the chat model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Individual tool handler
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<String>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Registry of available tools, listed in name order
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the three Gmail tools over one provider
    pub fn gmail(
        provider: Arc<dyn MailProvider>,
        delete_config: DeleteConfig,
        default_delete_limit: usize,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SearchGmailTool::new(provider.clone())));
        registry.register(Arc::new(GetGmailMessageTool::new(provider.clone())));
        registry.register(Arc::new(DeleteGmailTool::new(
            provider,
            delete_config,
            default_delete_limit,
        )));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        debug!("Registering tool: {}", handler.name());
        self.tools.insert(handler.name().to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|h| h.definition()).collect()
    }

    pub async fn execute(&self, tool_name: &str, input: Value) -> Result<String> {
        debug!("Executing tool: {} with input: {}", tool_name, input);

        let handler = self
            .get(tool_name)
            .ok_or_else(|| TriageError::ToolError(format!("Unknown tool: {}", tool_name)))?;

        match handler.execute(input).await {
            Ok(result) => {
                debug!("Tool {} succeeded", tool_name);
                Ok(result)
            }
            Err(e) => {
                warn!("Tool {} failed: {}", tool_name, e);
                Err(e)
            }
        }
    }
}

/// JSON schema for a tool's input object
pub fn json_schema(properties: Value, required: Vec<&str>) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn parse_args<T: serde::de::DeserializeOwned>(tool: &str, input: Value) -> Result<T> {
    serde_json::from_value(input)
        .map_err(|e| TriageError::ToolError(format!("Invalid arguments for {}: {}", tool, e)))
}

pub struct SearchGmailTool {
    provider: Arc<dyn MailProvider>,
}

impl SearchGmailTool {
    pub const DEFAULT_MAX_RESULTS: usize = 10;

    pub fn new(provider: Arc<dyn MailProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[async_trait]
impl ToolHandler for SearchGmailTool {
    fn name(&self) -> &str {
        SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search Gmail with a Gmail query (e.g. 'category:promotions older_than:30d') \
         and return id, thread id, subject, sender, date and snippet for each match."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            json!({
                "query": {
                    "type": "string",
                    "description": "Gmail search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of messages to return (default 10)"
                }
            }),
            vec!["query"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let args: SearchArgs = parse_args(SEARCH_TOOL, input)?;
        let limit = args.max_results.unwrap_or(Self::DEFAULT_MAX_RESULTS);

        let ids = self.provider.search(&args.query, limit).await?;

        let mut found = Vec::with_capacity(ids.len());
        let mut last_error = None;
        for id in ids.iter().take(limit) {
            // A message can vanish between list and get
            let detail = match self.provider.get_message(id).await {
                Ok(detail) => detail,
                Err(e) => {
                    warn!("Skipping message {} in search results: {}", id, e);
                    last_error = Some(e);
                    continue;
                }
            };
            found.push(json!({
                "id": detail.id,
                "thread_id": detail.thread_id,
                "subject": detail.subject,
                "from": detail.from,
                "date": detail.date.map(|d| d.to_rfc2822()),
                "snippet": detail.snippet,
            }));
        }

        if found.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        Ok(Value::Array(found).to_string())
    }
}

pub struct GetGmailMessageTool {
    provider: Arc<dyn MailProvider>,
}

impl GetGmailMessageTool {
    pub fn new(provider: Arc<dyn MailProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Deserialize)]
struct GetMessageArgs {
    message_id: String,
}

#[async_trait]
impl ToolHandler for GetGmailMessageTool {
    fn name(&self) -> &str {
        GET_MESSAGE_TOOL
    }

    fn description(&self) -> &str {
        "Fetch one Gmail message by id, including headers, labels and plain-text body."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            json!({
                "message_id": {
                    "type": "string",
                    "description": "Gmail message id"
                }
            }),
            vec!["message_id"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let args: GetMessageArgs = parse_args(GET_MESSAGE_TOOL, input)?;
        let detail = self.provider.get_message(&args.message_id).await?;
        Ok(serde_json::to_string(&detail)?)
    }
}

/// Permanent deletion through [`DeleteOperation`]
pub struct DeleteGmailTool {
    operation: DeleteOperation<Arc<dyn MailProvider>>,
    default_limit: usize,
}

impl DeleteGmailTool {
    pub fn new(provider: Arc<dyn MailProvider>, config: DeleteConfig, default_limit: usize) -> Self {
        Self {
            operation: DeleteOperation::new(provider, config),
            default_limit,
        }
    }
}

#[derive(Deserialize)]
struct DeleteArgs {
    #[serde(default)]
    message_ids: Option<Vec<String>>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    dry_run: Option<bool>,
    #[serde(default)]
    max_results: Option<usize>,
}

#[async_trait]
impl ToolHandler for DeleteGmailTool {
    fn name(&self) -> &str {
        DELETE_TOOL
    }

    fn description(&self) -> &str {
        "Permanently delete Gmail messages (bypasses Trash). Give explicit message_ids, \
         or a Gmail query whose first max_results matches are deleted. \
         Set dry_run to only report what would be deleted."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            json!({
                "message_ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Message ids to delete; takes precedence over query"
                },
                "query": {
                    "type": "string",
                    "description": "Gmail search query selecting messages to delete"
                },
                "dry_run": {
                    "type": "boolean",
                    "description": "Simulate without deleting (default false)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum messages a query may delete (default 20)"
                }
            }),
            vec![],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let args: DeleteArgs = parse_args(DELETE_TOOL, input)?;
        let request = DeleteRequest {
            message_ids: args.message_ids.unwrap_or_default(),
            query: args.query,
            simulate: args.dry_run.unwrap_or(false),
            limit: args.max_results.unwrap_or(self.default_limit),
        };

        let report = match self.operation.execute(&request).await {
            Ok(report) => report,
            Err(DeleteError::Validation(reason)) => {
                let error = if request.target().is_none() {
                    MISSING_TARGET_MESSAGE.to_string()
                } else {
                    reason
                };
                return Ok(json!({ "success": false, "error": error }).to_string());
            }
            Err(DeleteError::Resolution(e)) => return Err(e),
        };

        if report.is_empty() {
            return Ok(json!({
                "success": true,
                "deleted": [],
                "message": NO_MATCH_MESSAGE,
            })
            .to_string());
        }

        Ok(json!({
            "success": true,
            "dry_run": report.dry_run,
            "deleted_count": report.deleted_count,
            "simulated_count": report.simulated_count,
            "errors": report.errors,
            "results": report.outcomes,
        })
        .to_string())
    }
}
