//! Conversational agent that drives the Gmail tools
//!
//! A turn appends the user's input to the thread's history and then loops:
//! ask the model, run whatever tools it requested, feed the results back.
//! The loop ends when the model calls `respond`, answers in plain text, or
//! the per-turn model call budget runs out.

pub mod llm;
pub mod prompt;
pub mod retry;
pub mod summarize;
pub mod todos;

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AgentConfig, SummarizationConfig};
use crate::error::Result;
use crate::models::AgentResponse;
use crate::tools::{json_schema, ToolDefinition, ToolRegistry};

pub use llm::{ChatMessage, ChatModel, ChatResponse, ChatRole, OpenAiCompatibleModel, ToolCall};
pub use retry::ToolRetryPolicy;
pub use todos::{TodoItem, TodoStatus};

pub const RESPOND_TOOL: &str = "respond";

/// Intermediate step of a turn, reported as it happens
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    ModelText(String),
    ToolCall { name: String, arguments: Value },
    ToolResult { name: String, output: String, is_error: bool },
    Summarized,
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Maximum model calls per turn
    pub recursion_limit: u32,
    pub retry: ToolRetryPolicy,
    pub summarization: SummarizationConfig,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for AgentOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            recursion_limit: config.recursion_limit,
            retry: ToolRetryPolicy::from(&config.retry),
            summarization: config.summarization.clone(),
        }
    }
}

/// History and plan of one conversation thread
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub messages: Vec<ChatMessage>,
    pub todos: Vec<TodoItem>,
}

pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    options: AgentOptions,
    sessions: HashMap<String, Session>,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry, options: AgentOptions) -> Self {
        Self {
            model,
            tools,
            options,
            sessions: HashMap::new(),
        }
    }

    pub fn session(&self, thread_id: &str) -> Option<&Session> {
        self.sessions.get(thread_id)
    }

    /// Every tool offered to the model, Gmail tools first
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = self.tools.definitions();
        definitions.push(todos::definition());
        definitions.push(respond_definition());
        definitions
    }

    pub async fn run_turn(&mut self, thread_id: &str, input: &str) -> Result<AgentResponse> {
        self.run_turn_with(thread_id, input, &mut |_| {}).await
    }

    /// Run one turn on `thread_id`, reporting each step to `observer`
    pub async fn run_turn_with(
        &mut self,
        thread_id: &str,
        input: &str,
        observer: &mut dyn FnMut(&AgentEvent),
    ) -> Result<AgentResponse> {
        let definitions = self.tool_definitions();
        let session = self.sessions.entry(thread_id.to_string()).or_default();
        session.messages.push(ChatMessage::user(input));

        let turn = Turn {
            model: self.model.as_ref(),
            tools: &self.tools,
            options: &self.options,
            definitions: &definitions,
        };
        turn.run(session, observer).await
    }
}

struct Turn<'a> {
    model: &'a dyn ChatModel,
    tools: &'a ToolRegistry,
    options: &'a AgentOptions,
    definitions: &'a [ToolDefinition],
}

/// Outcome of the most recent failed tool call in a turn
struct ToolFailure {
    kind: &'static str,
    detail: String,
}

impl Turn<'_> {
    async fn run(
        &self,
        session: &mut Session,
        observer: &mut dyn FnMut(&AgentEvent),
    ) -> Result<AgentResponse> {
        match summarize::summarize_if_needed(
            self.model,
            &mut session.messages,
            &self.options.summarization,
        )
        .await
        {
            Ok(true) => observer(&AgentEvent::Summarized),
            Ok(false) => {}
            Err(e) => warn!("Failed to summarize conversation history: {}", e),
        }

        let mut last_tool: Option<String> = None;
        let mut last_failure: Option<ToolFailure> = None;

        for step in 0..self.options.recursion_limit {
            debug!("Model call {} of at most {}", step + 1, self.options.recursion_limit);

            let response = self
                .model
                .chat(&self.request(session), self.definitions)
                .await?;

            if let Some(text) = &response.text {
                observer(&AgentEvent::ModelText(text.clone()));
            }

            if response.tool_calls.is_empty() {
                let text = response.text.unwrap_or_default();
                session.messages.push(ChatMessage::assistant(text.clone()));
                return Ok(finish(AgentResponse::text(text), last_tool, last_failure));
            }

            session.messages.push(ChatMessage::assistant_tool_calls(
                response.text.unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            let mut structured: Option<AgentResponse> = None;

            for call in response.tool_calls {
                observer(&AgentEvent::ToolCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });

                let (output, is_error) = match call.name.as_str() {
                    RESPOND_TOOL => {
                        match serde_json::from_value::<AgentResponse>(call.arguments.clone()) {
                            Ok(parsed) => {
                                structured = Some(parsed);
                                ("Response recorded.".to_string(), false)
                            }
                            Err(e) => (format!("Error: invalid response: {}", e), true),
                        }
                    }
                    todos::WRITE_TODOS_TOOL => {
                        match todos::apply(&mut session.todos, call.arguments.clone()) {
                            Ok(out) => (out, false),
                            Err(e) => (format!("Error: {}", e), true),
                        }
                    }
                    name => {
                        last_tool = Some(name.to_string());
                        let result = self
                            .options
                            .retry
                            .run(name, || self.tools.execute(name, call.arguments.clone()))
                            .await;

                        match result {
                            Ok(out) => {
                                last_failure = None;
                                (out, false)
                            }
                            Err(e) => {
                                let output = format!("Error: {}", e);
                                last_failure = Some(ToolFailure {
                                    kind: e.kind(),
                                    detail: e.to_string(),
                                });
                                (output, true)
                            }
                        }
                    }
                };

                observer(&AgentEvent::ToolResult {
                    name: call.name.clone(),
                    output: output.clone(),
                    is_error,
                });
                session.messages.push(ChatMessage::tool_result(call.id, output));
            }

            if let Some(response) = structured {
                info!("Turn finished with structured response (success={})", response.success);
                return Ok(finish(response, last_tool, last_failure));
            }
        }

        warn!(
            "Turn stopped after {} model calls without a final answer",
            self.options.recursion_limit
        );
        Ok(AgentResponse::failure(
            "I had to stop before finishing this request.",
            "RecursionLimit",
            format!(
                "Reached the limit of {} model calls for one turn",
                self.options.recursion_limit
            ),
        ))
    }

    fn request(&self, session: &Session) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(session.messages.len() + 2);
        messages.push(ChatMessage::system(prompt::SYSTEM_PROMPT));
        if let Some(plan) = todos::render(&session.todos) {
            messages.push(ChatMessage::system(plan));
        }
        messages.extend(session.messages.iter().cloned());
        messages
    }
}

/// Fill in what the model left out: the tool it used and an unresolved tool failure
fn finish(
    mut response: AgentResponse,
    last_tool: Option<String>,
    last_failure: Option<ToolFailure>,
) -> AgentResponse {
    if response.tool_name.is_none() {
        response.tool_name = last_tool;
    }
    if let Some(failure) = last_failure {
        if response.error_type.is_none() {
            response.success = false;
            response.error_type = Some(failure.kind.to_string());
            response.error_message = Some(failure.detail);
        }
    }
    response
}

fn respond_definition() -> ToolDefinition {
    ToolDefinition {
        name: RESPOND_TOOL.to_string(),
        description: "Give the final answer for this turn.".to_string(),
        input_schema: json_schema(
            json!({
                "message": {
                    "type": "string",
                    "description": "Cleaned natural language response to the user"
                },
                "deleted_subjects": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Subject lines of the emails that were deleted"
                },
                "tool_name": {
                    "type": "string",
                    "description": "Name of the tool used, if any"
                },
                "error_type": {
                    "type": "string",
                    "description": "Type of error, if any occurred"
                },
                "error_message": {
                    "type": "string",
                    "description": "Detailed error message"
                },
                "success": {
                    "type": "boolean",
                    "description": "Whether the request completed successfully"
                }
            }),
            vec!["message"],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request
    struct ScriptedModel {
        replies: Mutex<VecDeque<ChatResponse>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, messages: &[ChatMessage], _tools: &[ToolDefinition]) -> Result<ChatResponse> {
            self.requests.lock().unwrap().push(messages.to_vec());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ChatResponse::text("out of script")))
        }
    }

    fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    fn agent(model: Arc<ScriptedModel>, options: AgentOptions) -> Agent {
        Agent::new(model, ToolRegistry::new(), options)
    }

    #[tokio::test]
    async fn test_plain_text_answer() {
        let model = ScriptedModel::new(vec![ChatResponse::text("Your inbox looks clean.")]);
        let mut agent = agent(model.clone(), AgentOptions::default());

        let response = agent.run_turn("default", "anything to delete?").await.unwrap();

        assert!(response.success);
        assert_eq!(response.message, "Your inbox looks clean.");
        let history = &agent.session("default").unwrap().messages;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].role, ChatRole::Assistant);

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0][0].content, prompt::SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_respond_tool_ends_turn() {
        let model = ScriptedModel::new(vec![ChatResponse::tool_calls(vec![call(
            "c1",
            RESPOND_TOOL,
            json!({"message": "Deleted 2 emails", "deleted_subjects": ["Sale", "Promo"]}),
        )])]);
        let mut agent = agent(model, AgentOptions::default());

        let response = agent.run_turn("t", "clean up").await.unwrap();

        assert_eq!(response.message, "Deleted 2 emails");
        assert_eq!(
            response.deleted_subjects,
            Some(vec!["Sale".to_string(), "Promo".to_string()])
        );
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_unknown_tool_marks_turn_failed() {
        let model = ScriptedModel::new(vec![
            ChatResponse::tool_calls(vec![call("c1", "archive_gmail", json!({}))]),
            ChatResponse::tool_calls(vec![call("c2", RESPOND_TOOL, json!({"message": "Could not archive"}))]),
        ]);
        let mut agent = agent(model.clone(), AgentOptions::default());

        let mut events = Vec::new();
        let response = agent
            .run_turn_with("t", "archive everything", &mut |e| events.push(e.clone()))
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(response.error_type.as_deref(), Some("ToolError"));
        assert_eq!(response.tool_name.as_deref(), Some("archive_gmail"));
        assert!(events.iter().any(|e| matches!(
            e,
            AgentEvent::ToolResult { is_error: true, name, .. } if name == "archive_gmail"
        )));

        // The second request carries the error back to the model
        let requests = model.requests.lock().unwrap();
        let last = requests[1].last().unwrap();
        assert_eq!(last.role, ChatRole::Tool);
        assert!(last.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_recursion_limit() {
        let replies = (0..5)
            .map(|i| ChatResponse::tool_calls(vec![call(&format!("c{}", i), "write_todos", json!({"todos": []}))]))
            .collect();
        let model = ScriptedModel::new(replies);
        let options = AgentOptions {
            recursion_limit: 3,
            ..AgentOptions::default()
        };
        let mut agent = agent(model.clone(), options);

        let response = agent.run_turn("t", "loop forever").await.unwrap();

        assert!(!response.success);
        assert_eq!(response.error_type.as_deref(), Some("RecursionLimit"));
        assert_eq!(model.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_todos_are_shown_to_model() {
        let model = ScriptedModel::new(vec![
            ChatResponse::tool_calls(vec![call(
                "c1",
                todos::WRITE_TODOS_TOOL,
                json!({"todos": [{"content": "find newsletters", "status": "in_progress"}]}),
            )]),
            ChatResponse::text("Working on it."),
        ]);
        let mut agent = agent(model.clone(), AgentOptions::default());

        agent.run_turn("t", "remove newsletters").await.unwrap();

        assert_eq!(agent.session("t").unwrap().todos.len(), 1);
        let requests = model.requests.lock().unwrap();
        assert!(requests[1][1].content.contains("[~] find newsletters"));
    }

    #[tokio::test]
    async fn test_threads_are_separate() {
        let model = ScriptedModel::new(vec![ChatResponse::text("a"), ChatResponse::text("b")]);
        let mut agent = agent(model.clone(), AgentOptions::default());

        agent.run_turn("one", "first").await.unwrap();
        agent.run_turn("two", "second").await.unwrap();

        assert_eq!(agent.session("one").unwrap().messages.len(), 2);
        assert_eq!(agent.session("two").unwrap().messages[0].content, "second");
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[1].len(), 2);
    }

    #[test]
    fn test_tool_definitions_include_builtins() {
        let agent = agent(ScriptedModel::new(vec![]), AgentOptions::default());
        let names: Vec<_> = agent.tool_definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["write_todos", "respond"]);
    }
}
