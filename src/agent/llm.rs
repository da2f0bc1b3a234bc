//! Chat model abstraction and the OpenAI-compatible transport

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionFunctionsArgs, ChatCompletionMessageToolCall,
    ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionCall,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::AgentConfig;
use crate::error::{Result, TriageError};
use crate::tools::ToolDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Provider-agnostic chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool results, naming the call they answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(ChatRole::Assistant, content)
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(ChatRole::Tool, content)
        }
    }

    /// Rough size in characters, including tool call arguments
    pub fn char_len(&self) -> usize {
        self.content.len()
            + self
                .tool_calls
                .iter()
                .map(|c| c.name.len() + c.arguments.to_string().len())
                .sum::<usize>()
    }
}

/// One model reply: optional text plus any tool calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: None,
            tool_calls,
        }
    }
}

/// A chat completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Result<ChatResponse>;
}

/// Chat model reached through an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiCompatibleModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleModel {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Self {
            client: Client::with_config(config),
            model: model.into(),
            temperature,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| TriageError::ConfigError("Missing GOOGLE_API_KEY".to_string()))?;

        Ok(Self::new(
            api_key,
            config.api_base.as_str(),
            config.model.as_str(),
            config.temperature,
        ))
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleModel {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Result<ChatResponse> {
        let request_messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(self.model.as_str())
            .messages(request_messages)
            .temperature(self.temperature);

        if !tools.is_empty() {
            request.tools(tools.iter().map(to_request_tool).collect::<Result<Vec<_>>>()?);
        }

        debug!(
            "Sending {} messages and {} tools to {}",
            messages.len(),
            tools.len(),
            self.model
        );

        let response = self.client.chat().create(request.build()?).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TriageError::LlmError("Response contained no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: parse_arguments(&call.function.arguments),
            })
            .collect();

        Ok(ChatResponse {
            text: choice.message.content.filter(|t| !t.trim().is_empty()),
            tool_calls,
        })
    }
}

/// Malformed argument JSON is passed through as a string so the tool rejects it
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let built: ChatCompletionRequestMessage = match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.as_str())
            .build()?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.as_str())
            .build()?
            .into(),
        ChatRole::Assistant => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            args.content(message.content.as_str());
            if !message.tool_calls.is_empty() {
                args.tool_calls(
                    message
                        .tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            args.build()?.into()
        }
        ChatRole::Tool => ChatCompletionRequestToolMessageArgs::default()
            .content(message.content.as_str())
            .tool_call_id(message.tool_call_id.clone().unwrap_or_default())
            .build()?
            .into(),
    };
    Ok(built)
}

fn to_request_tool(tool: &ToolDefinition) -> Result<ChatCompletionTool> {
    let function = ChatCompletionFunctionsArgs::default()
        .name(tool.name.as_str())
        .description(tool.description.as_str())
        .parameters(tool.input_schema.clone())
        .build()?;

    Ok(ChatCompletionToolArgs::default()
        .r#type(ChatCompletionToolType::Function)
        .function(function)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(r#"{"query": "in:inbox"}"#), json!({"query": "in:inbox"}));
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{oops"), json!("{oops"));
    }

    #[test]
    fn test_char_len_counts_tool_calls() {
        let message = ChatMessage::assistant_tool_calls(
            "ok",
            vec![ToolCall {
                id: "c1".to_string(),
                name: "search_gmail".to_string(),
                arguments: json!({"q": 1}),
            }],
        );
        assert_eq!(message.char_len(), 2 + "search_gmail".len() + r#"{"q":1}"#.len());
    }

    #[test]
    fn test_every_role_converts() {
        let messages = [
            ChatMessage::system("be careful"),
            ChatMessage::user("delete spam"),
            ChatMessage::assistant_tool_calls(
                "",
                vec![ToolCall {
                    id: "c1".to_string(),
                    name: "delete_gmail".to_string(),
                    arguments: json!({"query": "is:spam"}),
                }],
            ),
            ChatMessage::tool_result("c1", "{}"),
            ChatMessage::assistant("done"),
        ];

        for message in &messages {
            assert!(to_request_message(message).is_ok());
        }
    }

    #[test]
    fn test_tool_definition_converts_to_function_tool() {
        let definition = ToolDefinition {
            name: "delete_gmail".to_string(),
            description: "Delete Gmail messages".to_string(),
            input_schema: json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        };

        let tool = to_request_tool(&definition).unwrap();
        let wire = serde_json::to_value(&tool).unwrap();

        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "delete_gmail");
        assert_eq!(wire["function"]["description"], "Delete Gmail messages");
        assert_eq!(wire["function"]["parameters"]["properties"]["query"]["type"], "string");
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = AgentConfig::default();
        assert!(matches!(
            OpenAiCompatibleModel::from_config(&config),
            Err(TriageError::ConfigError(_))
        ));

        let config = AgentConfig {
            api_key: Some("k".to_string()),
            ..AgentConfig::default()
        };
        let model = OpenAiCompatibleModel::from_config(&config).unwrap();
        assert_eq!(model.model(), "gemini-2.5-flash");
    }
}
