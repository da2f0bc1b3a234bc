use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, TriageError};
use crate::tools::{json_schema, ToolDefinition};

pub const WRITE_TODOS_TOOL: &str = "write_todos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
}

#[derive(Deserialize)]
struct WriteTodosArgs {
    todos: Vec<TodoItem>,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: WRITE_TODOS_TOOL.to_string(),
        description: "Replace the plan for the current task. Send the full list every time."
            .to_string(),
        input_schema: json_schema(
            json!({
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "content": { "type": "string" },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"]
                            }
                        },
                        "required": ["content", "status"]
                    }
                }
            }),
            vec!["todos"],
        ),
    }
}

/// Replace `todos` with the list in `input` and return the tool output
pub fn apply(todos: &mut Vec<TodoItem>, input: Value) -> Result<String> {
    let args: WriteTodosArgs = serde_json::from_value(input)
        .map_err(|e| TriageError::ToolError(format!("Invalid arguments for write_todos: {}", e)))?;

    *todos = args.todos;
    Ok(format!("Updated todo list to {}", serde_json::to_string(&*todos)?))
}

/// Plan rendered as a system note, or `None` when there is no plan
pub fn render(todos: &[TodoItem]) -> Option<String> {
    if todos.is_empty() {
        return None;
    }

    let mut text = String::from("Current plan:");
    for item in todos {
        let marker = match item.status {
            TodoStatus::Pending => "[ ]",
            TodoStatus::InProgress => "[~]",
            TodoStatus::Completed => "[x]",
        };
        text.push_str(&format!("\n{} {}", marker, item.content));
    }
    Some(text)
}
