//! Conversation history summarization
//!
//! Once a session's history grows past the configured token estimate, every
//! message except the most recent ones is condensed into one system note.

use tracing::{debug, info};

use super::llm::{ChatMessage, ChatModel, ChatRole};
use crate::config::SummarizationConfig;
use crate::error::{Result, TriageError};

pub const SUMMARY_PROMPT: &str = "Summarize the conversation so far focusing on Gmail inbox \
     triage decisions, including which mails were deleted, kept, and why. \
     Maintain important context for future decisions.";

const SUMMARY_HEADER: &str = "Summary of the earlier conversation:";

/// Token estimate of four characters per token
pub fn estimate_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(ChatMessage::char_len).sum::<usize>() / 4
}

/// Index of the first message kept verbatim, or `None` when nothing needs summarizing.
///
/// Tool results are never separated from the assistant message that requested them.
fn split_point(history: &[ChatMessage], keep: usize) -> Option<usize> {
    let mut split = history.len().checked_sub(keep)?;
    while split < history.len() && history[split].role == ChatRole::Tool {
        split += 1;
    }
    (split > 0).then_some(split)
}

fn transcript(messages: &[ChatMessage]) -> String {
    let mut text = String::new();
    for message in messages {
        let role = match message.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        };
        if !message.content.is_empty() {
            text.push_str(&format!("{}: {}\n", role, message.content));
        }
        for call in &message.tool_calls {
            text.push_str(&format!("{} called {} with {}\n", role, call.name, call.arguments));
        }
    }
    text
}

/// Summarize older history in place. Returns whether a summary was produced.
pub async fn summarize_if_needed(
    model: &dyn ChatModel,
    history: &mut Vec<ChatMessage>,
    config: &SummarizationConfig,
) -> Result<bool> {
    let estimated = estimate_tokens(history);
    if !config.enabled || estimated <= config.max_tokens_before_summary {
        return Ok(false);
    }

    let Some(split) = split_point(history, config.messages_to_keep) else {
        debug!(
            "History over threshold ({} tokens) but only {} messages, nothing to summarize",
            estimated,
            history.len()
        );
        return Ok(false);
    };

    info!(
        "Summarizing {} older messages (~{} tokens), keeping {}",
        split,
        estimated,
        history.len() - split
    );

    let request = [
        ChatMessage::system(SUMMARY_PROMPT),
        ChatMessage::user(transcript(&history[..split])),
    ];
    let summary = model
        .chat(&request, &[])
        .await?
        .text
        .ok_or_else(|| TriageError::LlmError("Summarization returned no text".to_string()))?;

    let kept = history.split_off(split);
    *history = std::iter::once(ChatMessage::system(format!("{}\n{}", SUMMARY_HEADER, summary)))
        .chain(kept)
        .collect();

    Ok(true)
}
