//! Conversation message schema.
//!
//! Messages are immutable once appended to a log. Ordering is the only
//! guarantee the completion client relies on.

use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Tool metadata carried by assistant tool-call messages and tool-result
/// messages. Opaque to the dispatch loop; interpreted only by the
/// completion client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecord {
    /// Provider-assigned tool call id, echoed back in the result message.
    pub call_id: String,
    /// Tool name, e.g. "run_query".
    pub name: String,
    /// JSON-encoded arguments as the model produced them.
    pub arguments: String,
}

/// One entry in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Present on tool-call and tool-result messages only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolRecord>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool: None,
        }
    }

    /// Assistant message that requests a tool invocation.
    pub fn tool_call(call_id: &str, name: &str, arguments: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool: Some(ToolRecord {
                call_id: call_id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }),
        }
    }

    /// Tool-result message answering a prior tool call.
    pub fn tool_result(call_id: &str, name: &str, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool: Some(ToolRecord {
                call_id: call_id.to_string(),
                name: name.to_string(),
                arguments: String::new(),
            }),
        }
    }
}
