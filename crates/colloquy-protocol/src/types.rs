//! Canonical message model shared with the agent server

use serde::{Deserialize, Serialize};

/// Opaque identifier naming one conversation thread.
///
/// New threads are named client-side from the current epoch millis; the
/// server adopts the same id when persisting the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Wrap an existing thread id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh thread id for a new conversation
    pub fn generate() -> Self {
        Self(format!("conv-{}", chrono::Utc::now().timestamp_millis()))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A tool invocation recorded on an assistant message.
///
/// Carried for round-trip fidelity; the client never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// The function name/arguments pair inside a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON-encoded argument string, exactly as the server sent it
    pub arguments: String,
}

/// One authoritative turn in a conversation.
///
/// Ordering within the log is significant: it is what the server resumes
/// agent reasoning from. The log is append-only during a live run and
/// wholesale-replaced by snapshots and rehydration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// User turn
    User { id: String, content: String },
    /// Assistant turn; may carry tool-call bookkeeping
    Assistant {
        id: String,
        #[serde(default)]
        content: String,
        #[serde(
            rename = "toolCalls",
            default,
            skip_serializing_if = "Vec::is_empty"
        )]
        tool_calls: Vec<ToolCall>,
    },
    /// Tool result turn
    Tool {
        id: String,
        content: String,
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
    },
    /// System/instruction turn
    System { id: String, content: String },
}

impl Message {
    /// Create a user message with a fresh id
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
        }
    }

    /// Create an empty assistant message with a fresh id
    pub fn assistant_empty() -> Self {
        Self::Assistant {
            id: uuid::Uuid::new_v4().to_string(),
            content: String::new(),
            tool_calls: vec![],
        }
    }

    /// The message id
    pub fn id(&self) -> &str {
        match self {
            Self::User { id, .. }
            | Self::Assistant { id, .. }
            | Self::Tool { id, .. }
            | Self::System { id, .. } => id,
        }
    }

    /// The role as a string
    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
            Self::System { .. } => "system",
        }
    }

    /// The textual content
    pub fn content(&self) -> &str {
        match self {
            Self::User { content, .. }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. }
            | Self::System { content, .. } => content,
        }
    }

    /// Whether this is an assistant message
    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }
}

/// Request body for a streaming run submission.
///
/// Mirrors the run-input schema the server validates before persisting the
/// user turn, so every field is present even when empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    pub thread_id: ThreadId,
    pub run_id: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub state: serde_json::Value,
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
    #[serde(default)]
    pub context: Vec<serde_json::Value>,
    #[serde(default)]
    pub forwarded_props: serde_json::Value,
}

impl RunInput {
    /// Build a run input for a prompt submission
    pub fn new(thread_id: ThreadId, messages: Vec<Message>) -> Self {
        Self {
            thread_id,
            run_id: format!("run-{}", uuid::Uuid::new_v4()),
            messages,
            state: serde_json::Value::Null,
            tools: vec![],
            context: vec![],
            forwarded_props: serde_json::Value::Null,
        }
    }
}
