//! Conversation message model shared between the step loop and LLM clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message carrying the agent's instructions.
    System,
    /// User-provided input.
    User,
    /// Assistant (model) turn.
    Assistant,
    /// Result of a tool invocation, threaded back to the model.
    Tool,
}

/// A request, emitted by the model, to invoke a registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier unique within the emitting assistant turn.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Untyped parameter object; validated at the registry boundary.
    pub parameters: Value,
}

impl ToolCallRequest {
    /// Construct a new tool-call request.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, parameters: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters,
        }
    }
}

/// A single message in the conversation threaded through the step loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The speaker of this turn.
    pub role: Role,
    /// Textual content. Nullable for a pure tool-call assistant turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool-call requests emitted by an assistant turn, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    /// For a tool-role message, the id of the request it answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For a tool-role message, the name of the tool that produced it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    /// Build a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    /// Build an assistant message carrying free-form content only.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    /// Build an assistant message carrying tool-call requests, with
    /// optional accompanying free-form content.
    #[must_use]
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
            tool_name: None,
        }
    }

    /// Build a tool-result message threaded back to the model.
    #[must_use]
    pub fn tool(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }

    /// `true` if this assistant message carries one or more tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_has_no_tool_calls() {
        let msg = Message::user("hello");
        assert!(!msg.has_tool_calls());
        assert_eq!(msg.content.as_deref(), Some("hello"));
    }

    #[test]
    fn assistant_with_tool_calls_reports_true() {
        let calls = vec![ToolCallRequest::new("c1", "calculator", serde_json::json!({}))];
        let msg = Message::assistant_tool_calls(Some("I will compute".into()), calls);
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn tool_message_carries_back_reference() {
        let msg = Message::tool("c1", "calculator", "8");
        assert_eq!(msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(msg.tool_name.as_deref(), Some("calculator"));
    }

    #[test]
    fn serde_roundtrip_skips_absent_fields() {
        let msg = Message::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.content, msg.content);
    }
}
