//! The LLM client contract (C2): the single capability surface every
//! provider adapter must implement.
//!
//! The core never branches on a provider tag at runtime; it only sees this
//! trait. Adapters translate message shape and tool schemas into whatever
//! their backend expects and translate the backend's response back into
//! [`ChatResponse`].

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::message::{Message, ToolCallRequest};
use crate::tool::ToolDefinition;
use crate::usage::Usage;

/// Why the model stopped generating, mapped onto the core's four
/// provider-agnostic categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model produced a natural completion.
    Stop,
    /// The model emitted one or more tool calls.
    ToolCalls,
    /// The completion was cut off by a token limit.
    Length,
    /// Content was withheld by the provider's safety filter.
    ContentFilter,
}

impl FinishReason {
    /// `true` if the model emitted tool calls rather than a final answer.
    #[must_use]
    pub const fn is_tool_calls(&self) -> bool {
        matches!(self, Self::ToolCalls)
    }
}

/// Sampling parameters threaded opaquely to the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature, if the provider supports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A callback invoked once per emitted content fragment, in arrival order,
/// when a caller opts into token-level streaming from the provider.
///
/// Adapters that accept a sink must not invoke it after `chat` returns.
pub type TokenSink = Arc<dyn Fn(&str) + Send + Sync>;

/// A request for one assistant turn.
#[derive(Clone)]
pub struct ChatRequest {
    /// The ordered conversation, including the system prompt if any.
    pub messages: Vec<Message>,
    /// The tool catalogue advertised to the model (from `ToolRegistry::advertise`).
    pub tools: Vec<ToolDefinition>,
    /// Sampling parameters.
    pub sampling: SamplingParams,
    /// Optional per-fragment callback for token-level streaming.
    pub token_sink: Option<TokenSink>,
}

impl std::fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRequest")
            .field("messages", &self.messages.len())
            .field("tools", &self.tools.len())
            .field("sampling", &self.sampling)
            .field("has_token_sink", &self.token_sink.is_some())
            .finish()
    }
}

impl ChatRequest {
    /// Build a request over a conversation with no advertised tools.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            sampling: SamplingParams::default(),
            token_sink: None,
        }
    }

    /// Advertise a tool catalogue for this turn.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set sampling parameters.
    #[must_use]
    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    /// Register a token sink for this call.
    #[must_use]
    pub fn with_token_sink(mut self, sink: TokenSink) -> Self {
        self.token_sink = Some(sink);
        self
    }
}

/// One assistant turn returned by a provider.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Free-form textual content, if any.
    pub content: Option<String>,
    /// Structured tool-call requests, if the model chose to call tools.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Why the model stopped.
    pub finish_reason: Option<FinishReason>,
    /// Token usage for this call, if the provider reports it.
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Build a plain text response with `finish_reason: stop`.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: Some(FinishReason::Stop),
            usage: None,
        }
    }

    /// Build a tool-calls response.
    #[must_use]
    pub fn tool_calls(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content,
            tool_calls: calls,
            finish_reason: Some(FinishReason::ToolCalls),
            usage: None,
        }
    }

    /// Attach usage statistics.
    #[must_use]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// `true` if the model requested one or more tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The LLM client contract (C2).
///
/// Implementations translate `messages`/`tools` into a provider-native
/// request, perform the call, and translate the response back. Any
/// inability to obtain a turn must be surfaced as [`Error::Llm`].
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Produce one assistant turn for the given request.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Stable provider tag used in diagnostics and `LLM_ERROR` payloads.
    fn provider_name(&self) -> &'static str;

    /// The model identifier this provider targets by default.
    fn default_model(&self) -> &str;

    /// `true` if this provider honors `ChatRequest::token_sink`.
    fn supports_streaming(&self) -> bool {
        false
    }
}

/// A shared, thread-safe [`ChatProvider`] handle.
pub type SharedChatProvider = Arc<dyn ChatProvider>;

/// Boxed future returning a [`ChatResponse`]; used where a provider wraps
/// another provider and cannot name its own future type.
pub type BoxChatFuture<'a> = Pin<Box<dyn std::future::Future<Output = Result<ChatResponse>> + Send + 'a>>;

/// Wrap a provider failure as a typed [`Error::Llm`], tagging it with the
/// provider's name.
pub fn llm_error(provider: &dyn ChatProvider, message: impl Into<String>) -> Error {
    Error::llm(provider.provider_name(), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_is_tool_calls() {
        assert!(FinishReason::ToolCalls.is_tool_calls());
        assert!(!FinishReason::Stop.is_tool_calls());
    }

    #[test]
    fn chat_response_text_has_no_tool_calls() {
        let resp = ChatResponse::text("hi");
        assert!(!resp.has_tool_calls());
        assert_eq!(resp.content.as_deref(), Some("hi"));
    }

    #[test]
    fn chat_response_tool_calls_variant() {
        let calls = vec![ToolCallRequest::new("c1", "t", serde_json::json!({}))];
        let resp = ChatResponse::tool_calls(None, calls);
        assert!(resp.has_tool_calls());
        assert_eq!(resp.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn request_builder_chains() {
        let req = ChatRequest::new(vec![Message::user("hi")])
            .with_sampling(SamplingParams {
                temperature: Some(0.5),
                ..Default::default()
            });
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.sampling.temperature, Some(0.5));
    }
}
