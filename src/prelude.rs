//! Convenient re-exports of the most commonly used types and traits.
//!
//! ```ignore
//! use agentloom::prelude::*;
//! ```

pub use crate::agent::{Agent, AgentBuilder, AgentConfig, AgentExecutionEvent, AgentState, CancellationToken, ExecuteOverrides, ExecuteResult, TerminalError};
pub use crate::chat::{ChatProvider, ChatRequest, ChatResponse, FinishReason, SamplingParams, SharedChatProvider};
pub use crate::error::{Error, ErrorCode, Result};
pub use crate::message::{Message, Role, ToolCallRequest};
pub use crate::providers::MockProvider;
pub use crate::swarm::{CustomRouter, CustomSynthesizer, ExecutionMode, RoutingDecision, SpecialistDescriptor, SpecialistOutcome, Swarm, SwarmBuilder, SwarmEvent, SwarmObserver, SwarmResult, SwarmStats};
pub use crate::tool::{DynTool, RetryPolicy, Tool, ToolDefinition, ToolError, ToolOutcome, ToolRegistry, ToolResult};
pub use crate::trace::{Trace, TraceEntry, TraceEvent, TraceRecorder};
pub use crate::usage::Usage;
