//! Per-execution agent state and the value a completed `execute` call
//! returns.

use serde::{Deserialize, Serialize};

use crate::message::{Message, ToolCallRequest};
use crate::tool::ToolResult;
use crate::trace::Trace;

/// A terminal failure recorded against an execution. Only ever populated
/// internally right before `execute` raises; see [`super::ExecuteResult`]
/// for why the public `Ok` path never carries one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalError {
    /// Human-readable failure message.
    pub message: String,
    /// The step at which the failure occurred.
    pub step: usize,
    /// The underlying cause, if distinct from `message` (e.g. a wrapped
    /// provider error string).
    pub cause: Option<String>,
}

/// Mutable state for a single `execute`/`stream` call.
///
/// Created fresh per call, mutated only by its owning loop, and discarded
/// once the result is returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentState {
    /// Steps taken so far, starting at 0.
    pub step: usize,
    /// The ordered conversation, including the system prompt if any.
    pub messages: Vec<Message>,
    /// Tool-call requests carried from the most recent LLM turn, awaiting
    /// execution in the next (tool-execution) step.
    pub pending_tool_calls: Vec<ToolCallRequest>,
    /// Every tool result produced so far, in completion order.
    pub tool_results: Vec<ToolResult>,
    /// `true` once the loop has produced a final response.
    pub complete: bool,
    /// The final assistant response, once `complete`.
    pub final_response: Option<String>,
    /// Set just before a terminal error is raised.
    pub error: Option<TerminalError>,
}

impl AgentState {
    /// A fresh state seeded with the initial conversation.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

/// The outcome of a completed `execute` call.
///
/// `success` is always `true` and `error` is always `None` on the `Ok`
/// path: `MAX_STEPS_EXCEEDED`, `LLM_ERROR`, and cancellation are raised out
/// of `execute` as an `Err` instead of being packaged in here (see
/// `crate::error::Error`). The fields exist so the shape matches the
/// value-returned-on-every-path contract other callers (e.g. the swarm
/// layer building a `SpecialistOutcome`) construct from a failed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResult {
    /// The final response text.
    pub response: String,
    /// The state as of the final step.
    pub final_state: AgentState,
    /// The full trace of the execution.
    pub trace: Trace,
    /// Always `true` for a value returned from `execute`.
    pub success: bool,
    /// Always `None` for a value returned from `execute`.
    pub error: Option<TerminalError>,
}
