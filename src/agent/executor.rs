//! The step loop executor (C4): the bounded alternation between LLM turns
//! and tool-execution turns that drives a single agent run.

use std::time::Instant;

use tracing::{Instrument, debug, error, info, info_span};

use crate::chat::{ChatRequest, SharedChatProvider};
use crate::error::{Error, ErrorCode, Result};
use crate::message::{Message, ToolCallRequest};
use crate::tool::{ToolRegistry, ToolResult};
use crate::trace::{TraceEvent, TraceRecorder};

use super::config::{AgentConfig, ExecuteOverrides};
use super::state::{AgentState, ExecuteResult, TerminalError};

/// A configured agent: a system prompt, a tool registry, and an LLM
/// binding, plus the step-loop policy in [`AgentConfig`].
///
/// The tool registry is the only part of an agent that is ever mutated
/// after construction, and only between executions — never concurrently
/// with a running `execute`/`stream` call.
pub struct Agent {
    /// The agent's own immutable configuration.
    pub config: AgentConfig,
    provider: SharedChatProvider,
    tools: ToolRegistry,
}

/// Outcome of one LLM step, detailed enough for the streaming projection
/// (C5) to derive `thought`/`tool_call`/`final_answer` events without
/// re-running the loop logic.
pub(crate) enum LlmStepOutcome {
    /// The model asked for one or more tool calls.
    ToolCalls {
        /// Free-form content accompanying the tool calls, if any.
        thought: Option<String>,
        /// The requested calls, in the order the model emitted them.
        calls: Vec<ToolCallRequest>,
    },
    /// The model produced a final answer; the loop is complete.
    Final {
        /// The final response text.
        response: String,
    },
}

impl Agent {
    /// Build an agent directly from its parts. Prefer
    /// [`super::builder::AgentBuilder`] for a more ergonomic construction
    /// path.
    #[must_use]
    pub fn new(config: AgentConfig, provider: SharedChatProvider, tools: ToolRegistry) -> Self {
        Self {
            config,
            provider,
            tools,
        }
    }

    /// The agent's tool registry, for inspection.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The agent's tool registry, mutable — only safe to call between
    /// executions.
    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    /// The provider this agent calls.
    #[must_use]
    pub fn provider(&self) -> &SharedChatProvider {
        &self.provider
    }

    pub(crate) fn seed_messages(&self, input: &str) -> Vec<Message> {
        let mut messages = Vec::new();
        if let Some(prompt) = &self.config.system_prompt {
            if !prompt.is_empty() {
                messages.push(Message::system(prompt.clone()));
            }
        }
        messages.push(Message::user(input));
        messages
    }

    /// Run the step loop to completion or a terminal error.
    ///
    /// Only [`Error::MaxStepsExceeded`], [`Error::Llm`], and
    /// [`Error::Cancelled`] are ever returned as `Err`; every other failure
    /// mode (tool errors) is folded back into the conversation and the loop
    /// continues.
    pub async fn execute(&self, input: impl AsRef<str>, overrides: ExecuteOverrides) -> Result<ExecuteResult> {
        let input = input.as_ref();
        let span = info_span!(
            "agent_execute",
            agent.id = %self.config.id,
            agent.name = %self.config.name,
            agent.max_steps = tracing::field::Empty,
            agent.steps_taken = tracing::field::Empty,
        );
        self.execute_inner(input, overrides).instrument(span).await
    }

    async fn execute_inner(&self, input: &str, overrides: ExecuteOverrides) -> Result<ExecuteResult> {
        let max_steps = overrides.resolve_max_steps(self.config.max_steps);
        tracing::Span::current().record("agent.max_steps", max_steps);

        let mut state = AgentState::new(self.seed_messages(input));
        let mut trace = TraceRecorder::new();
        trace.record(TraceEvent::AgentStart { input: input.to_string() });

        let result = self.run_loop(&mut state, &mut trace, max_steps, &overrides).await;

        match result {
            Ok(()) => {
                tracing::Span::current().record("agent.steps_taken", state.step);
                info!(agent = %self.config.name, steps = state.step, "agent execution completed");
                trace.record(TraceEvent::AgentEnd { success: true, steps: state.step });
                Ok(ExecuteResult {
                    response: state.final_response.clone().unwrap_or_default(),
                    final_state: state,
                    trace: trace.finish(),
                    success: true,
                    error: None,
                })
            }
            Err(err) => {
                error!(agent = %self.config.name, error = %err, "agent execution failed");
                state.error = Some(TerminalError {
                    message: err.to_string(),
                    step: state.step,
                    cause: None,
                });
                // Open question resolution: MAX_STEPS_EXCEEDED is recorded
                // as a trace `error` event before being raised, so a trace
                // consumer can see why the execution ended without having
                // to separately catch the propagated error.
                trace.record(TraceEvent::Error {
                    code: err.code().as_str(),
                    message: err.to_string(),
                });
                trace.record(TraceEvent::AgentEnd { success: false, steps: state.step });
                let _ = trace.finish();
                Err(err)
            }
        }
    }

    async fn run_loop(
        &self,
        state: &mut AgentState,
        trace: &mut TraceRecorder,
        max_steps: usize,
        overrides: &ExecuteOverrides,
    ) -> Result<()> {
        while state.step < max_steps && !state.complete {
            if let Some(token) = &overrides.cancellation {
                if token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
            }

            state.step += 1;
            trace.record(TraceEvent::StepStart { step: state.step });
            debug!(agent = %self.config.name, step = state.step, "starting step");

            if state.pending_tool_calls.is_empty() {
                if let LlmStepOutcome::Final { response } = self.run_llm_step(state, trace).await? {
                    state.final_response = Some(response);
                    state.complete = true;
                }
            } else {
                let _ = self.run_tool_step(state, trace).await;
            }

            trace.record(TraceEvent::StepEnd { step: state.step });
        }

        if !state.complete {
            return Err(Error::max_steps(state.step, max_steps));
        }
        Ok(())
    }

    /// Run one LLM turn: build the request, call the provider, record the
    /// trace events, and fold the response into `state`.
    pub(crate) async fn run_llm_step(
        &self,
        state: &mut AgentState,
        trace: &mut TraceRecorder,
    ) -> Result<LlmStepOutcome> {
        let tools = self.tools.advertise();
        let request = ChatRequest::new(state.messages.clone())
            .with_tools(tools.clone())
            .with_sampling(self.config.sampling.clone());

        trace.record(TraceEvent::LlmRequest { message_count: state.messages.len() });

        let started = Instant::now();
        let response = self.provider.chat(&request).await.map_err(|e| {
            trace.record(TraceEvent::Error {
                code: ErrorCode::LlmError.as_str(),
                message: e.to_string(),
            });
            e
        })?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        trace.record(TraceEvent::LlmResponse {
            has_tool_calls: response.has_tool_calls(),
            usage: response.usage,
            duration_ms: elapsed_ms,
        });

        if response.has_tool_calls() {
            for call in &response.tool_calls {
                trace.record(TraceEvent::ToolCallRequest {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    parameters: call.parameters.clone(),
                });
            }
            state.messages.push(Message::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            state.pending_tool_calls = response.tool_calls.clone();
            Ok(LlmStepOutcome::ToolCalls {
                thought: response.content,
                calls: response.tool_calls,
            })
        } else {
            let content = response.content.unwrap_or_default();
            state.messages.push(Message::assistant(content.clone()));
            Ok(LlmStepOutcome::Final { response: content })
        }
    }

    /// Drain and execute every pending tool call, folding each result back
    /// into `state.messages`, and return the results in execution order for
    /// the streaming projection to emit as `tool_result` events.
    pub(crate) async fn run_tool_step(&self, state: &mut AgentState, trace: &mut TraceRecorder) -> Vec<ToolResult> {
        let pending = std::mem::take(&mut state.pending_tool_calls);
        let mut produced = Vec::with_capacity(pending.len());

        for call in &pending {
            trace.record(TraceEvent::ToolCallStart {
                id: call.id.clone(),
                name: call.name.clone(),
            });

            let result = self.tools.invoke(call).await;

            if result.is_success() {
                trace.record(TraceEvent::ToolCallEnd { result: result.clone() });
                let payload = match &result.outcome {
                    crate::tool::ToolOutcome::Success { payload } => payload.clone(),
                    crate::tool::ToolOutcome::Failure { .. } => unreachable!("checked is_success above"),
                };
                let content = serde_json::to_string(&payload).unwrap_or_else(|_| payload.to_string());
                state.messages.push(Message::tool(call.id.clone(), call.name.clone(), content));
            } else {
                let message = match &result.outcome {
                    crate::tool::ToolOutcome::Failure { message, .. } => message.clone(),
                    crate::tool::ToolOutcome::Success { .. } => unreachable!("checked is_success above"),
                };
                trace.record(TraceEvent::ToolCallError {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    message: message.clone(),
                });
                state.messages.push(Message::tool(
                    call.id.clone(),
                    call.name.clone(),
                    format!("Error: {message}"),
                ));
            }

            state.tool_results.push(result.clone());
            produced.push(result);
        }

        produced
    }
}
