//! The streaming projection (C5): re-expresses the step loop as a lazy
//! sequence of semantic events, paced by the consumer.

use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{Error, ErrorCode, Result};
use crate::message::ToolCallRequest;
use crate::tool::ToolResult;
use crate::trace::{TraceEvent, TraceRecorder};

use super::config::ExecuteOverrides;
use super::executor::{Agent, LlmStepOutcome};
use super::state::AgentState;

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// One semantic event emitted by [`Agent::stream`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentExecutionEvent {
    /// A new step began.
    Step {
        /// One-indexed step number.
        step: usize,
        /// ISO-8601-equivalent epoch milliseconds.
        timestamp_ms: u64,
    },
    /// An LLM step returned non-empty assistant content.
    Thought {
        /// The step this content was produced in.
        step: usize,
        /// The assistant's free-form content.
        content: String,
        /// Timestamp.
        timestamp_ms: u64,
    },
    /// A tool call was requested by the model.
    ToolCall {
        /// The step this request was produced in.
        step: usize,
        /// The requested call.
        tool_call: ToolCallRequest,
        /// Timestamp.
        timestamp_ms: u64,
    },
    /// A tool call finished, successfully or not.
    ToolResult {
        /// The step this result was produced in.
        step: usize,
        /// The full result, including a failure payload if it failed.
        result: ToolResult,
        /// Timestamp.
        timestamp_ms: u64,
    },
    /// The loop completed with a final answer. Always the last event.
    FinalAnswer {
        /// The step the final answer was produced in.
        step: usize,
        /// The final response text.
        answer: String,
        /// Timestamp.
        timestamp_ms: u64,
    },
    /// A terminal error other than `MAX_STEPS_EXCEEDED` ended the stream.
    Error {
        /// The step active when the error occurred, if any.
        step: Option<usize>,
        /// Stable error code.
        code: Option<&'static str>,
        /// Human-readable message.
        message: String,
        /// Timestamp.
        timestamp_ms: u64,
    },
}

impl Agent {
    /// Run the step loop, yielding semantic events as the consumer pulls
    /// them.
    ///
    /// `MAX_STEPS_EXCEEDED` is not projected as an `Error` event: it
    /// terminates the stream as an `Err` item so the caller can distinguish
    /// it from an ordinary terminal failure. Every other terminal condition
    /// (`LLM_ERROR`, cancellation) is projected as an `Error` event and the
    /// stream then ends normally.
    pub fn stream(
        &self,
        input: impl Into<String>,
        overrides: ExecuteOverrides,
    ) -> Pin<Box<dyn Stream<Item = Result<AgentExecutionEvent>> + Send + '_>> {
        let input = input.into();
        Box::pin(self.stream_inner(input, overrides))
    }

    #[allow(tail_expr_drop_order)]
    fn stream_inner(
        &self,
        input: String,
        overrides: ExecuteOverrides,
    ) -> impl Stream<Item = Result<AgentExecutionEvent>> + Send + '_ {
        async_stream::try_stream! {
            let max_steps = overrides.resolve_max_steps(self.config.max_steps);
            let mut state = AgentState::new(self.seed_messages(&input));
            let mut trace = TraceRecorder::new();
            trace.record(TraceEvent::AgentStart { input: input.clone() });

            loop {
                if state.step >= max_steps || state.complete {
                    break;
                }

                if let Some(token) = &overrides.cancellation {
                    if token.is_cancelled() {
                        let err = Error::Cancelled;
                        trace.record(TraceEvent::Error { code: err.code().as_str(), message: err.to_string() });
                        trace.record(TraceEvent::AgentEnd { success: false, steps: state.step });
                        let _ = trace.finish();
                        yield AgentExecutionEvent::Error {
                            step: Some(state.step),
                            code: Some(ErrorCode::Cancelled.as_str()),
                            message: err.to_string(),
                            timestamp_ms: now_unix_ms(),
                        };
                        return;
                    }
                }

                state.step += 1;
                trace.record(TraceEvent::StepStart { step: state.step });
                debug!(agent = %self.config.name, step = state.step, "starting streamed step");

                yield AgentExecutionEvent::Step { step: state.step, timestamp_ms: now_unix_ms() };

                if state.pending_tool_calls.is_empty() {
                    let step_result = self.run_llm_step(&mut state, &mut trace).await;

                    let outcome = match step_result {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            error!(agent = %self.config.name, error = %err, "streamed agent execution failed");
                            trace.record(TraceEvent::Error { code: err.code().as_str(), message: err.to_string() });
                            trace.record(TraceEvent::AgentEnd { success: false, steps: state.step });
                            let _ = trace.finish();
                            yield AgentExecutionEvent::Error {
                                step: Some(state.step),
                                code: Some(err.code().as_str()),
                                message: err.to_string(),
                                timestamp_ms: now_unix_ms(),
                            };
                            return;
                        }
                    };

                    match outcome {
                        LlmStepOutcome::ToolCalls { thought, calls } => {
                            if let Some(content) = thought.filter(|c| !c.is_empty()) {
                                yield AgentExecutionEvent::Thought {
                                    step: state.step,
                                    content,
                                    timestamp_ms: now_unix_ms(),
                                };
                            }
                            for call in calls {
                                yield AgentExecutionEvent::ToolCall {
                                    step: state.step,
                                    tool_call: call,
                                    timestamp_ms: now_unix_ms(),
                                };
                            }
                        }
                        LlmStepOutcome::Final { response } => {
                            state.final_response = Some(response.clone());
                            state.complete = true;
                            trace.record(TraceEvent::StepEnd { step: state.step });
                            trace.record(TraceEvent::AgentEnd { success: true, steps: state.step });
                            let _ = trace.finish();
                            yield AgentExecutionEvent::FinalAnswer {
                                step: state.step,
                                answer: response,
                                timestamp_ms: now_unix_ms(),
                            };
                            return;
                        }
                    }
                } else {
                    let results = self.run_tool_step(&mut state, &mut trace).await;
                    for result in results {
                        yield AgentExecutionEvent::ToolResult {
                            step: state.step,
                            result,
                            timestamp_ms: now_unix_ms(),
                        };
                    }
                }

                trace.record(TraceEvent::StepEnd { step: state.step });
            }

            if !state.complete {
                let err = Error::max_steps(state.step, max_steps);
                trace.record(TraceEvent::Error { code: err.code().as_str(), message: err.to_string() });
                trace.record(TraceEvent::AgentEnd { success: false, steps: state.step });
                let _ = trace.finish();
                Err(err)?;
            }
        }
    }
}
