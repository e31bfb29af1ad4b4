//! The trace recorder (C3): an append-only, ordered log of everything that
//! happens during a single `execute`/`stream` call.
//!
//! A trace is built incrementally via `&mut` recorder calls during the step
//! loop, then handed to the caller as an immutable [`Trace`] snapshot. Event
//! timestamps are monotonically non-decreasing because they are stamped by
//! the recorder itself, never supplied by the caller.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::ToolResult;
use crate::usage::Usage;

/// One entry in the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    /// The top-level `execute`/`stream` call began.
    AgentStart {
        /// The raw input string.
        input: String,
    },
    /// The top-level call finished, successfully or not.
    AgentEnd {
        /// `true` if the loop ended with a final answer rather than an error.
        success: bool,
        /// Total steps taken.
        steps: usize,
    },
    /// A new step began.
    StepStart {
        /// One-indexed step number.
        step: usize,
    },
    /// A step finished.
    StepEnd {
        /// One-indexed step number.
        step: usize,
    },
    /// An LLM turn was requested.
    LlmRequest {
        /// Number of messages sent.
        message_count: usize,
    },
    /// An LLM turn was received.
    LlmResponse {
        /// `true` if the turn carried tool calls.
        has_tool_calls: bool,
        /// Token usage, if reported.
        usage: Option<Usage>,
        /// Wall-clock time spent waiting on the call, in milliseconds.
        duration_ms: u64,
    },
    /// A streamed LLM call began.
    LlmStreamStart,
    /// A fragment arrived from a streamed LLM call.
    LlmStreamChunk {
        /// The fragment text.
        text: String,
    },
    /// A streamed LLM call finished.
    LlmStreamEnd,
    /// A tool call was requested by the model.
    ToolCallRequest {
        /// Call id.
        id: String,
        /// Tool name.
        name: String,
        /// Raw parameters.
        parameters: Value,
    },
    /// A tool call began executing.
    ToolCallStart {
        /// Call id.
        id: String,
        /// Tool name.
        name: String,
    },
    /// A tool call completed successfully.
    ToolCallEnd {
        /// The full result, including metadata.
        result: ToolResult,
    },
    /// A tool call failed after exhausting its retry budget.
    ToolCallError {
        /// Call id.
        id: String,
        /// Tool name.
        name: String,
        /// Failure message.
        message: String,
    },
    /// A terminal or non-terminal error occurred.
    Error {
        /// Stable error code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },
    /// A routing decision, recorded as a pseudo-event in a swarm's
    /// supervisor trace rather than an agent's own execution trace.
    RoutingDecision {
        /// The chosen specialist's id.
        specialist_id: String,
        /// Human-readable justification.
        reason: String,
        /// Confidence in `[0, 1]`.
        confidence: f64,
    },
}

/// A single recorded entry with its stamped time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Unix epoch milliseconds when this event was recorded.
    pub timestamp_ms: u64,
    /// The event payload.
    pub event: TraceEvent,
}

/// Aggregate counters maintained alongside the raw event log, so callers
/// don't need to re-scan the whole trace to answer "how many tool calls
/// happened".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TraceCounters {
    /// Steps started.
    pub steps: usize,
    /// LLM calls made.
    pub llm_calls: usize,
    /// Tool calls requested by the model (summed across `llm_response`s).
    pub tool_calls: usize,
    /// Tool calls that completed successfully.
    pub successful_tool_calls: usize,
    /// Tool calls that failed after exhausting retries.
    pub failed_tool_calls: usize,
    /// Errors recorded.
    pub errors: usize,
}

/// An immutable snapshot of a trace at some point in its life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// The ordered event log.
    pub entries: Vec<TraceEntry>,
    /// Running counters over `entries`.
    pub counters: TraceCounters,
    /// Unix epoch milliseconds when recording started.
    pub started_at_ms: u64,
    /// Unix epoch milliseconds when recording ended, if it has.
    pub ended_at_ms: Option<u64>,
}

impl Trace {
    /// Total wall-clock duration of the recording, if it has ended.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        self.ended_at_ms.map(|end| end.saturating_sub(self.started_at_ms))
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// A running trace recorder: append events during execution, then call
/// [`TraceRecorder::finish`] to seal it into a [`Trace`].
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    entries: Vec<TraceEntry>,
    counters: TraceCounters,
    started_at_ms: u64,
    ended_at_ms: Option<u64>,
    last_timestamp_ms: u64,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceRecorder {
    /// Start a new recorder, stamping the current time as its start.
    #[must_use]
    pub fn new() -> Self {
        let now = now_unix_ms();
        Self {
            entries: Vec::new(),
            counters: TraceCounters::default(),
            started_at_ms: now,
            ended_at_ms: None,
            last_timestamp_ms: now,
        }
    }

    /// Append an event, stamping it with a timestamp no earlier than the
    /// previous entry's.
    pub fn record(&mut self, event: TraceEvent) {
        let timestamp_ms = now_unix_ms().max(self.last_timestamp_ms);
        self.last_timestamp_ms = timestamp_ms;

        match &event {
            TraceEvent::StepStart { .. } => self.counters.steps += 1,
            TraceEvent::LlmRequest { .. } => self.counters.llm_calls += 1,
            TraceEvent::ToolCallRequest { .. } => self.counters.tool_calls += 1,
            TraceEvent::ToolCallEnd { .. } => self.counters.successful_tool_calls += 1,
            TraceEvent::ToolCallError { .. } => self.counters.failed_tool_calls += 1,
            TraceEvent::Error { .. } => self.counters.errors += 1,
            _ => {}
        }

        self.entries.push(TraceEntry { timestamp_ms, event });
    }

    /// An immutable snapshot of the trace as it stands right now, without
    /// sealing it. Safe to call mid-execution (e.g. from a streaming
    /// consumer that wants a partial trace).
    #[must_use]
    pub fn snapshot(&self) -> Trace {
        Trace {
            entries: self.entries.clone(),
            counters: self.counters,
            started_at_ms: self.started_at_ms,
            ended_at_ms: self.ended_at_ms,
        }
    }

    /// Stamp the end time and seal the recorder into its final [`Trace`].
    #[must_use]
    pub fn finish(mut self) -> Trace {
        let end = now_unix_ms().max(self.last_timestamp_ms);
        self.ended_at_ms = Some(end);
        Trace {
            entries: self.entries,
            counters: self.counters,
            started_at_ms: self.started_at_ms,
            ended_at_ms: self.ended_at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_non_decreasing() {
        let mut recorder = TraceRecorder::new();
        recorder.record(TraceEvent::AgentStart { input: "hi".into() });
        recorder.record(TraceEvent::StepStart { step: 1 });
        recorder.record(TraceEvent::StepEnd { step: 1 });
        let trace = recorder.finish();
        let mut last = 0;
        for entry in &trace.entries {
            assert!(entry.timestamp_ms >= last);
            last = entry.timestamp_ms;
        }
    }

    #[test]
    fn counters_track_steps_and_llm_calls() {
        let mut recorder = TraceRecorder::new();
        recorder.record(TraceEvent::StepStart { step: 1 });
        recorder.record(TraceEvent::LlmRequest { message_count: 2 });
        recorder.record(TraceEvent::StepEnd { step: 1 });
        let trace = recorder.finish();
        assert_eq!(trace.counters.steps, 1);
        assert_eq!(trace.counters.llm_calls, 1);
    }

    #[test]
    fn finish_stamps_end_time_and_duration() {
        let recorder = TraceRecorder::new();
        let trace = recorder.finish();
        assert!(trace.ended_at_ms.is_some());
        assert!(trace.duration_ms().is_some());
    }

    #[test]
    fn snapshot_is_available_before_finish() {
        let mut recorder = TraceRecorder::new();
        recorder.record(TraceEvent::StepStart { step: 1 });
        let snap = recorder.snapshot();
        assert!(snap.ended_at_ms.is_none());
        assert_eq!(snap.counters.steps, 1);
    }
}
