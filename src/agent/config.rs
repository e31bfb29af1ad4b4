//! Agent configuration and the cancellation/override types threaded into
//! a single `execute`/`stream` call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::chat::SamplingParams;

/// Immutable configuration for an agent.
///
/// Agent configs are immutable once constructed — the tool registry is the
/// only mutable part of an [`super::Agent`], and only between executions.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Stable identifier, used by the swarm layer to key specialists.
    pub id: String,
    /// Display name, used in logs and traces.
    pub name: String,
    /// System prompt seeded into every execution's conversation. `None`
    /// means no system message is added.
    pub system_prompt: Option<String>,
    /// Sampling parameters passed to every LLM call.
    pub sampling: SamplingParams,
    /// Step bound used when an `execute`/`stream` call supplies none.
    pub max_steps: usize,
}

impl AgentConfig {
    /// The default step bound used when neither the call nor the config
    /// specifies one.
    pub const DEFAULT_MAX_STEPS: usize = 10;

    /// Build a config with the default step bound and no system prompt.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system_prompt: None,
            sampling: SamplingParams::default(),
            max_steps: Self::DEFAULT_MAX_STEPS,
        }
    }
}

/// A cooperative cancellation flag: checked between steps, never forcibly
/// interrupts an in-flight LLM or tool call.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `true` if [`CancellationToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call overrides of the agent's own configuration.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOverrides {
    /// Overrides [`AgentConfig::max_steps`] for this call only.
    pub max_steps: Option<usize>,
    /// Checked between steps; set to abort an in-flight execution.
    pub cancellation: Option<CancellationToken>,
}

impl ExecuteOverrides {
    /// No overrides: use the agent's own configured step bound, no
    /// cancellation.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Override the step bound for this call.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Attach a cancellation token for this call.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub(crate) fn resolve_max_steps(&self, config_default: usize) -> usize {
        self.max_steps.unwrap_or(config_default)
    }
}
