//! Ergonomic construction of an [`Agent`].

use crate::chat::{ChatProvider, SamplingParams, SharedChatProvider};
use crate::error::{Error, Result};
use crate::tool::{RetryPolicy, ToolDefinition, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;

use super::config::AgentConfig;
use super::executor::Agent;

/// A chained builder for [`Agent`]. Call [`AgentBuilder::build`] once every
/// required field has been set.
pub struct AgentBuilder {
    id: String,
    name: String,
    system_prompt: Option<String>,
    sampling: SamplingParams,
    max_steps: usize,
    provider: Option<SharedChatProvider>,
    tools: ToolRegistry,
}

impl AgentBuilder {
    /// Start building an agent with the given id and display name.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system_prompt: None,
            sampling: SamplingParams::default(),
            max_steps: AgentConfig::DEFAULT_MAX_STEPS,
            provider: None,
            tools: ToolRegistry::new(),
        }
    }

    /// Set the system prompt seeded into every execution.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set sampling parameters passed to every LLM call.
    #[must_use]
    pub fn sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    /// Override the default step bound (10 if unset).
    #[must_use]
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the LLM provider this agent calls.
    #[must_use]
    pub fn provider(mut self, provider: impl ChatProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Register a tool, with retry policy and optional timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool's definition is invalid or its name is
    /// already registered.
    pub fn tool(
        mut self,
        tool: Arc<dyn crate::tool::DynTool>,
        definition: ToolDefinition,
        retry: RetryPolicy,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        self.tools.register(tool, definition, retry, timeout)?;
        Ok(self)
    }

    /// Consume the builder and construct the agent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedProvider`] if no provider was configured.
    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| Error::UnsupportedProvider("no provider configured on agent builder".to_string()))?;

        let config = AgentConfig {
            id: self.id,
            name: self.name,
            system_prompt: self.system_prompt,
            sampling: self.sampling,
            max_steps: self.max_steps,
        };

        Ok(Agent::new(config, provider, self.tools))
    }
}
