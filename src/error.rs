//! Error taxonomy for the agent orchestration runtime.
//!
//! Every error the core can raise is a discriminated variant of [`Error`],
//! tagged with a stable [`ErrorCode`] so callers can match on a wire-stable
//! identifier rather than a `Display` string.

use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable, wire-friendly error code drawn from the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Tool name not registered.
    ToolNotFound,
    /// Tool parameters rejected by schema.
    ValidationError,
    /// Tool raised after all retries were exhausted.
    ExecutionError,
    /// Tool or specialist execution timed out.
    Timeout,
    /// LLM backend call failed.
    LlmError,
    /// Step bound was hit before completion.
    MaxStepsExceeded,
    /// Construction-time: provider tag not recognized.
    UnsupportedProvider,
    /// Construction-time: duplicate tool name in a registry.
    DuplicateToolName,
    /// Construction-time: tool definition missing a required field.
    InvalidToolDefinition,
    /// Construction-time: swarm configuration is incoherent.
    InvalidSwarmConfig,
    /// Construction-time: duplicate specialist id in a swarm.
    DuplicateSpecialistId,
    /// Routing exhausted every fallback without a candidate.
    RoutingFailed,
    /// Execution was aborted via a cancellation signal.
    Cancelled,
}

impl ErrorCode {
    /// The wire identifier used in `code` fields and trace payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ToolNotFound => "TOOL_NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::LlmError => "LLM_ERROR",
            Self::MaxStepsExceeded => "MAX_STEPS_EXCEEDED",
            Self::UnsupportedProvider => "UNSUPPORTED_PROVIDER",
            Self::DuplicateToolName => "DUPLICATE_TOOL_NAME",
            Self::InvalidToolDefinition => "INVALID_TOOL_DEFINITION",
            Self::InvalidSwarmConfig => "INVALID_SWARM_CONFIG",
            Self::DuplicateSpecialistId => "DUPLICATE_SPECIALIST_ID",
            Self::RoutingFailed => "ROUTING_FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The runtime's top-level error type.
///
/// Only [`Error::MaxStepsExceeded`], [`Error::Llm`], and [`Error::Cancelled`]
/// propagate out of a step-loop `execute` call; everything else (tool
/// failures, routing fallbacks) is captured as a value in the relevant
/// result type instead of raised here.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured step bound was reached before the loop completed.
    #[error("max steps exceeded: {steps} steps (limit {max_steps})")]
    MaxStepsExceeded {
        /// Steps actually taken.
        steps: usize,
        /// The configured bound.
        max_steps: usize,
    },

    /// The LLM backend failed to produce a turn.
    #[error("LLM error (provider: {provider}): {message}")]
    Llm {
        /// Provider tag for diagnostics.
        provider: String,
        /// Failing context / underlying message.
        message: String,
    },

    /// Execution was aborted by a cancellation signal.
    #[error("execution was cancelled")]
    Cancelled,

    /// A provider tag was not recognized at construction time.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Two tools were registered under the same name.
    #[error("duplicate tool name: {0}")]
    DuplicateToolName(String),

    /// A tool definition was missing a required field.
    #[error("invalid tool definition: {0}")]
    InvalidToolDefinition(String),

    /// A swarm configuration was incoherent (e.g. zero specialists).
    #[error("invalid swarm config: {0}")]
    InvalidSwarmConfig(String),

    /// Two specialists were registered under the same id.
    #[error("duplicate specialist id: {0}")]
    DuplicateSpecialistId(String),

    /// Routing exhausted the supervisor fallback without a candidate.
    #[error("routing failed: {0}")]
    RoutingFailed(String),
}

impl Error {
    /// The stable [`ErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MaxStepsExceeded { .. } => ErrorCode::MaxStepsExceeded,
            Self::Llm { .. } => ErrorCode::LlmError,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::UnsupportedProvider(_) => ErrorCode::UnsupportedProvider,
            Self::DuplicateToolName(_) => ErrorCode::DuplicateToolName,
            Self::InvalidToolDefinition(_) => ErrorCode::InvalidToolDefinition,
            Self::InvalidSwarmConfig(_) => ErrorCode::InvalidSwarmConfig,
            Self::DuplicateSpecialistId(_) => ErrorCode::DuplicateSpecialistId,
            Self::RoutingFailed(_) => ErrorCode::RoutingFailed,
        }
    }

    /// Build a [`Error::MaxStepsExceeded`].
    #[must_use]
    pub const fn max_steps(steps: usize, max_steps: usize) -> Self {
        Self::MaxStepsExceeded { steps, max_steps }
    }

    /// Build a [`Error::Llm`].
    #[must_use]
    pub fn llm(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Llm {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy_strings() {
        assert_eq!(ErrorCode::ToolNotFound.as_str(), "TOOL_NOT_FOUND");
        assert_eq!(ErrorCode::MaxStepsExceeded.as_str(), "MAX_STEPS_EXCEEDED");
        assert_eq!(ErrorCode::RoutingFailed.as_str(), "ROUTING_FAILED");
    }

    #[test]
    fn error_code_roundtrips() {
        let err = Error::max_steps(5, 5);
        assert_eq!(err.code(), ErrorCode::MaxStepsExceeded);
        let err = Error::llm("mock", "boom");
        assert_eq!(err.code(), ErrorCode::LlmError);
    }
}
