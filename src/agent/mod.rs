//! The single-agent step loop (C4) and its streaming projection (C5).
//!
//! An [`Agent`] pairs a system prompt, an LLM [`crate::chat::ChatProvider`],
//! and a [`crate::tool::ToolRegistry`] with a step-loop policy. Build one
//! with [`AgentBuilder`], then call [`Agent::execute`] for a single result
//! or [`Agent::stream`] for the live event projection.

pub mod builder;
pub mod config;
pub mod executor;
pub mod state;
pub mod streaming;

pub use builder::AgentBuilder;
pub use config::{AgentConfig, CancellationToken, ExecuteOverrides};
pub use executor::Agent;
pub use state::{AgentState, ExecuteResult, TerminalError};
pub use streaming::AgentExecutionEvent;
