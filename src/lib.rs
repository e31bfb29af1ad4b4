//! A bounded, tool-calling step-loop executor for a single LLM agent (C1–C5),
//! plus a supervisor/specialist swarm layer on top of it (C6–C8).
//!
//! Start with [`agent::AgentBuilder`] to assemble a single agent over a
//! [`chat::ChatProvider`] and a [`tool::ToolRegistry`], then either
//! [`agent::Agent::execute`] it for a one-shot result or [`agent::Agent::stream`]
//! it for a live event projection. Wrap several agents in a
//! [`swarm::SwarmBuilder`] to route tasks across specialists and synthesize
//! their outcomes.
//!
//! ```ignore
//! use agentloom::prelude::*;
//!
//! # async fn run() -> Result<()> {
//! let agent = AgentBuilder::new("assistant", "Assistant")
//!     .system_prompt("You are a helpful assistant.")
//!     .provider(MockProvider::new(vec![ChatResponse::text("hello")]))
//!     .build()?;
//!
//! let result = agent.execute("hi there", ExecuteOverrides::none()).await?;
//! println!("{}", result.response);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chat;
pub mod error;
pub mod message;
pub mod prelude;
pub mod providers;
pub mod swarm;
pub mod tool;
pub mod trace;
pub mod usage;
