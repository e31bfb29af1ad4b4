//! Provider adapters implementing the [`crate::chat::ChatProvider`]
//! contract.
//!
//! This crate ships only [`mock::MockProvider`], a scripted provider for
//! tests and examples. Real backends (OpenAI-, Anthropic-, or
//! Ollama-compatible HTTP APIs) plug in the same way: implement
//! [`crate::chat::ChatProvider`] and hand an `Arc` of it to
//! [`crate::agent::AgentBuilder::provider`].

pub mod mock;

pub use mock::MockProvider;
