//! A scripted [`ChatProvider`] for tests and examples: no network calls,
//! no API keys, just a fixed sequence of turns.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::chat::{ChatProvider, ChatRequest, ChatResponse};
use crate::error::Result;

/// Cycles through a fixed sequence of [`ChatResponse`]s, one per call,
/// wrapping back to the start once exhausted.
#[derive(Debug)]
pub struct MockProvider {
    name: &'static str,
    model: String,
    responses: Vec<ChatResponse>,
    index: AtomicUsize,
}

impl MockProvider {
    /// Build a provider cycling through `responses` in order.
    ///
    /// # Panics
    ///
    /// Panics if `responses` is empty; a provider with nothing to return
    /// is a test-authoring mistake, not a runtime condition to handle.
    #[must_use]
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        assert!(!responses.is_empty(), "MockProvider needs at least one scripted response");
        Self {
            name: "mock",
            model: "mock-model".to_string(),
            responses,
            index: AtomicUsize::new(0),
        }
    }

    /// Override the model identifier reported by [`ChatProvider::default_model`].
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn calls_made(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse> {
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        Ok(self.responses[i % self.responses.len()].clone())
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn cycles_through_responses_in_order() {
        let provider = MockProvider::new(vec![ChatResponse::text("first"), ChatResponse::text("second")]);
        let request = ChatRequest::new(vec![Message::user("hi")]);

        let r1 = provider.chat(&request).await.unwrap();
        assert_eq!(r1.content.as_deref(), Some("first"));
        let r2 = provider.chat(&request).await.unwrap();
        assert_eq!(r2.content.as_deref(), Some("second"));
        let r3 = provider.chat(&request).await.unwrap();
        assert_eq!(r3.content.as_deref(), Some("first"));
        assert_eq!(provider.calls_made(), 3);
    }

    #[test]
    #[should_panic(expected = "at least one scripted response")]
    fn rejects_empty_script() {
        let _ = MockProvider::new(vec![]);
    }
}
