//! Scripted provider for tests, enabled outside this crate by the `mock` feature.
//!
//! [`MockProvider`] answers requests from a queue of canned results and
//! records every request it sees, so callers can assert on the exact
//! payload a conversation rendered.

use crate::error::{LlmError, LlmResult};
use crate::providers::{CompletionProvider, CompletionRequest, ModelResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A provider that replays scripted responses in order.
///
/// When the script runs out, every further call fails with an internal
/// error.
#[derive(Debug, Default)]
pub struct MockProvider {
    responses: Mutex<VecDeque<LlmResult<ModelResponse>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a provider with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful text reply.
    #[must_use]
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push_reply(text);
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_error(self, error: LlmError) -> Self {
        self.push_error(error);
        self
    }

    /// Queue a raw response (e.g., one without text).
    #[must_use]
    pub fn with_response(self, response: ModelResponse) -> Self {
        self.push(Ok(response));
        self
    }

    /// Sleep for `delay` before answering each request.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful text reply on a shared provider.
    pub fn push_reply(&self, text: impl Into<String>) {
        self.push(Ok(ModelResponse::from_text(text)));
    }

    /// Queue a failure on a shared provider.
    pub fn push_error(&self, error: LlmError) {
        self.push(Err(error));
    }

    fn push(&self, result: LlmResult<ModelResponse>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of scripted results not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, request: &CompletionRequest) -> LlmResult<ModelResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| Err(LlmError::internal("mock provider has no scripted responses")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmErrorKind;
    use crate::message::Message;

    #[tokio::test]
    async fn test_replays_in_order_and_records() {
        let mock = MockProvider::new()
            .with_reply("first")
            .with_error(LlmError::rate_limited("mock"));
        let request = CompletionRequest::new("m", vec![Message::user("hi")]);

        let first = mock.generate(&request).await.unwrap();
        assert_eq!(first.text.as_deref(), Some("first"));

        let second = mock.generate(&request).await.unwrap_err();
        assert_eq!(second.kind, LlmErrorKind::RateLimited);

        assert_eq!(mock.requests().len(), 2);
        assert_eq!(mock.requests()[0], request);
    }

    #[test]
    fn test_exhausted_script_is_internal_error() {
        let mock = MockProvider::new();
        let request = CompletionRequest::new("m", Vec::new());
        let err = tokio_test::block_on(mock.generate(&request)).unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Internal);
        assert_eq!(mock.remaining(), 0);
    }

    #[test]
    fn test_push_after_construction() {
        let mock = MockProvider::new();
        mock.push_reply("late");
        assert_eq!(mock.remaining(), 1);

        let request = CompletionRequest::new("m", Vec::new());
        let response = tokio_test::assert_ok!(tokio_test::block_on(mock.generate(&request)));
        assert_eq!(response.text.as_deref(), Some("late"));
    }
}
