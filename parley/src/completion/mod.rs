//! Completion gateway.
//!
//! [`CompletionGateway`] turns a rendered conversation into a single
//! provider call bounded by a timeout. It never retries and never touches
//! conversation state; callers decide what to do with the text or the
//! [`CompletionFailure`].

use crate::error::LlmError;
use crate::message::Message;
use crate::providers::{CompletionProvider, CompletionRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Why a completion produced no usable text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompletionFailure {
    /// The provider did not answer within the gateway's timeout.
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered with an error.
    #[error("completion provider error: {0}")]
    Provider(#[from] LlmError),

    /// The provider answered but returned no text.
    #[error("completion returned no text")]
    EmptyResponse,
}

/// Single-attempt, timeout-bounded access to a completion provider.
#[derive(Clone)]
pub struct CompletionGateway {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
}

impl std::fmt::Debug for CompletionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionGateway")
            .field("provider", &self.provider.provider())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CompletionGateway {
    /// Create a gateway over `provider` that gives up after `timeout`.
    #[must_use]
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// The per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Name of the underlying provider.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider()
    }

    /// Request a completion for `messages`.
    ///
    /// `messages` is sent exactly as given, so it should already start with
    /// the system entry.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionFailure::Timeout`] when the provider is slower than
    /// the timeout, [`CompletionFailure::Provider`] when it reports an error,
    /// and [`CompletionFailure::EmptyResponse`] when the reply holds no
    /// non-blank text.
    #[instrument(skip(self, messages), fields(provider = self.provider.provider(), messages = messages.len()))]
    pub async fn complete(
        &self,
        messages: Vec<Message>,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<String, CompletionFailure> {
        let request = CompletionRequest::new(model, messages).with_max_tokens(max_output_tokens);

        let response = tokio::time::timeout(self.timeout, self.provider.generate(&request))
            .await
            .map_err(|_| CompletionFailure::Timeout(self.timeout))??;

        if let Some(usage) = response.token_usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                total_tokens = usage.total(),
                "completion token usage"
            );
        }

        match response.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(CompletionFailure::EmptyResponse),
        }
    }
}
