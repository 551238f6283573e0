//! Chat-completion provider implementations.
//!
//! Every provider implements [`CompletionProvider`], which takes a rendered
//! message list plus a model name and an output-token ceiling and returns a
//! [`ModelResponse`]. The [`CompletionGateway`](crate::completion::CompletionGateway)
//! sits on top and turns that into text or a failure.
//!
//! # Supported Providers
//!
//! - **`OpenAI`**: the Chat Completions API and compatible endpoints
//! - **Mock**: scripted responses for tests (feature `mock`)
//!
//! # Example
//!
//! ```rust,ignore
//! use parley::providers::{CompletionProvider, CompletionRequest, OpenAIClient};
//! use parley::message::Message;
//!
//! let client = OpenAIClient::new("sk-...")?;
//! let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("hi")]);
//! let response = client.generate(&request).await?;
//! ```

mod common;
mod config;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod openai;

pub use common::{
    ApiClient, CompletionProvider, CompletionRequest, ModelResponse, TokenUsage, saturating_u32,
};
pub use config::HttpClientConfig;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockProvider;
pub use openai::OpenAIClient;
