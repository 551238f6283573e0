//! Convenient re-exports of the most commonly used types.

pub use crate::completion::{CompletionFailure, CompletionGateway};
pub use crate::conversation::{Conversation, ConversationManager, UserId};
pub use crate::error::{LlmError, LlmErrorKind, LlmResult};
pub use crate::message::{Message, Role};
pub use crate::providers::{
    ApiClient, CompletionProvider, CompletionRequest, HttpClientConfig, ModelResponse,
    OpenAIClient, TokenUsage,
};

#[cfg(any(test, feature = "mock"))]
pub use crate::providers::MockProvider;
