//! Chat Completions request/response handling for [`OpenAIClient`].

use super::client::OpenAIClient;
use crate::error::{LlmError, LlmResult};
use crate::providers::{
    ApiClient, CompletionProvider, CompletionRequest, ModelResponse, TokenUsage, saturating_u32,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

const PROVIDER: &str = "openai";

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl OpenAIClient {
    /// Turn a non-success HTTP response into an [`LlmError`].
    fn status_error(status: StatusCode, body: &str) -> LlmError {
        let detail = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error)
            .ok();
        let message = detail
            .as_ref()
            .map_or_else(|| body.to_string(), |d| d.message.clone());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::auth(PROVIDER, message),
            StatusCode::TOO_MANY_REQUESTS => LlmError::rate_limited(PROVIDER),
            _ => {
                let mut err = LlmError::http_status(status.as_u16(), message).with_provider(PROVIDER);
                if let Some(code) = detail.and_then(|d| d.code).and_then(|c| match c {
                    serde_json::Value::String(s) => Some(s),
                    serde_json::Value::Null => None,
                    other => Some(other.to_string()),
                }) {
                    err.code = Some(code);
                }
                err
            }
        }
    }

    fn parse_response(completion: ChatCompletion) -> ModelResponse {
        let token_usage = completion.usage.map(|usage| {
            TokenUsage::new(
                saturating_u32(usage.prompt_tokens),
                saturating_u32(usage.completion_tokens),
            )
        });

        let (text, finish_reason) = completion
            .choices
            .into_iter()
            .next()
            .map_or((None, None), |choice| {
                (
                    choice.message.and_then(|m| m.content),
                    choice.finish_reason,
                )
            });

        ModelResponse {
            text,
            token_usage,
            finish_reason,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAIClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    #[instrument(skip(self, request), fields(model = %request.model, messages = request.messages.len()))]
    async fn generate(&self, request: &CompletionRequest) -> LlmResult<ModelResponse> {
        let url = self.chat_completions_url();
        debug!("Sending request to OpenAI API");

        let response = self
            .http_client()
            .post(&url)
            .headers(self.auth_headers())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Self::status_error(status, &body));
        }

        let completion: ChatCompletion = serde_json::from_str(&body)?;
        if completion.choices.is_empty() {
            debug!("No choices in OpenAI response");
        }
        Ok(Self::parse_response(completion))
    }
}
