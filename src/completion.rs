//! Chat-completion client used to propose the updated README.
//!
//! Any OpenAI-compatible `/chat/completions` endpoint works; the model and
//! base URL come from configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::github::error_body_text;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Completion API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Completion API returned no usable text")]
    EmptyResponse,
}

/// A chat-completion capability: one system message, one user message, one answer.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(
        &self,
        system_instruction: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Text of the first choice, rejecting missing or blank answers.
fn completion_text(response: ChatCompletionResponse) -> Result<String, CompletionError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(CompletionError::EmptyResponse)
}

/// OpenAI chat-completions client.
pub struct OpenAiCompleter {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompleter {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    #[instrument(skip_all, fields(prompt_bytes = user_prompt.len()))]
    async fn complete(
        &self,
        system_instruction: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError> {
        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        debug!(model = %self.model, "sending chat completion request");
        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body_text(response.text().await);
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response.json::<ChatCompletionResponse>().await?;
        let text = completion_text(parsed)?;
        debug!(response_bytes = text.len(), "received completion");
        Ok(text)
    }
}
