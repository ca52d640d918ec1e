use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::message::{Message, Usage};
use crate::tool::ToolDefinition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tools: Vec<ToolDefinition>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: Message,
    pub usage: Usage,
    pub model: String,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

/// A chat-completions backend.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Get the default model, if one is configured.
    /// Returns None if no default model is set (API will use its own default).
    fn default_model(&self) -> Option<&str>;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error>;
}

/// A provider bound to a model and sampling temperature.
///
/// This is the language-model capability the pipeline depends on: the agent
/// drives it through [`ChatModel::complete`] and the report synthesizer
/// through [`ChatModel::invoke`].
#[derive(Clone)]
pub struct ChatModel {
    provider: Arc<dyn Provider>,
    model: Option<String>,
    temperature: Option<f32>,
}

impl ChatModel {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            model: None,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Model priority: explicit > provider default.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref().or_else(|| self.provider.default_model())
    }

    /// Send a request, filling in model and temperature when the caller left
    /// them unset.
    pub async fn complete(&self, mut request: CompletionRequest) -> Result<CompletionResponse, Error> {
        if request.model.is_none() {
            request.model = self.model.clone();
        }
        if request.temperature.is_none() {
            request.temperature = self.temperature;
        }
        self.provider.complete(request).await
    }

    /// Single-prompt invocation: the prompt goes out as one user message and
    /// the reply's text comes back.
    pub async fn invoke(&self, prompt: &str) -> Result<String, Error> {
        let response = self
            .complete(CompletionRequest::new(vec![Message::user(prompt)]))
            .await?;

        debug!(
            provider = self.provider.name(),
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Language model invoked"
        );

        Ok(response.message.content)
    }
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new(vec![Message::user("Hello")])
            .with_model("gpt-4o")
            .with_temperature(0.7)
            .with_max_tokens(1000);

        assert_eq!(request.model, Some("gpt-4o".to_string()));
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(1000));
    }

    #[tokio::test]
    async fn test_invoke_applies_model_and_temperature() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("  polished report  ");

        let model = ChatModel::new(provider.clone())
            .with_model("gpt-4o")
            .with_temperature(0.7);
        let text = model.invoke("Write a report").await.unwrap();

        assert_eq!(text, "  polished report  ");
        let request = provider.last_request().unwrap();
        assert_eq!(request.model.as_deref(), Some("gpt-4o"));
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.messages[0].content, "Write a report");
    }

    #[tokio::test]
    async fn test_invoke_propagates_provider_error() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_error(Error::auth("bad key"));

        let model = ChatModel::new(provider);
        assert!(matches!(model.invoke("hi").await, Err(Error::Auth(_))));
    }
}
