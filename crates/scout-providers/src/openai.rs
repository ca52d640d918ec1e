use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use scout_core::{
    CompletionRequest, CompletionResponse, Error, FinishReason, Message, Provider, Role, ToolCall,
    ToolDefinition, Usage,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL of Groq's OpenAI-compatible endpoint.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// How requests are addressed and authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    /// `{base_url}/chat/completions` with a bearer token. Covers OpenAI itself
    /// and OpenAI-compatible servers.
    Standard,
    /// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=..`
    /// with an `api-key` header.
    Azure {
        deployment: String,
        api_version: String,
    },
}

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: Option<String>,
    deployment: Deployment,
    name: &'static str,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: None,
            deployment: Deployment::Standard,
            name: "openai",
        }
    }

    /// Azure OpenAI: `endpoint` is the resource URL, e.g.
    /// `https://my-resource.openai.azure.com`.
    pub fn azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            deployment: Deployment::Azure {
                deployment: deployment.into(),
                api_version: api_version.into(),
            },
            name: "azure",
            ..Self::new(api_key)
        }
    }

    /// Groq's OpenAI-compatible API.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            name: "groq",
            ..Self::new(api_key).with_base_url(GROQ_BASE_URL)
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        match &self.deployment {
            Deployment::Standard => format!("{}/chat/completions", self.base_url),
            Deployment::Azure {
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.base_url, deployment, api_version
            ),
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.deployment {
            Deployment::Standard => builder.header("Authorization", format!("Bearer {}", self.api_key)),
            Deployment::Azure { .. } => builder.header("api-key", &self.api_key),
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> OpenAIChatRequest {
        // Model priority: request > provider default
        // If neither is set, don't send model field (let API use its default)
        let model = request
            .model
            .clone()
            .or_else(|| self.default_model.clone());

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(convert_tool).collect())
        };

        OpenAIChatRequest {
            model,
            messages: request.messages.iter().map(convert_message).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools,
        }
    }

    fn parse_response(&self, response: OpenAIChatResponse) -> Result<CompletionResponse, Error> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::api(500, "No choices in response"))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                    debug!(tool = %tc.function.name, error = %e, "Unparseable tool arguments");
                    serde_json::Value::String(tc.function.arguments.clone())
                });
                ToolCall::new(tc.id, tc.function.name, arguments)
            })
            .collect();

        let content = choice.message.content.unwrap_or_default();
        let message = if tool_calls.is_empty() {
            Message::assistant(content)
        } else {
            Message::assistant_with_tool_calls(content, tool_calls)
        };

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        let usage = response.usage.map(|u| Usage::new(u.prompt_tokens, u.completion_tokens));

        Ok(CompletionResponse {
            message,
            usage: usage.unwrap_or_default(),
            model: response.model.unwrap_or_default(),
            finish_reason,
        })
    }

    fn parse_error(&self, status: u16, body: &str) -> Error {
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: ErrorDetail,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            message: String,
        }

        if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
            match status {
                401 => Error::auth(err.error.message),
                429 => Error::rate_limit(err.error.message),
                400 => Error::invalid_request(err.error.message),
                _ => Error::api(status, err.error.message),
            }
        } else {
            Error::api(status, body.to_string())
        }
    }
}

fn convert_message(message: &Message) -> OpenAIMessage {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let tool_calls = if message.tool_calls.is_empty() {
        None
    } else {
        Some(
            message
                .tool_calls
                .iter()
                .map(|tc| OpenAIToolCall {
                    id: tc.id.clone(),
                    r#type: "function".to_string(),
                    function: OpenAIFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect(),
        )
    };

    // Assistant turns that only carry tool calls go out without content.
    let content = if message.content.is_empty() && tool_calls.is_some() {
        None
    } else {
        Some(message.content.clone())
    };

    OpenAIMessage {
        role: role.to_string(),
        content,
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn convert_tool(tool: &ToolDefinition) -> OpenAITool {
    OpenAITool {
        r#type: "function".to_string(),
        function: OpenAIFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: serde_json::to_value(&tool.parameters).unwrap_or_default(),
        },
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        let api_request = self.build_request(&request);
        debug!(provider = self.name, "Chat completion request: {:?}", api_request);

        let response = self
            .authorize(self.client.post(self.endpoint()))
            .header("Content-Type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(e.to_string())
                } else {
                    Error::network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &error_text));
        }

        let api_response: OpenAIChatResponse = response
            .json()
            .await
            .map_err(|e| Error::serialization(e.to_string()))?;

        self.parse_response(api_response)
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    /// Model to use. Optional for servers that have a default model.
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    r#type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    /// Azure omits this on some API versions.
    #[serde(default)]
    model: Option<String>,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::new("test-key");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), None);
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_groq_endpoint() {
        let provider = OpenAIProvider::groq("gsk-test").with_default_model("llama-3.1-8b-instant");
        assert_eq!(provider.name(), "groq");
        assert_eq!(
            provider.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_azure_endpoint() {
        let provider = OpenAIProvider::azure(
            "https://acme.openai.azure.com/",
            "key",
            "gpt-4o",
            "2024-06-01",
        );
        assert_eq!(provider.name(), "azure");
        assert_eq!(
            provider.endpoint(),
            "https://acme.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_build_request() {
        let provider = OpenAIProvider::new("test-key").with_default_model("gpt-4o");
        let request = CompletionRequest::new(vec![Message::user("Hello")]).with_temperature(0.7);
        let api_request = provider.build_request(&request);

        assert_eq!(api_request.model, Some("gpt-4o".to_string()));
        assert_eq!(api_request.temperature, Some(0.7));
        assert_eq!(api_request.messages.len(), 1);
        assert_eq!(api_request.messages[0].role, "user");
        assert!(api_request.tools.is_none());
    }

    #[test]
    fn test_parse_response_with_tool_call() {
        let provider = OpenAIProvider::new("k");
        let raw = json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "tavily_search", "arguments": "{\"query\":\"Acme ERP\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let response: OpenAIChatResponse = serde_json::from_value(raw).unwrap();
        let parsed = provider.parse_response(response).unwrap();

        assert_eq!(parsed.finish_reason, FinishReason::ToolCalls);
        assert_eq!(parsed.message.tool_calls[0].name, "tavily_search");
        assert_eq!(parsed.message.tool_calls[0].arguments["query"], "Acme ERP");
        assert_eq!(parsed.usage.total_tokens, 15);
    }

    #[test]
    fn test_malformed_tool_arguments_are_kept_raw() {
        let provider = OpenAIProvider::new("k");
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "tavily_search", "arguments": "query: Acme"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let response: OpenAIChatResponse = serde_json::from_value(raw).unwrap();
        let parsed = provider.parse_response(response).unwrap();

        assert_eq!(
            parsed.message.tool_calls[0].arguments,
            serde_json::Value::String("query: Acme".to_string())
        );
    }

    #[test]
    fn test_parse_error_maps_status() {
        let provider = OpenAIProvider::new("k");
        let body = r#"{"error": {"message": "Incorrect API key", "type": "invalid_request_error"}}"#;
        assert!(matches!(provider.parse_error(401, body), Error::Auth(_)));
        assert!(matches!(provider.parse_error(429, body), Error::RateLimit(_)));
        assert!(matches!(provider.parse_error(502, "bad gateway"), Error::Api { status: 502, .. }));
    }
}
