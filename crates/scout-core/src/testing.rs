//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::Error;
use crate::message::{Message, ToolCall, Usage};
use crate::provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};

/// A mock provider that returns pre-configured responses.
pub struct MockProvider {
    responses: Mutex<Vec<Result<CompletionResponse, Error>>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<CompletionRequest>>,
    pub name: String,
    pub default_model: Option<String>,
    /// When set and nothing is queued, reply with the last user message.
    echo: bool,
    call_ids: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            captured_requests: Mutex::new(Vec::new()),
            name: "mock".to_string(),
            default_model: None,
            echo: false,
            call_ids: AtomicUsize::new(0),
        }
    }

    /// A provider that answers every request with its last user message.
    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Self::new()
        }
    }

    fn response(message: Message, finish_reason: FinishReason) -> CompletionResponse {
        CompletionResponse {
            message,
            usage: Usage::new(0, 0),
            model: "mock-model".to_string(),
            finish_reason,
        }
    }

    /// Queue a response to be returned by the next complete() call.
    /// Responses are returned in FIFO order (first queued = first returned).
    pub fn queue_response(&self, content: &str) {
        let response = Self::response(Message::assistant(content), FinishReason::Stop);
        self.responses.lock().unwrap().insert(0, Ok(response));
    }

    /// Queue a response that asks for a single tool call.
    pub fn queue_tool_call(&self, tool: &str, arguments: serde_json::Value) {
        let id = format!("call-{}", self.call_ids.fetch_add(1, Ordering::SeqCst));
        let message = Message::assistant_with_tool_calls("", vec![ToolCall::new(id, tool, arguments)]);
        let response = Self::response(message, FinishReason::ToolCalls);
        self.responses.lock().unwrap().insert(0, Ok(response));
    }

    /// Queue an error for the next complete() call.
    pub fn queue_error(&self, error: Error) {
        self.responses.lock().unwrap().insert(0, Err(error));
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::User)
            .map(|m| m.content.clone());
        self.captured_requests.lock().unwrap().push(request);

        match self.responses.lock().unwrap().pop() {
            Some(response) => response,
            None if self.echo => Ok(Self::response(
                Message::assistant(last_user.unwrap_or_default()),
                FinishReason::Stop,
            )),
            None => Err(Error::Unknown("No mock response queued".to_string())),
        }
    }
}
