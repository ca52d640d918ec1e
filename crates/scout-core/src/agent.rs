//! Tool-using agent loop.
//!
//! The agent sends the conversation to the model together with the tool
//! definitions, executes any tool calls the model requests, feeds the
//! results back, and repeats until the model answers without calling a tool.

use tracing::{debug, warn};

use crate::error::Error;
use crate::message::{Message, ToolCall, Usage};
use crate::provider::{ChatModel, CompletionRequest};
use crate::tool::ToolRegistry;

/// Configuration for an agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Agent name, used in logs.
    pub id: String,
    /// System prompt for the agent.
    pub system_prompt: Option<String>,
    /// Maximum agentic loop iterations.
    pub max_iterations: usize,
}

impl AgentConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            system_prompt: None,
            max_iterations: 8,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }
}

/// Record of a single tool execution during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolTrace {
    pub tool_name: String,
    pub succeeded: bool,
}

/// Result of a completed agent run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Final answer from the model.
    pub content: String,
    pub iterations: usize,
    /// Tools called, in call order.
    pub trace: Vec<ToolTrace>,
    pub usage: Usage,
}

impl AgentRun {
    pub fn tools_used(&self) -> Vec<&str> {
        self.trace.iter().map(|t| t.tool_name.as_str()).collect()
    }
}

pub struct Agent;

impl Agent {
    /// Run a one-shot task.
    ///
    /// Tool failures never abort the run: each one is reported back to the
    /// model as a "no result" observation so it can move on to another tool
    /// or give up. Provider errors and exhausting `max_iterations` are
    /// returned as errors.
    pub async fn run_once(
        model: &ChatModel,
        tools: &ToolRegistry,
        config: &AgentConfig,
        task: &str,
    ) -> Result<AgentRun, Error> {
        debug!(
            agent = %config.id,
            tools_available = tools.len(),
            max_iterations = config.max_iterations,
            "Starting agent run"
        );

        let mut messages = Vec::new();
        if let Some(system) = &config.system_prompt {
            messages.push(Message::system(system.as_str()));
        }
        messages.push(Message::user(task));

        let mut trace = Vec::new();
        let mut usage = Usage::default();

        for iteration in 1..=config.max_iterations {
            debug!(agent = %config.id, iteration, "Agent iteration");

            let request = CompletionRequest::new(messages.clone()).with_tools(tools.definitions());
            let response = model.complete(request).await?;
            usage.add(&response.usage);

            let tool_calls = response.message.tool_calls;
            if tool_calls.is_empty() {
                return Ok(AgentRun {
                    content: response.message.content,
                    iterations: iteration,
                    trace,
                    usage,
                });
            }

            debug!(
                agent = %config.id,
                tool_count = tool_calls.len(),
                "Agent executing tools"
            );

            messages.push(Message::assistant_with_tool_calls(
                response.message.content,
                tool_calls.clone(),
            ));

            for tool_call in &tool_calls {
                let (result, succeeded) = execute_tool(tools, tool_call).await;
                trace.push(ToolTrace {
                    tool_name: tool_call.name.clone(),
                    succeeded,
                });
                messages.push(Message::tool_result(&tool_call.id, result));
            }
        }

        Err(Error::agent(format!(
            "{} exceeded max iterations ({})",
            config.id, config.max_iterations
        )))
    }
}

/// Execute a single tool call, folding every failure into a textual
/// observation for the model.
async fn execute_tool(registry: &ToolRegistry, tool_call: &ToolCall) -> (String, bool) {
    let Some(tool) = registry.get(&tool_call.name) else {
        warn!(tool = %tool_call.name, "Model requested an unknown tool");
        return (
            format!(
                "Error: Unknown tool '{}'. Available tools: {}",
                tool_call.name,
                registry.names().join(", ")
            ),
            false,
        );
    };

    match tool.execute(tool_call.arguments.clone()).await {
        Ok(output) if output.is_error => {
            warn!(tool = %tool_call.name, error = %output.content, "Tool reported an error");
            (format!("No result: {}", output.content), false)
        }
        Ok(output) if output.content.trim().is_empty() => {
            ("No result: the search returned nothing.".to_string(), false)
        }
        Ok(output) => (output.content, true),
        Err(e) => {
            warn!(tool = %tool_call.name, error = %e, "Tool execution failed");
            (format!("No result: {}", e), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::testing::MockProvider;
    use crate::tool::{Tool, ToolDefinition, ToolOutput};

    struct FixedTool {
        name: &'static str,
        result: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fixed"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.name, "fixed")
        }

        async fn execute(&self, _arguments: Value) -> Result<ToolOutput, Error> {
            match self.result {
                Ok(text) => Ok(ToolOutput::success(text)),
                Err(msg) => Err(Error::tool(self.name, msg)),
            }
        }
    }

    fn registry() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(FixedTool {
            name: "primary",
            result: Err("quota exceeded"),
        }));
        tools.register(Arc::new(FixedTool {
            name: "secondary",
            result: Ok("Acme uses SAP S/4HANA"),
        }));
        tools
    }

    #[test]
    fn test_agent_config() {
        let config = AgentConfig::new("enricher")
            .with_system_prompt("You research companies")
            .with_max_iterations(4);

        assert_eq!(config.id, "enricher");
        assert_eq!(config.system_prompt.as_deref(), Some("You research companies"));
        assert_eq!(config.max_iterations, 4);
    }

    #[tokio::test]
    async fn test_tool_failure_is_recovered_and_loop_continues() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("primary", json!({"query": "Acme ERP"}));
        provider.queue_tool_call("secondary", json!({"query": "Acme ERP"}));
        provider.queue_response("Acme runs SAP.");

        let model = ChatModel::new(provider.clone());
        let run = Agent::run_once(&model, &registry(), &AgentConfig::new("test"), "Find ERP")
            .await
            .unwrap();

        assert_eq!(run.content, "Acme runs SAP.");
        assert_eq!(run.iterations, 3);
        assert_eq!(run.tools_used(), vec!["primary", "secondary"]);
        assert!(!run.trace[0].succeeded);
        assert!(run.trace[1].succeeded);

        // The failed tool surfaced to the model as an observation, not an error.
        let requests = provider.captured_requests.lock().unwrap();
        let observation = requests[1].messages.last().unwrap();
        assert!(observation.content.starts_with("No result"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("bing", json!({}));
        provider.queue_response("giving up");

        let model = ChatModel::new(provider.clone());
        let run = Agent::run_once(&model, &registry(), &AgentConfig::new("test"), "task")
            .await
            .unwrap();

        assert_eq!(run.content, "giving up");
        let last = provider.last_request().unwrap();
        assert!(last.messages.last().unwrap().content.contains("Unknown tool 'bing'"));
    }

    #[tokio::test]
    async fn test_max_iterations_exceeded() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("secondary", json!({}));
        provider.queue_tool_call("secondary", json!({}));

        let model = ChatModel::new(provider);
        let config = AgentConfig::new("looper").with_max_iterations(2);
        let err = Agent::run_once(&model, &registry(), &config, "task")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Agent(_)));
    }
}
