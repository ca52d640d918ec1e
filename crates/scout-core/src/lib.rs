//! scout-core: Core types and traits for scout
//!
//! This crate provides the foundational types shared by the research
//! pipeline: the language-model client seam, the tool abstraction used by
//! search providers, and the tool-calling agent loop.

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{Agent, AgentConfig, AgentRun, ToolTrace};
pub use error::Error;
pub use message::{Message, Role, ToolCall, Usage};
pub use provider::{ChatModel, CompletionRequest, CompletionResponse, FinishReason, Provider};
pub use tool::{PropertySchema, Tool, ToolDefinition, ToolOutput, ToolParameters, ToolRegistry};

pub type Result<T> = std::result::Result<T, Error>;
