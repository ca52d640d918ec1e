//! scout-providers: Language model provider implementations for scout
//!
//! This crate provides implementations of the Provider trait for
//! OpenAI-compatible chat-completions APIs (OpenAI, Azure OpenAI, Groq).

pub mod openai;

pub use openai::{Deployment, OpenAIProvider, GROQ_BASE_URL};
