//! LLM client abstraction for the codeassist relay.
//!
//! - [`CompletionClient`] — The seam the server dispatches through
//! - [`OpenAiClient`] — OpenAI chat-completions implementation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use codeassist_core::Task;
//! use codeassist_llm::{CompletionClient, OpenAiClient};
//!
//! let client = OpenAiClient::new(&api_key, "gpt-3.5-turbo", None);
//! let response = client.complete(&Task::Debug.prompt(code)).await?;
//! println!("{}", response.content);
//! ```

mod client;

pub use client::{CompletionClient, LlmMetrics, LlmResponse, OpenAiClient};
