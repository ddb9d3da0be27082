//! Core domain types and error definitions for codeassist.
//!
//! This crate provides the types shared across the codeassist workspace:
//!
//! - [`RelayError`] — Error type for completion and rate-limit operations
//! - [`Task`] — The three fixed code tasks and their prompt templates
//! - [`CompletionRequest`] — Provider-neutral two-message prompt
//! - [`ConvertRequest`] and [`CodeRequest`] — Request bodies accepted by the relay
//!
//! # Example
//!
//! ```rust
//! use codeassist_core::Task;
//!
//! let task = Task::Convert { language: "Python".to_string() };
//! let prompt = task.prompt("console.log(1)");
//!
//! assert_eq!(prompt.system, "Convert the following code to Python :\n\nconsole.log(1)");
//! assert_eq!(prompt.user, "console.log(1)");
//! assert_eq!(prompt.max_tokens, 100);
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Errors that can occur while relaying a task.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Completion API request failed.
    #[error("LLM request failed: {0}")]
    LlmError(String),

    /// Completion API answered without a usable first choice.
    #[error("Completion returned no content")]
    EmptyCompletion,

    /// Rate-limit counter store failed.
    #[error("Rate limit store error: {0}")]
    Store(String),
}

/// A fixed code task the relay knows how to prompt for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Translate the code into another language.
    Convert { language: String },
    /// Find and explain bugs.
    Debug,
    /// Review style and practices, suggest improvements.
    QualityCheck,
}

impl Task {
    /// Token cap for the completion reply.
    pub fn max_tokens(&self) -> u32 {
        match self {
            Task::Convert { .. } => 100,
            Task::Debug | Task::QualityCheck => 200,
        }
    }

    /// Static message returned to the caller when the task fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Task::Convert { .. } => "Failed to convert the code.",
            Task::Debug => "Failed to debug the code.",
            Task::QualityCheck => "Failed to check the code quality.",
        }
    }

    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Task::Convert { .. } => "convert",
            Task::Debug => "debug",
            Task::QualityCheck => "qualitycheck",
        }
    }

    /// Builds the natural-language instruction, with the code appended.
    pub fn instruction(&self, code: &str) -> String {
        match self {
            Task::Convert { language } => {
                format!("Convert the following code to {} :\n\n{}", language, code)
            }
            Task::Debug => format!("Debug the following code:\n\n{}", code),
            Task::QualityCheck => format!(
                "Check the quality of the following code for example check if the code follow \
                 good coding practices and it has proper spaces and suggest that how it should be \
                 :\n\n{}",
                code
            ),
        }
    }

    /// Builds the two-message exchange sent to the completion service.
    pub fn prompt(&self, code: &str) -> CompletionRequest {
        CompletionRequest {
            system: self.instruction(code),
            user: code.to_string(),
            max_tokens: self.max_tokens(),
        }
    }
}

/// A system + user prompt with a reply token budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// System message content.
    pub system: String,
    /// User message content.
    pub user: String,
    /// Maximum tokens in the reply.
    pub max_tokens: u32,
}

/// Body of `POST /convert`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub language: String,
}

/// Body of `POST /debug` and `POST /qualitycheck`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub code: String,
}

/// Accepts any JSON value as text: null becomes empty, scalars their JSON form.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Parses a request body without rejecting it.
///
/// Bodies that are not a JSON object (arrays included) fall back to
/// `T::default()`, so missing input is still forwarded upstream.
pub fn parse_lenient<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(object @ serde_json::Value::Object(_)) => {
            serde_json::from_value(object).unwrap_or_default()
        }
        _ => T::default(),
    }
}
